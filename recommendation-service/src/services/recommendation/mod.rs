//! Recommendation orchestration.
//!
//! One call runs the full pipeline: cache check, warmth resolution,
//! multi-strategy recall, merge/dedup, scoring, quality gating, diversity
//! re-ranking, pagination, and the cache write. Each run is identified by
//! a fresh `recommendation_id`; a cached page keeps the id it was computed
//! under so click feedback correlates with the original serving.

use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use crate::cache::{self, CacheStore};
use crate::config::Config;
use crate::error::Result;
use crate::models::{
    Candidate, NewsItem, RecallStats, RecommendationItem, RecommendationPage,
    RecommendationRequest, UserSignal, Warmth,
};
use crate::repository::{BehaviorRepository, NewsQuery, NewsRepository, NewsSort, ProfileProvider};
use crate::services::diversity::DiversityLayer;
use crate::services::ranking::RankingLayer;
use crate::services::recall::{RecallContext, RecallLayer};

/// Identifies the scoring logic version on every page, echoed back by
/// behavior tracking.
pub const ALGORITHM_VERSION: &str = "v1.0.0";

pub struct RecommendationService {
    recall: RecallLayer,
    ranking: RankingLayer,
    diversity: DiversityLayer,
    news_repo: Arc<dyn NewsRepository>,
    profile_provider: Arc<dyn ProfileProvider>,
    cache: Arc<dyn CacheStore>,
    config: Config,
}

impl RecommendationService {
    pub fn new(
        news_repo: Arc<dyn NewsRepository>,
        behavior_repo: Arc<dyn BehaviorRepository>,
        profile_provider: Arc<dyn ProfileProvider>,
        cache: Arc<dyn CacheStore>,
        config: Config,
    ) -> Self {
        Self {
            recall: RecallLayer::new(news_repo.clone(), behavior_repo, config.recall.clone()),
            ranking: RankingLayer::new(config.ranking.clone()),
            diversity: DiversityLayer::new(config.diversity.clone()),
            news_repo,
            profile_provider,
            cache,
            config,
        }
    }

    /// Serves one recommendation page for the user.
    pub async fn get_recommendations(
        &self,
        user_id: i64,
        request: &RecommendationRequest,
    ) -> Result<RecommendationPage> {
        request.validate()?;

        let key = cache::page_key(
            &self.config.cache.key_prefix,
            user_id,
            &request.filter_fingerprint(),
            request.page,
        );

        if !request.refresh {
            // Cache failures degrade to a miss, never to a failed request
            match self.cache.get(&key).await {
                Ok(Some(mut page)) => {
                    set_metadata(&mut page, "cache_hit", json!(true));
                    return Ok(page);
                }
                Ok(None) => {}
                Err(e) => warn!(user_id, "Cache read failed, treating as miss: {}", e),
            }
        }

        let signal = self.resolve_signal(user_id).await;
        let now = Utc::now();
        let ctx = RecallContext {
            user_id,
            signal: signal.clone(),
            category_id: request.category_id,
            now,
        };

        // Pool depth is page-independent: every page of one filter set is a
        // slice of the same deterministic ranked pool, so consecutive pages
        // never overlap even when computed by separate requests.
        let needed = (request.page * request.page_size) as usize;
        let pool_target = (request.page_size * self.config.recall.pool_pages) as usize;

        let (mut candidates, stats) = self
            .recall
            .recall_candidates(&ctx, pool_target, request.explore_ratio)
            .await?;

        if !request.include_breaking {
            candidates.retain(|c| !c.news.is_breaking);
        }
        if !request.include_featured {
            candidates.retain(|c| !c.news.is_featured);
        }

        let ranked = self.ranking.rank(candidates, &signal, now);
        let total = ranked.len();

        let ordered = if request.diversify {
            self.diversity
                .rerank(ranked, needed, signal.diversity_preference)
        } else {
            let mut ranked = ranked;
            ranked.truncate(needed);
            ranked
        };

        let page = self.assemble_page(user_id, request, &signal, &stats, ordered, total, now);

        if let Err(e) = self
            .cache
            .set(&key, &page, Duration::from_secs(self.config.cache.ttl_secs))
            .await
        {
            warn!(user_id, "Cache write failed: {}", e);
        }

        Ok(page)
    }

    /// Drops every cached page for the user, across all filter variants.
    /// Called when the user's profile changes or they submit feedback.
    pub async fn invalidate_user(&self, user_id: i64) -> Result<usize> {
        let prefix = cache::user_prefix(&self.config.cache.key_prefix, user_id);
        self.cache.invalidate_prefix(&prefix).await
    }

    /// Same-category items, tag-overlap preferred, newest first.
    pub async fn get_similar_news(&self, news_id: i64, limit: usize) -> Result<Vec<NewsItem>> {
        let reference = match self
            .news_repo
            .find_by_ids(std::slice::from_ref(&news_id))
            .await?
            .into_iter()
            .next()
        {
            Some(news) => news,
            None => return Ok(Vec::new()),
        };

        let query = NewsQuery::new(limit + 1)
            .category(Some(reference.category_id))
            .sort(NewsSort::PublishedAtDesc);
        let items = self.news_repo.query(&query).await?;

        let overlap = |news: &NewsItem| -> usize {
            news.tags
                .iter()
                .filter(|tag| reference.tags.contains(tag))
                .count()
        };

        let mut similar: Vec<NewsItem> =
            items.into_iter().filter(|n| n.id != news_id).collect();
        // Stable: recency order preserved within equal overlap
        similar.sort_by_key(|news| std::cmp::Reverse(overlap(news)));
        similar.truncate(limit);

        Ok(similar)
    }

    /// Profile lookup with the fail-safe: any provider failure, timeout, or
    /// missing profile resolves to cold-start defaults.
    async fn resolve_signal(&self, user_id: i64) -> UserSignal {
        let timeout = Duration::from_secs(self.config.recall.strategy_timeout_secs);
        match tokio::time::timeout(timeout, self.profile_provider.get_signal(user_id)).await {
            Ok(Ok(Some(signal))) => signal,
            Ok(Ok(None)) => UserSignal::cold_start(),
            Ok(Err(e)) => {
                warn!(user_id, "Profile lookup failed, defaulting to cold-start: {}", e);
                UserSignal::cold_start()
            }
            Err(_) => {
                warn!(user_id, "Profile lookup timed out, defaulting to cold-start");
                UserSignal::cold_start()
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn assemble_page(
        &self,
        user_id: i64,
        request: &RecommendationRequest,
        signal: &UserSignal,
        stats: &RecallStats,
        ordered: Vec<Candidate>,
        total: usize,
        now: chrono::DateTime<Utc>,
    ) -> RecommendationPage {
        let recommendation_id = Uuid::new_v4().to_string();
        let start = ((request.page - 1) * request.page_size) as usize;

        let items: Vec<RecommendationItem> = ordered
            .iter()
            .skip(start)
            .take(request.page_size as usize)
            .enumerate()
            .map(|(position, candidate)| {
                RecommendationItem::from_candidate(position as u32, candidate)
            })
            .collect();

        let has_next = total > (request.page * request.page_size) as usize;

        info!(
            user_id,
            page = request.page,
            served = items.len(),
            total,
            has_next,
            recommendation_id = %recommendation_id,
            "Recommendations served"
        );

        RecommendationPage {
            items,
            total: total as u64,
            page: request.page,
            page_size: request.page_size,
            recommendation_id,
            algorithm_version: ALGORITHM_VERSION.to_string(),
            timestamp: now,
            has_next,
            metadata: Some(json!({
                "cache_hit": false,
                "warmth": match signal.warmth {
                    Warmth::ColdStart => "cold_start",
                    Warmth::Warm => "warm",
                },
                "recall": {
                    "hot": stats.hot_count,
                    "featured": stats.featured_count,
                    "fresh": stats.fresh_count,
                    "content": stats.content_count,
                    "collaborative": stats.collaborative_count,
                    "discovery": stats.discovery_count,
                },
            })),
        }
    }
}

fn set_metadata(page: &mut RecommendationPage, field: &str, value: serde_json::Value) {
    match page.metadata.as_mut().and_then(|m| m.as_object_mut()) {
        Some(map) => {
            map.insert(field.to_string(), value);
        }
        None => {
            let mut map = serde_json::Map::new();
            map.insert(field.to_string(), value);
            page.metadata = Some(serde_json::Value::Object(map));
        }
    }
}
