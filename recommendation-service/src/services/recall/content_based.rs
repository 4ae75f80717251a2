use async_trait::async_trait;
use chrono::Duration;
use std::sync::Arc;
use tracing::debug;

use super::{RecallContext, RecallStrategy};
use crate::error::Result;
use crate::models::{Candidate, NewsItem, RecallSource, UserSignal};
use crate::repository::{NewsQuery, NewsRepository, NewsSort};

/// How many of the user's preferred categories feed the query.
const TOP_CATEGORIES: usize = 3;
/// Trending window for the no-preferences fallback.
const FALLBACK_WINDOW_HOURS: i64 = 24;

/// Content-based recall: recent items from the user's top preferred
/// categories, ordered by preference affinity (category weight plus tag
/// overlap). The profile's quality threshold is pushed into the query so
/// low-quality items never leave the repository.
pub struct ContentBasedRecallStrategy {
    news_repo: Arc<dyn NewsRepository>,
}

impl ContentBasedRecallStrategy {
    pub fn new(news_repo: Arc<dyn NewsRepository>) -> Self {
        Self { news_repo }
    }

    fn affinity(signal: &UserSignal, news: &NewsItem) -> f32 {
        let tag_overlap: f32 = news.tags.iter().map(|tag| signal.tag_weight(tag)).sum();
        signal.category_weight(news.category_id) + tag_overlap
    }
}

#[async_trait]
impl RecallStrategy for ContentBasedRecallStrategy {
    async fn recall(&self, ctx: &RecallContext, limit: usize) -> Result<Vec<Candidate>> {
        let signal = &ctx.signal;

        if signal.preferred_categories.is_empty() {
            // Nothing to personalize on yet; fall back to trending
            debug!(
                user_id = ctx.user_id,
                "No category preferences, falling back to trending"
            );
            let items = self
                .news_repo
                .trending(Duration::hours(FALLBACK_WINDOW_HOURS), ctx.category_id, limit)
                .await?;
            return Ok(items
                .into_iter()
                .map(|news| {
                    Candidate::new(news, RecallSource::ContentBased, 0.0)
                        .with_reason("Popular with readers")
                })
                .collect());
        }

        let mut top: Vec<(i64, f32)> = signal
            .preferred_categories
            .iter()
            .map(|(id, weight)| (*id, *weight))
            .collect();
        top.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        top.truncate(TOP_CATEGORIES);
        let category_ids: Vec<i64> = top.iter().map(|(id, _)| *id).collect();

        let mut query = NewsQuery::new(limit)
            .category(ctx.category_id)
            .categories(category_ids)
            .sort(NewsSort::PublishedAtDesc);
        if signal.quality_threshold > 0.0 {
            query = query.min_quality(signal.quality_threshold);
        }

        let items = self.news_repo.query(&query).await?;

        let mut candidates: Vec<Candidate> = items
            .into_iter()
            .map(|news| {
                Candidate::new(news, RecallSource::ContentBased, 0.0)
                    .with_reason("Matches your interests")
            })
            .collect();

        candidates.sort_by(|a, b| {
            Self::affinity(signal, &b.news)
                .partial_cmp(&Self::affinity(signal, &a.news))
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.news.id.cmp(&b.news.id))
        });
        candidates.truncate(limit);

        Ok(candidates)
    }

    fn source(&self) -> RecallSource {
        RecallSource::ContentBased
    }
}
