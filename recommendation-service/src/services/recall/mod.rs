mod collaborative;
mod content_based;
mod discovery;
mod featured;
mod fresh;
mod hot;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::RecallConfig;
use crate::error::Result;
use crate::models::{Candidate, RecallSource, RecallStats, UserSignal, Warmth};
use crate::repository::{BehaviorRepository, NewsRepository};

pub use collaborative::CollaborativeRecallStrategy;
pub use content_based::ContentBasedRecallStrategy;
pub use discovery::DiscoveryRecallStrategy;
pub use featured::FeaturedRecallStrategy;
pub use fresh::FreshRecallStrategy;
pub use hot::HotRecallStrategy;

/// Per-request context handed to every strategy.
#[derive(Debug, Clone)]
pub struct RecallContext {
    pub user_id: i64,
    pub signal: UserSignal,
    pub category_id: Option<i64>,
    pub now: DateTime<Utc>,
}

#[async_trait]
pub trait RecallStrategy: Send + Sync {
    async fn recall(&self, ctx: &RecallContext, limit: usize) -> Result<Vec<Candidate>>;
    fn source(&self) -> RecallSource;
}

/// Multi-strategy candidate recall.
///
/// The mix is a deterministic function of user warmth: cold-start users get
/// {Hot, Featured, Fresh}, warm users get {ContentBased, Collaborative, Hot,
/// Fresh}. A non-zero `explore_ratio` adds Discovery on top of either mix.
/// Weights are shares of the target pool, not hard partitions; a strategy
/// that comes up short is backfilled from the next-highest-weight strategy
/// that still has unconsumed candidates.
pub struct RecallLayer {
    hot: Arc<dyn RecallStrategy>,
    featured: Arc<dyn RecallStrategy>,
    fresh: Arc<dyn RecallStrategy>,
    content: Arc<dyn RecallStrategy>,
    collaborative: Arc<dyn RecallStrategy>,
    discovery: Arc<dyn RecallStrategy>,
    config: RecallConfig,
}

impl RecallLayer {
    pub fn new(
        news_repo: Arc<dyn NewsRepository>,
        behavior_repo: Arc<dyn BehaviorRepository>,
        config: RecallConfig,
    ) -> Self {
        Self {
            hot: Arc::new(HotRecallStrategy::new(
                news_repo.clone(),
                config.hot_window_hours,
            )),
            featured: Arc::new(FeaturedRecallStrategy::new(news_repo.clone())),
            fresh: Arc::new(FreshRecallStrategy::new(news_repo.clone())),
            content: Arc::new(ContentBasedRecallStrategy::new(news_repo.clone())),
            collaborative: Arc::new(CollaborativeRecallStrategy::new(
                news_repo.clone(),
                behavior_repo,
            )),
            discovery: Arc::new(DiscoveryRecallStrategy::new(news_repo)),
            config,
        }
    }

    /// Replaces the built-in strategies. Test seam.
    #[allow(clippy::too_many_arguments)]
    pub fn with_strategies(
        hot: Arc<dyn RecallStrategy>,
        featured: Arc<dyn RecallStrategy>,
        fresh: Arc<dyn RecallStrategy>,
        content: Arc<dyn RecallStrategy>,
        collaborative: Arc<dyn RecallStrategy>,
        discovery: Arc<dyn RecallStrategy>,
        config: RecallConfig,
    ) -> Self {
        Self {
            hot,
            featured,
            fresh,
            content,
            collaborative,
            discovery,
            config,
        }
    }

    /// Strategy mix for the given warmth, weight-descending.
    fn mix(&self, warmth: Warmth, explore_ratio: f32) -> Vec<(&Arc<dyn RecallStrategy>, f32)> {
        let mut mix: Vec<(&Arc<dyn RecallStrategy>, f32)> = match warmth {
            Warmth::ColdStart => vec![
                (&self.hot, self.config.cold_hot_weight),
                (&self.featured, self.config.cold_featured_weight),
                (&self.fresh, self.config.cold_fresh_weight),
            ],
            Warmth::Warm => vec![
                (&self.content, self.config.warm_content_weight),
                (&self.collaborative, self.config.warm_collaborative_weight),
                (&self.hot, self.config.warm_hot_weight),
                (&self.fresh, self.config.warm_fresh_weight),
            ],
        };

        if explore_ratio > 0.0 {
            mix.push((&self.discovery, explore_ratio));
        }

        // Stable sort keeps declaration order among equal weights
        mix.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        mix
    }

    /// Recalls, deduplicates, and assembles the candidate pool.
    ///
    /// A failing or timed-out strategy contributes nothing; only the failure
    /// is logged. All strategies empty is a valid outcome.
    pub async fn recall_candidates(
        &self,
        ctx: &RecallContext,
        pool_target: usize,
        explore_ratio: f32,
    ) -> Result<(Vec<Candidate>, RecallStats)> {
        let mix = self.mix(ctx.signal.warmth, explore_ratio);
        let timeout = Duration::from_secs(self.config.strategy_timeout_secs);

        let shares: Vec<usize> = mix
            .iter()
            .map(|(_, weight)| (weight * pool_target as f32).ceil() as usize)
            .collect();

        // Strategies are read-only against the repositories, so they run
        // concurrently under a per-strategy timeout.
        let futures = mix.iter().zip(shares.iter()).map(|((strategy, _), share)| {
            let fetch_limit = share * 2;
            async move {
                match tokio::time::timeout(timeout, strategy.recall(ctx, fetch_limit)).await {
                    Ok(Ok(candidates)) => candidates,
                    Ok(Err(e)) => {
                        warn!(
                            strategy = strategy.source().as_str(),
                            user_id = ctx.user_id,
                            "Recall strategy failed: {}",
                            e
                        );
                        Vec::new()
                    }
                    Err(_) => {
                        warn!(
                            strategy = strategy.source().as_str(),
                            user_id = ctx.user_id,
                            timeout_secs = timeout.as_secs(),
                            "Recall strategy timed out"
                        );
                        Vec::new()
                    }
                }
            }
        });
        let mut results: Vec<Vec<Candidate>> = join_all(futures).await;

        let mut stats = RecallStats::default();
        for ((strategy, weight), candidates) in mix.iter().zip(results.iter_mut()) {
            stats.record(strategy.source(), candidates.len());
            for candidate in candidates.iter_mut() {
                candidate.strategy_weight = *weight;
            }
        }

        let pool = Self::assemble(results, &shares, pool_target);
        stats.total_candidates = pool.len();

        info!(
            user_id = ctx.user_id,
            hot = stats.hot_count,
            featured = stats.featured_count,
            fresh = stats.fresh_count,
            content = stats.content_count,
            collaborative = stats.collaborative_count,
            discovery = stats.discovery_count,
            total = stats.total_candidates,
            "Recall completed"
        );

        Ok((pool, stats))
    }

    /// Takes each strategy's allotted share first (skipping duplicates),
    /// then backfills remaining capacity in weight-descending order.
    fn assemble(
        results: Vec<Vec<Candidate>>,
        shares: &[usize],
        pool_target: usize,
    ) -> Vec<Candidate> {
        let mut seen: HashSet<i64> = HashSet::new();
        let mut pool: Vec<Candidate> = Vec::with_capacity(pool_target);
        let mut queues: Vec<std::vec::IntoIter<Candidate>> =
            results.into_iter().map(|r| r.into_iter()).collect();

        for (queue, share) in queues.iter_mut().zip(shares.iter()) {
            let mut taken = 0;
            while taken < *share && pool.len() < pool_target {
                match queue.next() {
                    Some(candidate) => {
                        if seen.insert(candidate.news.id) {
                            pool.push(candidate);
                            taken += 1;
                        }
                    }
                    None => break,
                }
            }
        }

        // Shortfall backfill, weight-descending (queues are already in mix order)
        for queue in queues.iter_mut() {
            if pool.len() >= pool_target {
                break;
            }
            for candidate in queue.by_ref() {
                if pool.len() >= pool_target {
                    break;
                }
                if seen.insert(candidate.news.id) {
                    pool.push(candidate);
                }
            }
        }

        pool
    }
}
