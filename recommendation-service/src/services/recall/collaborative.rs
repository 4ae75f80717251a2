use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

use super::{RecallContext, RecallStrategy};
use crate::error::Result;
use crate::models::{Candidate, RecallSource};
use crate::repository::{BehaviorRepository, NewsRepository};

/// Collaborative recall: items co-engaged by users with similar behavior,
/// strongest co-engagement first. Items the user already interacted with
/// are excluded.
pub struct CollaborativeRecallStrategy {
    news_repo: Arc<dyn NewsRepository>,
    behavior_repo: Arc<dyn BehaviorRepository>,
}

impl CollaborativeRecallStrategy {
    pub fn new(
        news_repo: Arc<dyn NewsRepository>,
        behavior_repo: Arc<dyn BehaviorRepository>,
    ) -> Self {
        Self {
            news_repo,
            behavior_repo,
        }
    }
}

#[async_trait]
impl RecallStrategy for CollaborativeRecallStrategy {
    async fn recall(&self, ctx: &RecallContext, limit: usize) -> Result<Vec<Candidate>> {
        let summary = self.behavior_repo.aggregate_for_user(ctx.user_id).await?;

        if summary.co_engaged.is_empty() {
            debug!(
                user_id = ctx.user_id,
                "No co-engagement signals for collaborative recall"
            );
            return Ok(Vec::new());
        }

        let engaged: HashSet<i64> = summary.engaged_news_ids.iter().copied().collect();
        let mut co_engaged: Vec<_> = summary
            .co_engaged
            .into_iter()
            .filter(|co| !engaged.contains(&co.news_id))
            .collect();
        co_engaged.sort_by(|a, b| {
            b.strength
                .partial_cmp(&a.strength)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.news_id.cmp(&b.news_id))
        });
        co_engaged.truncate(limit);

        let ids: Vec<i64> = co_engaged.iter().map(|co| co.news_id).collect();
        let rank: HashMap<i64, usize> =
            ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();

        let mut items = self.news_repo.find_by_ids(&ids).await?;
        items.sort_by_key(|news| rank.get(&news.id).copied().unwrap_or(usize::MAX));

        Ok(items
            .into_iter()
            .map(|news| {
                Candidate::new(news, RecallSource::Collaborative, 0.0)
                    .with_reason("Readers like you enjoyed this")
            })
            .collect())
    }

    fn source(&self) -> RecallSource {
        RecallSource::Collaborative
    }
}
