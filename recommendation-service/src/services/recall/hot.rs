use async_trait::async_trait;
use chrono::Duration;
use std::sync::Arc;
use tracing::debug;

use super::{RecallContext, RecallStrategy};
use crate::error::Result;
use crate::models::{Candidate, RecallSource};
use crate::repository::NewsRepository;

/// Hot recall: highest trending_score within a recent window (24h default).
pub struct HotRecallStrategy {
    news_repo: Arc<dyn NewsRepository>,
    window_hours: i64,
}

impl HotRecallStrategy {
    pub fn new(news_repo: Arc<dyn NewsRepository>, window_hours: i64) -> Self {
        Self {
            news_repo,
            window_hours,
        }
    }
}

#[async_trait]
impl RecallStrategy for HotRecallStrategy {
    async fn recall(&self, ctx: &RecallContext, limit: usize) -> Result<Vec<Candidate>> {
        let items = self
            .news_repo
            .trending(Duration::hours(self.window_hours), ctx.category_id, limit)
            .await?;

        if items.is_empty() {
            debug!(user_id = ctx.user_id, "No trending news in window");
        }

        Ok(items
            .into_iter()
            .map(|news| {
                Candidate::new(news, RecallSource::Hot, 0.0).with_reason("Trending right now")
            })
            .collect())
    }

    fn source(&self) -> RecallSource {
        RecallSource::Hot
    }
}
