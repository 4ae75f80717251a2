use async_trait::async_trait;
use std::sync::Arc;

use super::{RecallContext, RecallStrategy};
use crate::error::Result;
use crate::models::{Candidate, RecallSource};
use crate::repository::NewsRepository;

/// Fresh recall: most recently published items.
pub struct FreshRecallStrategy {
    news_repo: Arc<dyn NewsRepository>,
}

impl FreshRecallStrategy {
    pub fn new(news_repo: Arc<dyn NewsRepository>) -> Self {
        Self { news_repo }
    }
}

#[async_trait]
impl RecallStrategy for FreshRecallStrategy {
    async fn recall(&self, ctx: &RecallContext, limit: usize) -> Result<Vec<Candidate>> {
        let items = self.news_repo.latest(ctx.category_id, limit).await?;

        Ok(items
            .into_iter()
            .map(|news| {
                Candidate::new(news, RecallSource::Fresh, 0.0).with_reason("Just published")
            })
            .collect())
    }

    fn source(&self) -> RecallSource {
        RecallSource::Fresh
    }
}
