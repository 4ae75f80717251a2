use async_trait::async_trait;
use std::sync::Arc;

use super::{RecallContext, RecallStrategy};
use crate::error::Result;
use crate::models::{Candidate, RecallSource};
use crate::repository::{NewsQuery, NewsRepository, NewsSort};

/// Featured recall: editorially flagged items, newest first.
/// Part of the cold-start mix only.
pub struct FeaturedRecallStrategy {
    news_repo: Arc<dyn NewsRepository>,
}

impl FeaturedRecallStrategy {
    pub fn new(news_repo: Arc<dyn NewsRepository>) -> Self {
        Self { news_repo }
    }
}

#[async_trait]
impl RecallStrategy for FeaturedRecallStrategy {
    async fn recall(&self, ctx: &RecallContext, limit: usize) -> Result<Vec<Candidate>> {
        let query = NewsQuery::new(limit)
            .category(ctx.category_id)
            .featured(true)
            .sort(NewsSort::PublishedAtDesc);

        let items = self.news_repo.query(&query).await?;

        Ok(items
            .into_iter()
            .map(|news| {
                Candidate::new(news, RecallSource::Featured, 0.0).with_reason("Editor's pick")
            })
            .collect())
    }

    fn source(&self) -> RecallSource {
        RecallSource::Featured
    }
}
