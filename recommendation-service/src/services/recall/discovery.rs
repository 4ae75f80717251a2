use async_trait::async_trait;
use chrono::Duration;
use std::sync::Arc;

use super::{RecallContext, RecallStrategy};
use crate::error::Result;
use crate::models::{Candidate, RecallSource};
use crate::repository::{NewsQuery, NewsRepository, NewsSort};

/// Recent-content window for exploration.
const DISCOVERY_WINDOW_DAYS: i64 = 7;

/// Discovery recall: recent items with the least exposure, for
/// exploration. When the user signals novelty appetite, items from their
/// strongest categories are pushed toward the back so unfamiliar territory
/// surfaces first.
pub struct DiscoveryRecallStrategy {
    news_repo: Arc<dyn NewsRepository>,
}

impl DiscoveryRecallStrategy {
    pub fn new(news_repo: Arc<dyn NewsRepository>) -> Self {
        Self { news_repo }
    }
}

#[async_trait]
impl RecallStrategy for DiscoveryRecallStrategy {
    async fn recall(&self, ctx: &RecallContext, limit: usize) -> Result<Vec<Candidate>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let query = NewsQuery::new(limit)
            .category(ctx.category_id)
            .published_after(ctx.now - Duration::days(DISCOVERY_WINDOW_DAYS))
            .sort(NewsSort::ViewCountAsc);

        let items = self.news_repo.query(&query).await?;

        let mut candidates: Vec<Candidate> = items
            .into_iter()
            .map(|news| {
                Candidate::new(news, RecallSource::Discovery, 0.0)
                    .with_reason("Something different")
            })
            .collect();

        if ctx.signal.novelty_preference > 0.0 {
            // Stable: least-familiar categories first, exposure order preserved within
            candidates.sort_by(|a, b| {
                ctx.signal
                    .category_weight(a.news.category_id)
                    .partial_cmp(&ctx.signal.category_weight(b.news.category_id))
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        }

        Ok(candidates)
    }

    fn source(&self) -> RecallSource {
        RecallSource::Discovery
    }
}
