//! Ports to the excluded collaborators: news storage, behavior storage,
//! and the profile provider. The core only ever talks to these traits;
//! the API layer wires in the concrete implementations.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{NewsItem, UserSignal};

/// Sort order for repository queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NewsSort {
    #[default]
    PublishedAtDesc,
    TrendingDesc,
    PopularityDesc,
    /// Least-exposed first, used by discovery recall.
    ViewCountAsc,
}

/// Filterable news query. All filters are conjunctive.
#[derive(Debug, Clone, Default)]
pub struct NewsQuery {
    pub category_id: Option<i64>,
    pub category_ids: Option<Vec<i64>>,
    pub is_featured: Option<bool>,
    pub is_breaking: Option<bool>,
    pub published_after: Option<DateTime<Utc>>,
    pub min_quality: Option<f32>,
    pub sort: NewsSort,
    pub limit: usize,
    pub offset: usize,
}

impl NewsQuery {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            ..Default::default()
        }
    }

    pub fn category(mut self, category_id: Option<i64>) -> Self {
        self.category_id = category_id;
        self
    }

    pub fn categories(mut self, category_ids: Vec<i64>) -> Self {
        self.category_ids = Some(category_ids);
        self
    }

    pub fn featured(mut self, featured: bool) -> Self {
        self.is_featured = Some(featured);
        self
    }

    pub fn published_after(mut self, after: DateTime<Utc>) -> Self {
        self.published_after = Some(after);
        self
    }

    pub fn min_quality(mut self, threshold: f32) -> Self {
        self.min_quality = Some(threshold);
        self
    }

    pub fn sort(mut self, sort: NewsSort) -> Self {
        self.sort = sort;
        self
    }
}

#[async_trait]
pub trait NewsRepository: Send + Sync {
    async fn find_by_ids(&self, ids: &[i64]) -> Result<Vec<NewsItem>>;

    async fn query(&self, query: &NewsQuery) -> Result<Vec<NewsItem>>;

    /// Highest trending_score within the window, most trending first.
    async fn trending(
        &self,
        window: Duration,
        category_id: Option<i64>,
        limit: usize,
    ) -> Result<Vec<NewsItem>>;

    /// Most recently published, newest first.
    async fn latest(&self, category_id: Option<i64>, limit: usize) -> Result<Vec<NewsItem>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BehaviorType {
    View,
    Click,
    Read,
    Like,
    Bookmark,
    Share,
}

impl BehaviorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BehaviorType::View => "view",
            BehaviorType::Click => "click",
            BehaviorType::Read => "read",
            BehaviorType::Like => "like",
            BehaviorType::Bookmark => "bookmark",
            BehaviorType::Share => "share",
        }
    }
}

/// One tracked user action, correlated back to the serving run that
/// produced it via `recommendation_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BehaviorEvent {
    pub user_id: i64,
    pub news_id: i64,
    pub behavior_type: BehaviorType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// News co-engaged by users similar to the target user.
#[derive(Debug, Clone)]
pub struct CoEngagement {
    pub news_id: i64,
    /// Aggregated co-engagement strength, higher is stronger.
    pub strength: f32,
}

/// Aggregated behavior signals for collaborative recall.
#[derive(Debug, Clone, Default)]
pub struct EngagementSummary {
    /// News the user already engaged with; excluded from recommendations.
    pub engaged_news_ids: Vec<i64>,
    pub co_engaged: Vec<CoEngagement>,
}

#[async_trait]
pub trait BehaviorRepository: Send + Sync {
    async fn record_batch(&self, events: &[BehaviorEvent]) -> Result<()>;

    async fn record(&self, event: BehaviorEvent) -> Result<()> {
        self.record_batch(std::slice::from_ref(&event)).await
    }

    async fn aggregate_for_user(&self, user_id: i64) -> Result<EngagementSummary>;
}

#[async_trait]
pub trait ProfileProvider: Send + Sync {
    /// `None` means the user has no profile yet (treated as cold-start).
    async fn get_signal(&self, user_id: i64) -> Result<Option<UserSignal>>;
}
