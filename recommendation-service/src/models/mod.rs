use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{AppError, Result};

/// News article as exposed by the news repository. Read-only to this crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsItem {
    pub id: i64,
    pub title: String,
    pub summary: Option<String>,
    pub source: String,
    pub author: Option<String>,
    pub image_url: Option<String>,
    pub category_id: i64,
    pub category_name: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub language: String,
    pub reading_time: i32,
    /// Content quality score (0-1)
    pub quality_score: f32,
    /// Sentiment analysis score (-1 to 1)
    pub sentiment_score: f32,
    pub view_count: i64,
    pub like_count: i64,
    pub share_count: i64,
    pub popularity_score: f32,
    pub trending_score: f32,
    pub is_breaking: bool,
    pub is_featured: bool,
    pub published_at: DateTime<Utc>,
}

/// User warmth classification, drives the recall strategy mix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Warmth {
    ColdStart,
    Warm,
}

/// Derived user preference signal supplied by the profile provider.
///
/// Missing category/tag entries imply weight 0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSignal {
    pub warmth: Warmth,
    /// category_id → preference weight (0-1)
    #[serde(default)]
    pub preferred_categories: HashMap<i64, f32>,
    /// tag → preference weight (0-1)
    #[serde(default)]
    pub preferred_tags: HashMap<String, f32>,
    pub diversity_preference: f32,
    pub novelty_preference: f32,
    pub quality_threshold: f32,
}

impl UserSignal {
    /// Signal used when the profile provider has nothing for the user
    /// or is unreachable.
    pub fn cold_start() -> Self {
        Self {
            warmth: Warmth::ColdStart,
            preferred_categories: HashMap::new(),
            preferred_tags: HashMap::new(),
            diversity_preference: 0.5,
            novelty_preference: 0.5,
            quality_threshold: 0.0,
        }
    }

    pub fn category_weight(&self, category_id: i64) -> f32 {
        self.preferred_categories
            .get(&category_id)
            .copied()
            .unwrap_or(0.0)
    }

    pub fn tag_weight(&self, tag: &str) -> f32 {
        self.preferred_tags.get(tag).copied().unwrap_or(0.0)
    }
}

impl Default for UserSignal {
    fn default() -> Self {
        Self::cold_start()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecallSource {
    Hot,
    Featured,
    Fresh,
    ContentBased,
    Collaborative,
    Discovery,
}

impl RecallSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecallSource::Hot => "hot",
            RecallSource::Featured => "featured",
            RecallSource::Fresh => "fresh",
            RecallSource::ContentBased => "content",
            RecallSource::Collaborative => "collaborative",
            RecallSource::Discovery => "discovery",
        }
    }
}

/// Candidate produced during recall, scored and reranked in-process.
/// Never persisted.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub news: NewsItem,
    pub recall_source: RecallSource,
    pub strategy_weight: f32,
    pub recommendation_score: f32,
    pub recommendation_reason: Option<String>,
    /// Cleared by the quality gate; ineligible candidates are dropped
    /// before reranking.
    pub eligible: bool,
}

impl Candidate {
    pub fn new(news: NewsItem, recall_source: RecallSource, strategy_weight: f32) -> Self {
        Self {
            news,
            recall_source,
            strategy_weight,
            recommendation_score: 0.0,
            recommendation_reason: None,
            eligible: true,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.recommendation_reason = Some(reason.into());
        self
    }
}

/// Recommendation request parameters and filters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationRequest {
    pub page: u32,
    pub page_size: u32,
    pub category_id: Option<i64>,
    pub include_breaking: bool,
    pub include_featured: bool,
    pub diversify: bool,
    /// Share of the candidate pool reserved for discovery recall (0-1).
    pub explore_ratio: f32,
    /// Bypass the cache read but still write a fresh entry.
    #[serde(default)]
    pub refresh: bool,
}

impl Default for RecommendationRequest {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 20,
            category_id: None,
            include_breaking: true,
            include_featured: true,
            diversify: true,
            explore_ratio: 0.1,
            refresh: false,
        }
    }
}

impl RecommendationRequest {
    pub fn validate(&self) -> Result<()> {
        if self.page < 1 {
            return Err(AppError::InvalidArgument("page must be >= 1".into()));
        }
        if self.page_size < 1 || self.page_size > 100 {
            return Err(AppError::InvalidArgument(
                "page_size must be between 1 and 100".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.explore_ratio) {
            return Err(AppError::InvalidArgument(
                "explore_ratio must be between 0.0 and 1.0".into(),
            ));
        }
        Ok(())
    }

    /// Stable filter fingerprint for the cache key. Two requests with the
    /// same fingerprint and page are interchangeable; `refresh` and `page`
    /// are deliberately excluded.
    pub fn filter_fingerprint(&self) -> String {
        format!(
            "c{}:b{}:f{}:d{}:e{:.2}:s{}",
            self.category_id.map_or("any".to_string(), |c| c.to_string()),
            self.include_breaking as u8,
            self.include_featured as u8,
            self.diversify as u8,
            self.explore_ratio,
            self.page_size,
        )
    }
}

/// One entry of a recommendation page. Field names match what the
/// web frontend consumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationItem {
    pub news_id: i64,
    pub title: String,
    pub summary: Option<String>,
    pub source: String,
    pub author: Option<String>,
    pub image_url: Option<String>,
    pub category_id: i64,
    pub category_name: Option<String>,
    pub tags: Vec<String>,
    pub reading_time: i32,
    pub popularity_score: f32,
    pub trending_score: f32,
    pub is_featured: bool,
    pub is_breaking: bool,
    pub published_at: DateTime<Utc>,
    pub position: u32,
    pub recommendation_score: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recall_strategy: Option<String>,
}

impl RecommendationItem {
    pub fn from_candidate(position: u32, candidate: &Candidate) -> Self {
        let news = &candidate.news;
        Self {
            news_id: news.id,
            title: news.title.clone(),
            summary: news.summary.clone(),
            source: news.source.clone(),
            author: news.author.clone(),
            image_url: news.image_url.clone(),
            category_id: news.category_id,
            category_name: news.category_name.clone(),
            tags: news.tags.clone(),
            reading_time: news.reading_time,
            popularity_score: news.popularity_score,
            trending_score: news.trending_score,
            is_featured: news.is_featured,
            is_breaking: news.is_breaking,
            published_at: news.published_at,
            position,
            recommendation_score: candidate.recommendation_score,
            recommendation_reason: candidate.recommendation_reason.clone(),
            recall_strategy: Some(candidate.recall_source.as_str().to_string()),
        }
    }
}

/// Serving result for one orchestration run. Cached as a whole under
/// `rec:{user_id}:{fingerprint}:{page}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationPage {
    pub items: Vec<RecommendationItem>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub recommendation_id: String,
    pub algorithm_version: String,
    pub timestamp: DateTime<Utc>,
    pub has_next: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl RecommendationPage {
    /// Empty page for the all-strategies-exhausted case. Not an error.
    pub fn empty(page: u32, page_size: u32, recommendation_id: String, version: &str) -> Self {
        Self {
            items: Vec::new(),
            total: 0,
            page,
            page_size,
            recommendation_id,
            algorithm_version: version.to_string(),
            timestamp: Utc::now(),
            has_next: false,
            metadata: None,
        }
    }
}

/// Per-request recall bookkeeping, logged after the merge step.
#[derive(Debug, Clone, Default)]
pub struct RecallStats {
    pub hot_count: usize,
    pub featured_count: usize,
    pub fresh_count: usize,
    pub content_count: usize,
    pub collaborative_count: usize,
    pub discovery_count: usize,
    pub total_candidates: usize,
}

impl RecallStats {
    pub fn record(&mut self, source: RecallSource, count: usize) {
        match source {
            RecallSource::Hot => self.hot_count = count,
            RecallSource::Featured => self.featured_count = count,
            RecallSource::Fresh => self.fresh_count = count,
            RecallSource::ContentBased => self.content_count = count,
            RecallSource::Collaborative => self.collaborative_count = count,
            RecallSource::Discovery => self.discovery_count = count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_validation() {
        let mut request = RecommendationRequest::default();
        assert!(request.validate().is_ok());

        request.page = 0;
        assert!(request.validate().is_err());

        request.page = 1;
        request.page_size = 101;
        assert!(request.validate().is_err());

        request.page_size = 20;
        request.explore_ratio = 1.5;
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_filter_fingerprint_excludes_page_and_refresh() {
        let a = RecommendationRequest {
            page: 1,
            ..Default::default()
        };
        let b = RecommendationRequest {
            page: 7,
            refresh: true,
            ..Default::default()
        };
        assert_eq!(a.filter_fingerprint(), b.filter_fingerprint());

        let c = RecommendationRequest {
            category_id: Some(3),
            ..Default::default()
        };
        assert_ne!(a.filter_fingerprint(), c.filter_fingerprint());
    }

    #[test]
    fn test_missing_preference_entries_imply_zero() {
        let signal = UserSignal::cold_start();
        assert_eq!(signal.category_weight(42), 0.0);
        assert_eq!(signal.tag_weight("economy"), 0.0);
    }
}
