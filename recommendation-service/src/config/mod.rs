use serde::Deserialize;
use std::env;
use std::str::FromStr;

use crate::error::{AppError, Result};

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    pub recall: RecallConfig,
    pub ranking: RankingConfig,
    pub diversity: DiversityConfig,
    pub cache: CacheConfig,
    pub tracking: TrackingConfig,
}

/// Recall strategy mix. Weights are mix ratios of the target pool,
/// not hard partitions; shortfall is backfilled weight-descending.
#[derive(Debug, Clone, Deserialize)]
pub struct RecallConfig {
    pub cold_hot_weight: f32,
    pub cold_featured_weight: f32,
    pub cold_fresh_weight: f32,
    pub warm_content_weight: f32,
    pub warm_collaborative_weight: f32,
    pub warm_hot_weight: f32,
    pub warm_fresh_weight: f32,
    /// Window for hot recall, hours.
    pub hot_window_hours: i64,
    /// Per-strategy call timeout, seconds.
    pub strategy_timeout_secs: u64,
    /// Candidate pool depth in pages of page_size. Page-independent so
    /// every page of one filter set is sliced from the same ranked pool.
    pub pool_pages: u32,
}

impl Default for RecallConfig {
    fn default() -> Self {
        Self {
            cold_hot_weight: 0.6,
            cold_featured_weight: 0.2,
            cold_fresh_weight: 0.2,
            warm_content_weight: 0.4,
            warm_collaborative_weight: 0.3,
            warm_hot_weight: 0.2,
            warm_fresh_weight: 0.1,
            hot_window_hours: 24,
            strategy_timeout_secs: 3,
            pool_pages: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RankingConfig {
    pub popularity_weight: f32,
    pub trending_weight: f32,
    pub quality_weight: f32,
    pub freshness_weight: f32,
    pub breaking_boost: f32,
    pub featured_boost: f32,
    /// Linear freshness decay horizon, hours. 1.0 at age 0, 0.0 at the horizon.
    pub freshness_horizon_hours: i64,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            popularity_weight: 0.3,
            trending_weight: 0.3,
            quality_weight: 0.2,
            freshness_weight: 0.2,
            breaking_boost: 1.5,
            featured_boost: 1.2,
            freshness_horizon_hours: 168,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DiversityConfig {
    /// Redundancy penalty per already-selected item in the same category.
    pub category_penalty: f32,
    /// Redundancy penalty per already-selected item from the same source.
    pub source_penalty: f32,
}

impl Default for DiversityConfig {
    fn default() -> Self {
        Self {
            category_penalty: 0.15,
            source_penalty: 0.10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Page cache TTL in seconds (5 minutes).
    pub ttl_secs: u64,
    pub key_prefix: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: 300,
            key_prefix: "rec".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackingConfig {
    /// Bounded queue capacity; events beyond it are dropped, not blocked on.
    pub queue_capacity: usize,
    /// Flush when this many events are buffered.
    pub batch_size: usize,
    /// Timer-triggered flush interval, seconds.
    pub flush_interval_secs: u64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            batch_size: 50,
            flush_interval_secs: 10,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Config {
            recall: RecallConfig {
                cold_hot_weight: parse_env("RECALL_COLD_HOT_WEIGHT", 0.6)?,
                cold_featured_weight: parse_env("RECALL_COLD_FEATURED_WEIGHT", 0.2)?,
                cold_fresh_weight: parse_env("RECALL_COLD_FRESH_WEIGHT", 0.2)?,
                warm_content_weight: parse_env("RECALL_WARM_CONTENT_WEIGHT", 0.4)?,
                warm_collaborative_weight: parse_env("RECALL_WARM_COLLABORATIVE_WEIGHT", 0.3)?,
                warm_hot_weight: parse_env("RECALL_WARM_HOT_WEIGHT", 0.2)?,
                warm_fresh_weight: parse_env("RECALL_WARM_FRESH_WEIGHT", 0.1)?,
                hot_window_hours: parse_env("RECALL_HOT_WINDOW_HOURS", 24)?,
                strategy_timeout_secs: parse_env("RECALL_STRATEGY_TIMEOUT_SECS", 3)?,
                pool_pages: parse_env("RECALL_POOL_PAGES", 5)?,
            },
            ranking: RankingConfig {
                popularity_weight: parse_env("RANKING_POPULARITY_WEIGHT", 0.3)?,
                trending_weight: parse_env("RANKING_TRENDING_WEIGHT", 0.3)?,
                quality_weight: parse_env("RANKING_QUALITY_WEIGHT", 0.2)?,
                freshness_weight: parse_env("RANKING_FRESHNESS_WEIGHT", 0.2)?,
                breaking_boost: parse_env("RANKING_BREAKING_BOOST", 1.5)?,
                featured_boost: parse_env("RANKING_FEATURED_BOOST", 1.2)?,
                freshness_horizon_hours: parse_env("RANKING_FRESHNESS_HORIZON_HOURS", 168)?,
            },
            diversity: DiversityConfig {
                category_penalty: parse_env("DIVERSITY_CATEGORY_PENALTY", 0.15)?,
                source_penalty: parse_env("DIVERSITY_SOURCE_PENALTY", 0.10)?,
            },
            cache: CacheConfig {
                ttl_secs: parse_env("CACHE_TTL_SECS", 300)?,
                key_prefix: env::var("CACHE_KEY_PREFIX").unwrap_or_else(|_| "rec".to_string()),
            },
            tracking: TrackingConfig {
                queue_capacity: parse_env("TRACKING_QUEUE_CAPACITY", 1024)?,
                batch_size: parse_env("TRACKING_BATCH_SIZE", 50)?,
                flush_interval_secs: parse_env("TRACKING_FLUSH_INTERVAL_SECS", 10)?,
            },
        })
    }
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| AppError::Config(format!("{} is invalid: {}", key, e))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_mix() {
        let config = Config::default();
        assert_eq!(config.recall.cold_hot_weight, 0.6);
        assert_eq!(config.recall.cold_featured_weight, 0.2);
        assert_eq!(config.recall.cold_fresh_weight, 0.2);
        assert_eq!(config.recall.warm_content_weight, 0.4);
        assert_eq!(config.recall.warm_collaborative_weight, 0.3);
        assert_eq!(config.ranking.freshness_horizon_hours, 168);
        assert_eq!(config.cache.ttl_secs, 300);
    }

    #[test]
    fn test_parse_env_rejects_garbage() {
        env::set_var("RANKING_BREAKING_BOOST", "not-a-number");
        let result = Config::from_env();
        env::remove_var("RANKING_BREAKING_BOOST");
        assert!(matches!(result, Err(AppError::Config(_))));
    }
}
