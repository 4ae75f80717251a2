//! Caching layer for computed recommendation pages.
//!
//! Pages are cached whole, keyed by `{prefix}:{user_id}:{fingerprint}:{page}`,
//! with a short TTL matching the client-side staleness window. Cache failures
//! are surfaced as `AppError::Cache` and degraded to a miss by the caller;
//! they never fail a request.

use async_trait::async_trait;
use dashmap::DashMap;
use redis::aio::ConnectionManager;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::error::{AppError, Result};
use crate::models::RecommendationPage;

pub fn page_key(prefix: &str, user_id: i64, fingerprint: &str, page: u32) -> String {
    format!("{}:{}:{}:{}", prefix, user_id, fingerprint, page)
}

pub fn user_prefix(prefix: &str, user_id: i64) -> String {
    format!("{}:{}:", prefix, user_id)
}

#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<RecommendationPage>>;

    async fn set(&self, key: &str, page: &RecommendationPage, ttl: Duration) -> Result<()>;

    /// Deletes every entry whose key starts with `prefix`. Returns the
    /// number of entries removed.
    async fn invalidate_prefix(&self, prefix: &str) -> Result<usize>;
}

/// Redis-backed page cache.
#[derive(Clone)]
pub struct RedisCacheStore {
    client: Arc<ConnectionManager>,
}

impl RedisCacheStore {
    pub async fn new(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| AppError::Cache(format!("Failed to create Redis client: {}", e)))?;

        let manager = ConnectionManager::new(client)
            .await
            .map_err(|e| AppError::Cache(format!("Failed to create Redis connection: {}", e)))?;

        Ok(Self {
            client: Arc::new(manager),
        })
    }

    /// Ping Redis to check connection health.
    pub async fn ping(&self) -> Result<()> {
        redis::cmd("PING")
            .query_async::<_, String>(&mut self.client.as_ref().clone())
            .await
            .map_err(|e| {
                warn!("Redis PING failed: {}", e);
                AppError::Cache(format!("Redis health check failed: {}", e))
            })?;
        Ok(())
    }
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn get(&self, key: &str) -> Result<Option<RecommendationPage>> {
        let value: Option<String> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut self.client.as_ref().clone())
            .await
            .map_err(|e| {
                warn!("Redis GET failed for {}: {}", key, e);
                AppError::Cache(format!("Redis error: {}", e))
            })?;

        match value {
            Some(json) => {
                let page = serde_json::from_str::<RecommendationPage>(&json)
                    .map_err(|e| AppError::Cache(format!("Cache deserialization failed: {}", e)))?;
                debug!("Cache hit for {}", key);
                Ok(Some(page))
            }
            None => {
                debug!("Cache miss for {}", key);
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, page: &RecommendationPage, ttl: Duration) -> Result<()> {
        let json = serde_json::to_string(page)
            .map_err(|e| AppError::Cache(format!("Cache serialization failed: {}", e)))?;

        redis::cmd("SETEX")
            .arg(key)
            .arg(ttl.as_secs())
            .arg(&json)
            .query_async::<_, ()>(&mut self.client.as_ref().clone())
            .await
            .map_err(|e| {
                warn!("Redis SETEX failed for {}: {}", key, e);
                AppError::Cache(format!("Redis error: {}", e))
            })?;

        debug!("Cached {} with TTL={}s", key, ttl.as_secs());
        Ok(())
    }

    async fn invalidate_prefix(&self, prefix: &str) -> Result<usize> {
        // SCAN is non-blocking unlike KEYS
        let pattern = format!("{}*", prefix);
        let mut cursor: u64 = 0;
        let mut total_deleted = 0;

        loop {
            let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut self.client.as_ref().clone())
                .await
                .map_err(|e| {
                    warn!("Redis SCAN failed for {}: {}", pattern, e);
                    AppError::Cache(format!("Redis error: {}", e))
                })?;

            if !keys.is_empty() {
                redis::cmd("DEL")
                    .arg(&keys)
                    .query_async::<_, ()>(&mut self.client.as_ref().clone())
                    .await
                    .map_err(|e| {
                        warn!("Redis DEL failed: {}", e);
                        AppError::Cache(format!("Redis error: {}", e))
                    })?;
                total_deleted += keys.len();
            }

            cursor = next_cursor;
            if cursor == 0 {
                break;
            }
        }

        if total_deleted > 0 {
            debug!("Invalidated {} cache entries under {}", total_deleted, prefix);
        }

        Ok(total_deleted)
    }
}

/// In-process page cache with per-entry expiry. Used in tests and as a
/// fallback when no Redis is deployed.
#[derive(Default)]
pub struct MemoryCacheStore {
    entries: DashMap<String, (RecommendationPage, Instant)>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<RecommendationPage>> {
        if let Some(entry) = self.entries.get(key) {
            let (page, expires_at) = entry.value();
            if Instant::now() < *expires_at {
                return Ok(Some(page.clone()));
            }
        }
        // Expired entries are dropped on the next read
        self.entries
            .remove_if(key, |_, (_, expires_at)| Instant::now() >= *expires_at);
        Ok(None)
    }

    async fn set(&self, key: &str, page: &RecommendationPage, ttl: Duration) -> Result<()> {
        self.entries
            .insert(key.to_string(), (page.clone(), Instant::now() + ttl));
        Ok(())
    }

    async fn invalidate_prefix(&self, prefix: &str) -> Result<usize> {
        let before = self.entries.len();
        self.entries.retain(|key, _| !key.starts_with(prefix));
        Ok(before - self.entries.len())
    }
}
