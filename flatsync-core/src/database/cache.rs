use std::fmt;
use std::future::Future;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use tracing::{debug, info, warn};

use crate::database::ports::cache_invalidation::CacheInvalidator;
use crate::error::{Result, SyncError};

/// Deletes Redis keys matching catalog cache patterns.
#[derive(Clone)]
pub struct RedisCacheInvalidator {
    conn: ConnectionManager,
}

impl fmt::Debug for RedisCacheInvalidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisCacheInvalidator")
            .field("connection", &"ConnectionManager")
            .finish()
    }
}

impl RedisCacheInvalidator {
    pub async fn new(redis_url: &str) -> Result<Self> {
        info!("Connecting to Redis cache at {}", redis_url);

        let client = redis::Client::open(redis_url).map_err(|e| {
            SyncError::Storage(format!("Failed to create Redis client: {e}"))
        })?;

        let conn = ConnectionManager::new(client).await.map_err(|e| {
            SyncError::Storage(format!("Failed to connect to Redis: {e}"))
        })?;

        info!("Successfully connected to Redis cache");

        Ok(Self { conn })
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<u64> {
        let mut conn = self.conn.clone();
        let keys: Vec<String> = redis::cmd("KEYS")
            .arg(pattern)
            .query_async(&mut conn)
            .await
            .map_err(|e| {
                SyncError::Storage(format!("Redis KEYS failed: {e}"))
            })?;

        if keys.is_empty() {
            return Ok(0);
        }

        let deleted: u64 = redis::cmd("DEL")
            .arg(&keys)
            .query_async(&mut conn)
            .await
            .map_err(|e| {
                SyncError::Storage(format!("Redis DEL failed: {e}"))
            })?;

        debug!("Cache DEL pattern {}: {} keys", pattern, deleted);
        Ok(deleted)
    }
}

/// Runs `delete` for every pattern, carrying on past failures. Returns the
/// number of keys deleted, or one error naming every pattern that failed.
async fn delete_each<'a, F, Fut>(patterns: &'a [String], mut delete: F) -> Result<u64>
where
    F: FnMut(&'a str) -> Fut,
    Fut: Future<Output = Result<u64>>,
{
    let mut deleted = 0;
    let mut failures = Vec::new();
    for pattern in patterns {
        match delete(pattern).await {
            Ok(n) => deleted += n,
            Err(err) => {
                warn!(pattern = %pattern, error = %err, "cache pattern invalidation failed");
                failures.push(format!("{pattern}: {err}"));
            }
        }
    }
    if failures.is_empty() {
        return Ok(deleted);
    }
    Err(SyncError::Storage(format!(
        "{} of {} cache patterns failed: {}",
        failures.len(),
        patterns.len(),
        failures.join("; ")
    )))
}

#[async_trait]
impl CacheInvalidator for RedisCacheInvalidator {
    async fn invalidate(&self, patterns: &[String]) -> Result<()> {
        let deleted =
            delete_each(patterns, |pattern| self.delete_pattern(pattern)).await?;
        debug!(patterns = patterns.len(), deleted, "cache invalidated");
        Ok(())
    }
}
