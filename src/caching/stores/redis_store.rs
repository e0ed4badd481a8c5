//! # Redis Cache Store
//!
//! Shared cache backed by Redis, for deployments where several processes
//! should see each other's cached reads.

use super::{CacheStore, CacheStoreStats};
use crate::caching::{CacheError, CacheResult};
use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client, RedisResult};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

/// Redis cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisCacheConfig {
    /// Redis connection URL
    pub url: String,

    /// Namespace prepended to every key written by this store
    pub key_prefix: String,

    /// Maximum number of retries per operation
    pub max_retries: u32,

    /// Delay before the first retry, multiplied by the attempt number
    pub retry_delay: Duration,
}

impl Default for RedisCacheConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            key_prefix: "aws-bundle:".to_string(),
            max_retries: 3,
            retry_delay: Duration::from_millis(100),
        }
    }
}

/// `key` under the store's namespace
fn namespaced_key(prefix: &str, key: &str) -> String {
    format!("{}{}", prefix, key)
}

/// Whole seconds for `SETEX`, rounded up and at least one
fn expiry_seconds(ttl: Duration) -> u64 {
    let rounded = ttl.as_secs().saturating_add(u64::from(ttl.subsec_nanos() > 0));
    rounded.max(1)
}

type RedisFuture<'a, T> = Pin<Box<dyn Future<Output = RedisResult<T>> + Send + 'a>>;

/// Redis cache implementation
pub struct RedisCache {
    config: RedisCacheConfig,

    connection_manager: RwLock<ConnectionManager>,

    hits: AtomicU64,
    misses: AtomicU64,
    connection_errors: AtomicU64,
}

impl RedisCache {
    /// Connect to Redis
    pub async fn new(config: RedisCacheConfig) -> CacheResult<Self> {
        let client = Client::open(config.url.as_str())?;
        let connection_manager = ConnectionManager::new(client).await?;

        info!(url = %config.url, "Redis cache connected");

        Ok(Self {
            config,
            connection_manager: RwLock::new(connection_manager),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            connection_errors: AtomicU64::new(0),
        })
    }

    /// Get the full cache key with prefix
    fn full_key(&self, key: &str) -> String {
        namespaced_key(&self.config.key_prefix, key)
    }

    /// Number of failed Redis round trips so far
    pub fn connection_errors(&self) -> u64 {
        self.connection_errors.load(Ordering::Relaxed)
    }

    /// Execute a Redis operation with retry logic
    ///
    /// The last error is returned once retries are exhausted; callers see a
    /// store failure rather than a silent miss.
    async fn execute_with_retry<F, T>(&self, operation: F) -> CacheResult<T>
    where
        F: for<'c> Fn(&'c mut ConnectionManager) -> RedisFuture<'c, T> + Send + Sync,
        T: Send,
    {
        let mut retries = 0;

        loop {
            let mut conn = self.connection_manager.write().await;

            match operation(&mut *conn).await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    error!(error = %e, attempt = retries + 1, "Redis operation failed");
                    self.connection_errors.fetch_add(1, Ordering::Relaxed);

                    if retries >= self.config.max_retries {
                        return Err(CacheError::Redis(e));
                    }

                    retries += 1;
                    drop(conn);

                    tokio::time::sleep(self.config.retry_delay * retries).await;

                    if let Err(reconnect_err) = self.reconnect().await {
                        warn!(error = %reconnect_err, "Failed to reconnect to Redis");
                    }
                }
            }
        }
    }

    /// Replace the connection manager with a fresh one
    async fn reconnect(&self) -> CacheResult<()> {
        let client = Client::open(self.config.url.as_str())?;
        let new_connection_manager = ConnectionManager::new(client).await?;

        let mut conn = self.connection_manager.write().await;
        *conn = new_connection_manager;

        info!("Reconnected to Redis");
        Ok(())
    }

    /// All keys under this store's namespace
    async fn scan_keys(&self) -> CacheResult<Vec<String>> {
        let pattern = format!("{}*", self.config.key_prefix);

        self.execute_with_retry(|conn| {
            let pattern = pattern.clone();
            Box::pin(async move {
                let mut cursor = 0u64;
                let mut all_keys = Vec::new();

                loop {
                    let (new_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                        .arg(cursor)
                        .arg("MATCH")
                        .arg(&pattern)
                        .arg("COUNT")
                        .arg(1000)
                        .query_async(conn)
                        .await?;

                    all_keys.extend(keys);

                    if new_cursor == 0 {
                        break;
                    }
                    cursor = new_cursor;
                }

                Ok::<_, redis::RedisError>(all_keys)
            })
        })
        .await
    }
}

#[async_trait]
impl CacheStore for RedisCache {
    async fn has(&self, key: &str) -> CacheResult<bool> {
        let full_key = self.full_key(key);

        self.execute_with_retry(|conn| {
            let full_key = full_key.clone();
            Box::pin(async move { conn.exists(&full_key).await })
        })
        .await
    }

    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        let full_key = self.full_key(key);

        let value: Option<Vec<u8>> = self
            .execute_with_retry(|conn| {
                let full_key = full_key.clone();
                Box::pin(async move { conn.get(&full_key).await })
            })
            .await?;

        if value.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!(key = %key, "Redis cache hit");
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            debug!(key = %key, "Redis cache miss");
        }

        Ok(value)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> CacheResult<()> {
        let full_key = self.full_key(key);
        let value = value.to_vec();

        match ttl {
            Some(ttl) => {
                let ttl_seconds = expiry_seconds(ttl);
                self.execute_with_retry(|conn| {
                    let full_key = full_key.clone();
                    let value = value.clone();
                    Box::pin(async move { conn.set_ex::<_, _, ()>(&full_key, &value, ttl_seconds).await })
                })
                .await?;
            }
            None => {
                self.execute_with_retry(|conn| {
                    let full_key = full_key.clone();
                    let value = value.clone();
                    Box::pin(async move { conn.set::<_, _, ()>(&full_key, &value).await })
                })
                .await?;
            }
        }

        debug!(key = %key, ttl = ?ttl, "Set Redis cache key");
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        let full_key = self.full_key(key);

        let deleted_count: i64 = self
            .execute_with_retry(|conn| {
                let full_key = full_key.clone();
                Box::pin(async move { conn.del(&full_key).await })
            })
            .await?;

        Ok(deleted_count > 0)
    }

    async fn clear(&self) -> CacheResult<()> {
        let keys = self.scan_keys().await?;

        if !keys.is_empty() {
            let deleted_count: i64 = self
                .execute_with_retry(|conn| {
                    let keys = keys.clone();
                    Box::pin(async move { conn.del(&keys).await })
                })
                .await?;

            info!(deleted = deleted_count, "Cleared Redis cache namespace");
        }

        Ok(())
    }

    async fn stats(&self) -> CacheResult<CacheStoreStats> {
        let info: String = self
            .execute_with_retry(|conn| {
                Box::pin(async move { redis::cmd("INFO").arg("memory").query_async(conn).await })
            })
            .await
            .unwrap_or_default();

        let memory_usage = info
            .lines()
            .find(|line| line.starts_with("used_memory:"))
            .and_then(|line| line.split(':').nth(1))
            .and_then(|value| value.trim().parse::<usize>().ok())
            .unwrap_or(0);

        let entries = self.scan_keys().await.map(|keys| keys.len()).unwrap_or(0);

        Ok(CacheStoreStats {
            entries,
            memory_usage,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: 0,        // Redis handles eviction internally
            expired_cleanups: 0, // Redis handles TTL cleanup internally
        })
    }

    async fn health_check(&self) -> CacheResult<bool> {
        let result: CacheResult<String> = self
            .execute_with_retry(|conn| {
                Box::pin(async move { redis::cmd("PING").query_async(conn).await })
            })
            .await;

        Ok(matches!(result, Ok(response) if response == "PONG"))
    }
}
