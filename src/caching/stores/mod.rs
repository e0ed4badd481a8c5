//! # Cache Stores Module
//!
//! The cache capability consumed by the read-through wrapper, plus the
//! in-memory and Redis implementations shipped with the bundle.

pub mod memory;
pub mod redis_store;

pub use memory::{InMemoryCache, InMemoryCacheConfig};
pub use redis_store::{RedisCache, RedisCacheConfig};

use super::CacheResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch
pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Cache entry with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// The cached value
    pub value: Vec<u8>,

    /// When the entry was created (ms since epoch)
    pub created_at: u64,

    /// When the entry expires (ms since epoch); `None` never expires
    pub expires_at: Option<u64>,

    /// Number of times this entry has been read
    pub access_count: u64,

    /// Size of the entry in bytes
    pub size: usize,
}

impl CacheEntry {
    /// Create a new cache entry
    pub fn new(value: Vec<u8>, ttl: Option<Duration>) -> Self {
        let now = now_millis();
        let size = value.len() + std::mem::size_of::<Self>();

        Self {
            value,
            created_at: now,
            // TTLs past the end of the u64 clock never expire
            expires_at: ttl.and_then(|ttl| {
                u64::try_from(ttl.as_millis())
                    .ok()
                    .and_then(|ms| now.checked_add(ms))
            }),
            access_count: 0,
            size,
        }
    }

    /// Check if the entry is expired
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => now_millis() >= expires_at,
            None => false,
        }
    }

    /// Mark the entry as read
    pub fn mark_accessed(&mut self) {
        self.access_count += 1;
    }

    /// Age of the entry
    pub fn age(&self) -> Duration {
        Duration::from_millis(now_millis().saturating_sub(self.created_at))
    }

    /// Time until expiration, `None` for entries without TTL
    pub fn ttl(&self) -> Option<Duration> {
        self.expires_at
            .map(|expires_at| Duration::from_millis(expires_at.saturating_sub(now_millis())))
    }
}

/// Cache capability: `has` / `get` / `set` plus housekeeping
///
/// Eviction is the store's own business; callers only rely on entries
/// disappearing at some point after their TTL.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Check if a live entry exists for `key`
    async fn has(&self, key: &str) -> CacheResult<bool>;

    /// Get the stored bytes for `key`
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>>;

    /// Store `value` under `key`; `None` TTL keeps it until evicted
    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> CacheResult<()>;

    /// Delete a value from the cache
    async fn delete(&self, key: &str) -> CacheResult<bool>;

    /// Clear all entries from the cache
    async fn clear(&self) -> CacheResult<()>;

    /// Get cache statistics
    async fn stats(&self) -> CacheResult<CacheStoreStats>;

    /// Perform health check
    async fn health_check(&self) -> CacheResult<bool>;
}

#[async_trait]
impl<T: CacheStore + ?Sized> CacheStore for Arc<T> {
    async fn has(&self, key: &str) -> CacheResult<bool> {
        (**self).has(key).await
    }

    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> CacheResult<()> {
        (**self).set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        (**self).delete(key).await
    }

    async fn clear(&self) -> CacheResult<()> {
        (**self).clear().await
    }

    async fn stats(&self) -> CacheResult<CacheStoreStats> {
        (**self).stats().await
    }

    async fn health_check(&self) -> CacheResult<bool> {
        (**self).health_check().await
    }
}

/// Cache store statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStoreStats {
    /// Number of entries
    pub entries: usize,

    /// Total memory usage in bytes
    pub memory_usage: usize,

    /// Number of hits
    pub hits: u64,

    /// Number of misses
    pub misses: u64,

    /// Number of evictions
    pub evictions: u64,

    /// Number of expired entries cleaned up
    pub expired_cleanups: u64,
}
