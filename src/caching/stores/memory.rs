//! # In-Memory Cache Store
//!
//! Process-local cache with TTL support, LRU eviction and a background task
//! that purges expired entries.

use super::{CacheEntry, CacheStore, CacheStoreStats};
use crate::caching::{CacheError, CacheResult};
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, info};

/// In-memory cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InMemoryCacheConfig {
    /// Maximum number of entries
    pub max_entries: usize,

    /// Maximum memory usage in bytes
    pub max_memory_bytes: usize,

    /// Cleanup interval for expired entries
    pub cleanup_interval: Duration,

    /// Enable LRU eviction
    pub enable_lru: bool,
}

impl Default for InMemoryCacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 10000,
            max_memory_bytes: 100 * 1024 * 1024, // 100MB
            cleanup_interval: Duration::from_secs(60),
            enable_lru: true,
        }
    }
}

/// LRU tracking for cache entries
#[derive(Debug)]
struct LruEntry {
    key: String,
    access_seq: u64,
}

/// In-memory cache implementation
pub struct InMemoryCache {
    config: InMemoryCacheConfig,

    entries: Arc<DashMap<String, CacheEntry>>,

    /// Keys with the sequence number of their last access
    lru_tracker: Arc<Mutex<Vec<LruEntry>>>,

    /// Monotonic access counter; orders accesses that land in the same millisecond
    access_seq: AtomicU64,

    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expired_cleanups: Arc<AtomicU64>,

    /// Current memory usage estimate
    memory_usage: Arc<AtomicUsize>,

    /// Cleanup task, only spawned when a Tokio runtime is available
    cleanup_task: Option<JoinHandle<()>>,
}

impl InMemoryCache {
    /// Create a new in-memory cache
    pub fn new(config: InMemoryCacheConfig) -> CacheResult<Self> {
        if config.max_entries == 0 {
            return Err(CacheError::Configuration {
                message: "max_entries must be greater than 0".to_string(),
            });
        }

        let entries = Arc::new(DashMap::new());
        let expired_cleanups = Arc::new(AtomicU64::new(0));
        let memory_usage = Arc::new(AtomicUsize::new(0));
        let lru_tracker = Arc::new(Mutex::new(Vec::new()));

        let cleanup_task = tokio::runtime::Handle::try_current().ok().map(|handle| {
            let entries = entries.clone();
            let lru_tracker = lru_tracker.clone();
            let expired_cleanups = expired_cleanups.clone();
            let memory_usage = memory_usage.clone();
            let cleanup_interval = config.cleanup_interval;

            handle.spawn(async move {
                let mut interval = interval(cleanup_interval);
                loop {
                    interval.tick().await;
                    Self::cleanup_expired_entries(&entries, &lru_tracker, &expired_cleanups, &memory_usage);
                }
            })
        });

        Ok(Self {
            config,
            entries,
            lru_tracker,
            access_seq: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            expired_cleanups,
            memory_usage,
            cleanup_task,
        })
    }

    /// Number of live and not-yet-purged entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cleanup expired entries and drop them from LRU tracking
    fn cleanup_expired_entries(
        entries: &DashMap<String, CacheEntry>,
        lru_tracker: &Mutex<Vec<LruEntry>>,
        expired_cleanups: &AtomicU64,
        memory_usage: &AtomicUsize,
    ) {
        let expired_keys: Vec<String> = entries
            .iter()
            .filter(|entry| entry.value().is_expired())
            .map(|entry| entry.key().clone())
            .collect();

        let mut freed_memory = 0;
        let mut purged = HashSet::new();

        for key in expired_keys {
            if let Some((key, entry)) = entries.remove_if(&key, |_, entry| entry.is_expired()) {
                freed_memory += entry.size;
                purged.insert(key);
            }
        }

        let cleaned_count = purged.len() as u64;
        if cleaned_count > 0 {
            lru_tracker.lock().retain(|e| !purged.contains(&e.key));
            memory_usage.fetch_sub(freed_memory, Ordering::Relaxed);
            expired_cleanups.fetch_add(cleaned_count, Ordering::Relaxed);
            debug!(
                cleaned = cleaned_count,
                freed_bytes = freed_memory,
                "Cleaned up expired cache entries"
            );
        }
    }

    /// Evict entries to make space for `incoming_key`
    fn evict_if_needed(&self, incoming_key: &str) -> CacheResult<()> {
        if self.entries.contains_key(incoming_key) {
            return Ok(());
        }

        let current_entries = self.entries.len();
        let current_memory = self.memory_usage.load(Ordering::Relaxed);

        let needs_eviction = current_entries >= self.config.max_entries
            || current_memory >= self.config.max_memory_bytes;

        if !needs_eviction {
            return Ok(());
        }

        if !self.config.enable_lru {
            return Err(CacheError::Store {
                message: "Cache is full and LRU eviction is disabled".to_string(),
            });
        }

        // Keep 90% of max entries
        let evict_count = std::cmp::max(
            current_entries.saturating_sub(self.config.max_entries * 9 / 10),
            1,
        );

        self.evict_lru_entries(evict_count);
        Ok(())
    }

    /// Evict the `count` least recently used entries
    fn evict_lru_entries(&self, count: usize) {
        let mut lru_tracker = self.lru_tracker.lock();
        lru_tracker.sort_by_key(|entry| entry.access_seq);

        let mut evicted_count = 0u64;
        let mut freed_memory = 0;

        // Tracked keys may already be gone (expired and purged), so walk until
        // `count` live entries were actually removed.
        let mut processed = 0;
        for victim in lru_tracker.iter() {
            if evicted_count as usize >= count {
                break;
            }
            processed += 1;
            if let Some((_, entry)) = self.entries.remove(&victim.key) {
                freed_memory += entry.size;
                evicted_count += 1;
            }
        }
        lru_tracker.drain(..processed);

        self.memory_usage.fetch_sub(freed_memory, Ordering::Relaxed);
        self.evictions.fetch_add(evicted_count, Ordering::Relaxed);

        info!(
            evicted = evicted_count,
            freed_bytes = freed_memory,
            "Evicted LRU cache entries"
        );
    }

    /// Update LRU tracking for a key
    fn touch(&self, key: &str) {
        if !self.config.enable_lru {
            return;
        }

        let seq = self.access_seq.fetch_add(1, Ordering::Relaxed);
        let mut lru_tracker = self.lru_tracker.lock();

        match lru_tracker.iter_mut().find(|e| e.key == key) {
            Some(entry) => entry.access_seq = seq,
            None => lru_tracker.push(LruEntry {
                key: key.to_string(),
                access_seq: seq,
            }),
        }
    }

    fn forget(&self, key: &str) {
        if self.config.enable_lru {
            self.lru_tracker.lock().retain(|e| e.key != key);
        }
    }

    fn remove_expired(&self, key: &str) {
        if let Some((_, expired)) = self.entries.remove_if(key, |_, entry| entry.is_expired()) {
            self.memory_usage.fetch_sub(expired.size, Ordering::Relaxed);
            self.expired_cleanups.fetch_add(1, Ordering::Relaxed);
            self.forget(key);
        }
    }
}

impl Drop for InMemoryCache {
    fn drop(&mut self) {
        if let Some(task) = self.cleanup_task.take() {
            task.abort();
        }
    }
}

#[async_trait]
impl CacheStore for InMemoryCache {
    async fn has(&self, key: &str) -> CacheResult<bool> {
        let live = match self.entries.get(key) {
            Some(entry) => !entry.is_expired(),
            None => return Ok(false),
        };

        if !live {
            self.remove_expired(key);
        }
        Ok(live)
    }

    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        let value = match self.entries.get_mut(key) {
            Some(mut entry) if !entry.is_expired() => {
                entry.mark_accessed();
                Some(entry.value.clone())
            }
            Some(_) => None,
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                return Ok(None);
            }
        };

        match value {
            Some(value) => {
                self.touch(key);
                self.hits.fetch_add(1, Ordering::Relaxed);
                Ok(Some(value))
            }
            None => {
                self.remove_expired(key);
                self.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> CacheResult<()> {
        self.evict_if_needed(key)?;

        let entry = CacheEntry::new(value.to_vec(), ttl);
        let entry_size = entry.size;

        match self.entries.insert(key.to_string(), entry) {
            Some(old_entry) => {
                self.memory_usage.fetch_sub(old_entry.size, Ordering::Relaxed);
                self.memory_usage.fetch_add(entry_size, Ordering::Relaxed);
            }
            None => {
                self.memory_usage.fetch_add(entry_size, Ordering::Relaxed);
            }
        }

        self.touch(key);
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        match self.entries.remove(key) {
            Some((_, entry)) => {
                self.memory_usage.fetch_sub(entry.size, Ordering::Relaxed);
                self.forget(key);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn clear(&self) -> CacheResult<()> {
        let entry_count = self.entries.len();
        self.entries.clear();
        self.memory_usage.store(0, Ordering::Relaxed);
        self.lru_tracker.lock().clear();

        info!(entries = entry_count, "Cleared in-memory cache");
        Ok(())
    }

    async fn stats(&self) -> CacheResult<CacheStoreStats> {
        Ok(CacheStoreStats {
            entries: self.entries.len(),
            memory_usage: self.memory_usage.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            expired_cleanups: self.expired_cleanups.load(Ordering::Relaxed),
        })
    }

    async fn health_check(&self) -> CacheResult<bool> {
        let test_key = "__health_check__";
        let test_value = b"health_check_value";

        self.set(test_key, test_value, Some(Duration::from_secs(1))).await?;
        let retrieved = self.get(test_key).await?;
        self.delete(test_key).await?;

        Ok(retrieved.as_deref() == Some(&test_value[..]))
    }
}
