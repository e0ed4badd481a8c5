//! # Caching System Module
//!
//! Request-level read caching for key-value store operations.
//!
//! ## Architecture
//! 1. **Key generation**: request arguments are canonicalized (key order and
//!    list order no longer matter) and digested into a stable cache key
//! 2. **Cache stores**: the `CacheStore` capability with in-memory and Redis
//!    implementations
//! 3. **Read-through**: `ReadThroughCache` consults the store before calling
//!    the remote service and stores the serialized response on a miss
//!
//! ## Usage Example
//! ```rust,ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use aws_bundle::caching::{CacheSettings, InMemoryCache, ReadThroughCache};
//!
//! let store = Arc::new(InMemoryCache::new(Default::default())?);
//! let reads = ReadThroughCache::new(remote_client)
//!     .with_cache(store, CacheSettings::new(Some(Duration::from_secs(3600)), Some("videos".into())));
//!
//! let item = reads.execute("GetItem", &args).await?;
//! ```

pub mod key_generator;
pub mod read_through;
pub mod stores;

pub use key_generator::{canonicalize, CanonicalKeyGenerator, CanonicalValue, KeyGenerator};
pub use read_through::{CacheOverrides, CacheSettings, ReadThroughCache};
pub use stores::{CacheEntry, CacheStore, CacheStoreStats, InMemoryCache, RedisCache};

/// Cache operation result
pub type CacheResult<T> = Result<T, CacheError>;

/// Cache-specific error types
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Cache store error: {message}")]
    Store { message: String },

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Cache configuration error: {message}")]
    Configuration { message: String },

    #[error("Cache not available")]
    Unavailable,
}
