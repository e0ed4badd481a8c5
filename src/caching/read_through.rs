//! # Read-Through Cache
//!
//! Wraps a remote service client and serves cacheable read operations from a
//! [`CacheStore`] when possible. On a miss the remote response is serialized
//! to JSON and stored under the canonical key of the request.
//!
//! Writes are not intercepted: a `PutItem` does not invalidate cached
//! `GetItem` responses, which stay stale until their TTL runs out. Concurrent
//! misses on the same key are not coalesced either.

use super::key_generator::{CanonicalKeyGenerator, KeyGenerator};
use super::stores::CacheStore;
use crate::core::error::{BundleError, BundleResult};
use crate::core::types::{RemoteOperationResult, RequestArguments};
use crate::remote::RemoteServiceClient;
use metrics::counter;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Operations whose responses may be served from the cache
pub const CACHEABLE_OPERATIONS: &[&str] = &["GetItem", "BatchGetItem"];

/// Whether `operation` goes through the cache path
pub fn is_cacheable(operation: &str) -> bool {
    CACHEABLE_OPERATIONS.contains(&operation)
}

/// Wrapper-level cache settings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheSettings {
    /// Entry lifetime; `None` stores without expiry
    pub ttl: Option<Duration>,

    /// Prepended to every key as `<prefix>_<digest>`
    pub key_prefix: Option<String>,
}

impl CacheSettings {
    pub fn new(ttl: Option<Duration>, key_prefix: Option<String>) -> Self {
        Self { ttl, key_prefix }
    }
}

/// Per-call replacements for the wrapper-level settings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheOverrides {
    pub ttl: Option<Duration>,
    pub key_prefix: Option<String>,
}

impl CacheOverrides {
    pub fn ttl(ttl: Duration) -> Self {
        Self {
            ttl: Some(ttl),
            ..Default::default()
        }
    }

    pub fn key_prefix<P: Into<String>>(prefix: P) -> Self {
        Self {
            key_prefix: Some(prefix.into()),
            ..Default::default()
        }
    }
}

#[derive(Clone)]
struct CacheBinding {
    store: Arc<dyn CacheStore>,
    settings: CacheSettings,
    keys: CanonicalKeyGenerator,
}

/// Remote client with an optional read-through cache in front of it
///
/// Configuration is fixed at construction. [`ReadThroughCache::with_cache`]
/// returns a new wrapper; cloning is cheap and clones share the store.
#[derive(Clone)]
pub struct ReadThroughCache {
    client: Arc<dyn RemoteServiceClient>,
    cache: Option<CacheBinding>,
}

impl ReadThroughCache {
    /// Pass-through wrapper: every call goes to the remote client
    pub fn new(client: Arc<dyn RemoteServiceClient>) -> Self {
        Self { client, cache: None }
    }

    /// Enable caching with `store`, replacing any previous store and settings
    pub fn with_cache(self, store: Arc<dyn CacheStore>, settings: CacheSettings) -> Self {
        let keys = match &settings.key_prefix {
            Some(prefix) => CanonicalKeyGenerator::new().with_prefix(prefix.clone()),
            None => CanonicalKeyGenerator::new(),
        };

        Self {
            client: self.client,
            cache: Some(CacheBinding {
                store,
                settings,
                keys,
            }),
        }
    }

    /// Drop the cache and go back to pass-through mode
    pub fn without_cache(self) -> Self {
        Self {
            client: self.client,
            cache: None,
        }
    }

    pub fn is_caching_enabled(&self) -> bool {
        self.cache.is_some()
    }

    /// Current cache settings, `None` in pass-through mode
    pub fn settings(&self) -> Option<&CacheSettings> {
        self.cache.as_ref().map(|binding| &binding.settings)
    }

    /// Underlying remote client
    pub fn client(&self) -> &Arc<dyn RemoteServiceClient> {
        &self.client
    }

    /// Key under which `args` would be cached, `None` in pass-through mode
    pub fn cache_key(&self, args: &RequestArguments, overrides: &CacheOverrides) -> Option<String> {
        self.cache.as_ref().map(|binding| {
            let prefix = overrides
                .key_prefix
                .as_deref()
                .or(binding.settings.key_prefix.as_deref());
            binding.keys.generate_key_with_prefix(args, prefix)
        })
    }

    /// Execute `operation` with the wrapper-level settings
    pub async fn execute(
        &self,
        operation: &str,
        args: &RequestArguments,
    ) -> BundleResult<RemoteOperationResult> {
        self.execute_with(operation, args, CacheOverrides::default())
            .await
    }

    /// Execute `operation`, overriding TTL and prefix for this call
    pub async fn execute_with(
        &self,
        operation: &str,
        args: &RequestArguments,
        overrides: CacheOverrides,
    ) -> BundleResult<RemoteOperationResult> {
        let binding = match &self.cache {
            Some(binding) if is_cacheable(operation) => binding,
            _ => return Ok(self.client.invoke(operation, args).await?),
        };

        let prefix = overrides
            .key_prefix
            .as_deref()
            .or(binding.settings.key_prefix.as_deref());
        let ttl = overrides.ttl.or(binding.settings.ttl);
        let key = binding.keys.generate_key_with_prefix(args, prefix);

        if binding.store.has(&key).await? {
            match binding.store.get(&key).await? {
                Some(bytes) => {
                    let result: RemoteOperationResult =
                        serde_json::from_slice(&bytes).map_err(|e| {
                            BundleError::serialization(format!(
                                "cached response for key {} is unreadable: {}",
                                key, e
                            ))
                        })?;

                    counter!("aws_bundle_cache_hits_total", "operation" => operation.to_string())
                        .increment(1);
                    debug!(operation = %operation, key = %key, "Cache hit");
                    return Ok(result);
                }
                None => {
                    // Expired or evicted between the two calls
                    warn!(operation = %operation, key = %key, "Cache entry disappeared after has()");
                }
            }
        }

        counter!("aws_bundle_cache_misses_total", "operation" => operation.to_string())
            .increment(1);
        debug!(operation = %operation, key = %key, "Cache miss");

        let result = self.client.invoke(operation, args).await?;

        let bytes = serde_json::to_vec(&result).map_err(|e| {
            BundleError::serialization(format!("response of {} is not serializable: {}", operation, e))
        })?;
        binding.store.set(&key, &bytes, ttl).await?;

        debug!(operation = %operation, key = %key, ttl = ?ttl, "Cached response");
        Ok(result)
    }
}

impl fmt::Debug for ReadThroughCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadThroughCache")
            .field("service", &self.client.service_name())
            .field("settings", &self.settings())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caching::stores::{CacheStoreStats, InMemoryCache, InMemoryCacheConfig};
    use crate::caching::{CacheError, CacheResult};
    use crate::remote::RemoteServiceError;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::{json, Value};
    use std::collections::HashMap;

    /// Remote client that records calls and answers from a script
    #[derive(Default)]
    struct RecordingClient {
        calls: Mutex<Vec<(String, Value)>>,
        response: Mutex<Option<Result<Value, RemoteServiceError>>>,
    }

    impl RecordingClient {
        fn answering(response: Value) -> Arc<Self> {
            let client = Self::default();
            *client.response.lock() = Some(Ok(response));
            Arc::new(client)
        }

        fn failing(err: RemoteServiceError) -> Arc<Self> {
            let client = Self::default();
            *client.response.lock() = Some(Err(err));
            Arc::new(client)
        }

        fn call_count(&self) -> usize {
            self.calls.lock().len()
        }
    }

    #[async_trait]
    impl RemoteServiceClient for RecordingClient {
        async fn invoke(
            &self,
            operation: &str,
            args: &RequestArguments,
        ) -> Result<RemoteOperationResult, RemoteServiceError> {
            self.calls.lock().push((operation.to_string(), args.clone()));
            self.response
                .lock()
                .clone()
                .unwrap_or_else(|| Ok(json!({})))
        }
    }

    /// Cache store that records every call
    #[derive(Default)]
    struct RecordingStore {
        data: Mutex<HashMap<String, Vec<u8>>>,
        log: Mutex<Vec<String>>,
        ttls: Mutex<Vec<Option<Duration>>>,
    }

    impl RecordingStore {
        fn ops(&self, name: &str) -> usize {
            self.log.lock().iter().filter(|op| op.as_str() == name).count()
        }

        fn keys(&self) -> Vec<String> {
            self.data.lock().keys().cloned().collect()
        }
    }

    #[async_trait]
    impl CacheStore for RecordingStore {
        async fn has(&self, key: &str) -> CacheResult<bool> {
            self.log.lock().push("has".into());
            Ok(self.data.lock().contains_key(key))
        }

        async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
            self.log.lock().push("get".into());
            Ok(self.data.lock().get(key).cloned())
        }

        async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> CacheResult<()> {
            self.log.lock().push("set".into());
            self.ttls.lock().push(ttl);
            self.data.lock().insert(key.to_string(), value.to_vec());
            Ok(())
        }

        async fn delete(&self, key: &str) -> CacheResult<bool> {
            Ok(self.data.lock().remove(key).is_some())
        }

        async fn clear(&self) -> CacheResult<()> {
            self.data.lock().clear();
            Ok(())
        }

        async fn stats(&self) -> CacheResult<CacheStoreStats> {
            Ok(CacheStoreStats {
                entries: self.data.lock().len(),
                ..Default::default()
            })
        }

        async fn health_check(&self) -> CacheResult<bool> {
            Ok(true)
        }
    }

    /// Store whose every call fails
    struct BrokenStore;

    #[async_trait]
    impl CacheStore for BrokenStore {
        async fn has(&self, _key: &str) -> CacheResult<bool> {
            Err(CacheError::Unavailable)
        }
        async fn get(&self, _key: &str) -> CacheResult<Option<Vec<u8>>> {
            Err(CacheError::Unavailable)
        }
        async fn set(&self, _key: &str, _value: &[u8], _ttl: Option<Duration>) -> CacheResult<()> {
            Err(CacheError::Unavailable)
        }
        async fn delete(&self, _key: &str) -> CacheResult<bool> {
            Err(CacheError::Unavailable)
        }
        async fn clear(&self) -> CacheResult<()> {
            Err(CacheError::Unavailable)
        }
        async fn stats(&self) -> CacheResult<CacheStoreStats> {
            Err(CacheError::Unavailable)
        }
        async fn health_check(&self) -> CacheResult<bool> {
            Ok(false)
        }
    }

    fn settings(prefix: &str) -> CacheSettings {
        CacheSettings::new(Some(Duration::from_secs(3600)), Some(prefix.to_string()))
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let client = RecordingClient::answering(json!({"Item": {"id": {"N": "1"}}}));
        let store = Arc::new(RecordingStore::default());
        let reads = ReadThroughCache::new(client.clone()).with_cache(store.clone(), settings("videos"));

        let args = json!({"TableName": "videos", "Key": {"id": {"N": "1"}}});

        let first = reads.execute("GetItem", &args).await.unwrap();
        let second = reads.execute("GetItem", &args).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(client.call_count(), 1);
        assert_eq!(store.ops("has"), 2);
        assert_eq!(store.ops("get"), 1);
        assert_eq!(store.ops("set"), 1);
        assert_eq!(store.ttls.lock()[0], Some(Duration::from_secs(3600)));

        let keys = store.keys();
        assert_eq!(keys.len(), 1);
        assert!(keys[0].starts_with("videos_"));
    }

    #[tokio::test]
    async fn test_reordered_arguments_hit_the_same_entry() {
        let client = RecordingClient::answering(json!({"Item": {"title": {"S": "intro"}}}));
        let store = Arc::new(RecordingStore::default());
        let reads = ReadThroughCache::new(client.clone()).with_cache(store.clone(), settings("videos"));

        let a: Value = serde_json::from_str(
            r#"{"TableName":"videos","Key":{"id":{"N":"1"}},"AttributesToGet":["title","id"]}"#,
        )
        .unwrap();
        let b: Value = serde_json::from_str(
            r#"{"AttributesToGet":["id","title"],"Key":{"id":{"N":"1"}},"TableName":"videos"}"#,
        )
        .unwrap();

        reads.execute("GetItem", &a).await.unwrap();
        reads.execute("GetItem", &b).await.unwrap();

        assert_eq!(client.call_count(), 1);
        assert_eq!(store.keys().len(), 1);
    }

    #[tokio::test]
    async fn test_pass_through_without_cache() {
        let client = RecordingClient::answering(json!({"Item": {}}));
        let reads = ReadThroughCache::new(client.clone());
        let args = json!({"TableName": "videos"});

        reads.execute("GetItem", &args).await.unwrap();
        reads.execute("GetItem", &args).await.unwrap();

        assert!(!reads.is_caching_enabled());
        assert_eq!(client.call_count(), 2);
        assert!(reads.cache_key(&args, &CacheOverrides::default()).is_none());
    }

    #[tokio::test]
    async fn test_non_cacheable_operations_bypass_store() {
        let client = RecordingClient::answering(json!({}));
        let store = Arc::new(RecordingStore::default());
        let reads = ReadThroughCache::new(client.clone()).with_cache(store.clone(), settings("videos"));
        let args = json!({"TableName": "videos", "Item": {"id": {"N": "1"}}});

        for operation in ["PutItem", "UpdateItem", "DeleteItem", "Query", "Scan", "ListTables"] {
            reads.execute(operation, &args).await.unwrap();
        }

        assert_eq!(client.call_count(), 6);
        assert!(store.log.lock().is_empty());
    }

    #[tokio::test]
    async fn test_remote_error_propagates_and_nothing_is_cached() {
        let err = RemoteServiceError::validation("The provided key element does not match the schema");
        let client = RecordingClient::failing(err.clone());
        let store = Arc::new(RecordingStore::default());
        let reads = ReadThroughCache::new(client.clone()).with_cache(store.clone(), settings("videos"));

        let result = reads.execute("GetItem", &json!({"TableName": "videos"})).await;

        match result {
            Err(BundleError::Remote(remote)) => assert_eq!(remote, err),
            other => panic!("expected remote error, got {:?}", other),
        }
        assert_eq!(store.ops("set"), 0);
        assert!(store.keys().is_empty());
    }

    #[tokio::test]
    async fn test_cache_failure_fails_the_call() {
        let client = RecordingClient::answering(json!({}));
        let reads = ReadThroughCache::new(client.clone()).with_cache(Arc::new(BrokenStore), settings("videos"));

        let err = reads
            .execute("GetItem", &json!({"TableName": "videos"}))
            .await
            .unwrap_err();

        assert!(err.is_cache_failure());
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test]
    async fn test_stale_read_after_write() {
        let client = RecordingClient::answering(json!({"Item": {"title": {"S": "old"}}}));
        let store = Arc::new(RecordingStore::default());
        let reads = ReadThroughCache::new(client.clone()).with_cache(store.clone(), settings("videos"));
        let get = json!({"TableName": "videos", "Key": {"id": {"N": "1"}}});

        let before = reads.execute("GetItem", &get).await.unwrap();

        *client.response.lock() = Some(Ok(json!({})));
        reads
            .execute(
                "PutItem",
                &json!({"TableName": "videos", "Item": {"id": {"N": "1"}, "title": {"S": "new"}}}),
            )
            .await
            .unwrap();

        *client.response.lock() = Some(Ok(json!({"Item": {"title": {"S": "new"}}})));
        let after = reads.execute("GetItem", &get).await.unwrap();

        assert_eq!(after, before);
        assert_eq!(after["Item"]["title"]["S"], "old");
    }

    #[tokio::test]
    async fn test_corrupt_cached_bytes_fail_loudly() {
        let client = RecordingClient::answering(json!({}));
        let store = Arc::new(RecordingStore::default());
        let reads = ReadThroughCache::new(client.clone()).with_cache(store.clone(), settings("videos"));
        let args = json!({"TableName": "videos"});

        let key = reads.cache_key(&args, &CacheOverrides::default()).unwrap();
        store.data.lock().insert(key, b"not json".to_vec());

        let err = reads.execute("GetItem", &args).await.unwrap_err();
        assert!(matches!(err, BundleError::Serialization { .. }));
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test]
    async fn test_per_call_overrides() {
        let client = RecordingClient::answering(json!({"Item": {}}));
        let store = Arc::new(RecordingStore::default());
        let reads = ReadThroughCache::new(client.clone()).with_cache(store.clone(), settings("videos"));
        let args = json!({"TableName": "videos"});

        let overrides = CacheOverrides {
            ttl: Some(Duration::from_secs(5)),
            key_prefix: Some("hot".to_string()),
        };
        reads.execute_with("GetItem", &args, overrides).await.unwrap();

        assert_eq!(store.ttls.lock()[0], Some(Duration::from_secs(5)));
        assert!(store.keys()[0].starts_with("hot_"));
    }

    #[tokio::test]
    async fn test_reconfiguring_replaces_settings() {
        let client = RecordingClient::answering(json!({}));
        let first = Arc::new(RecordingStore::default());
        let second = Arc::new(RecordingStore::default());

        let reads = ReadThroughCache::new(client.clone())
            .with_cache(first.clone(), settings("videos"))
            .with_cache(second.clone(), CacheSettings::default());

        reads.execute("GetItem", &json!({"TableName": "videos"})).await.unwrap();

        assert!(first.log.lock().is_empty());
        assert_eq!(second.ttls.lock()[0], None);
        assert_eq!(second.keys()[0].len(), 64);
        assert_eq!(reads.settings(), Some(&CacheSettings::default()));
    }

    #[tokio::test]
    async fn test_with_in_memory_store() {
        let client = RecordingClient::answering(json!({"Responses": {"videos": []}}));
        let store = Arc::new(InMemoryCache::new(InMemoryCacheConfig::default()).unwrap());
        let reads = ReadThroughCache::new(client.clone()).with_cache(store.clone(), settings("videos"));
        let args = json!({"RequestItems": {"videos": {"Keys": [{"id": {"N": "1"}}, {"id": {"N": "2"}}]}}});

        reads.execute("BatchGetItem", &args).await.unwrap();
        reads.execute("BatchGetItem", &args).await.unwrap();

        assert_eq!(client.call_count(), 1);
        assert_eq!(store.stats().await.unwrap().entries, 1);
    }

    #[test]
    fn test_cacheable_operations() {
        assert!(is_cacheable("GetItem"));
        assert!(is_cacheable("BatchGetItem"));
        assert!(!is_cacheable("PutItem"));
        assert!(!is_cacheable("getitem"));
    }
}
