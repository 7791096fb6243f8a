//! Read-through caching with explicit write invalidation.
//!
//! The cache is strictly an optimization over the durable store, never a
//! source of truth. Handlers that mutate an entity list the keys and
//! patterns they invalidate explicitly rather than relying on TTL alone.
//!
//! A cache miss, a cache error, or a deserialization failure is never
//! surfaced to the caller: the [`Cache`] wrapper logs and falls through to
//! the loader, whose result is authoritative.

pub mod keys;
pub mod store;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::AuthResult;

pub use store::CacheStore;

/// Typed read-through wrapper over a [`CacheStore`].
///
/// Values are serialized as JSON strings. All store failures are swallowed:
/// reads fall through to the loader, writes are fire-and-forget.
#[derive(Clone)]
pub struct Cache {
    store: Arc<dyn CacheStore>,
}

impl Cache {
    /// Creates a cache over the given store.
    #[must_use]
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    /// The underlying store, for callers that need raw counter operations.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    /// Returns the cached value for `key`, or loads, caches, and returns it.
    ///
    /// The loader's error is the only error that propagates; the cache
    /// itself never fails a read.
    ///
    /// # Errors
    ///
    /// Returns an error only when the loader does.
    pub async fn get_or_load<T, F, Fut>(&self, key: &str, ttl: Duration, loader: F) -> AuthResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = AuthResult<T>>,
    {
        match self.store.get(key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => return Ok(value),
                Err(err) => {
                    // Stale or corrupt entry: drop it and fall through.
                    debug!(key, %err, "Discarding undeserializable cache entry");
                    let _ = self.store.delete(key).await;
                }
            },
            Ok(None) => {}
            Err(err) => {
                warn!(key, %err, "Cache read failed, falling through to store");
            }
        }

        let value = loader().await?;

        match serde_json::to_string(&value) {
            Ok(raw) => {
                if let Err(err) = self.store.set_with_ttl(key, &raw, ttl).await {
                    warn!(key, %err, "Cache write failed");
                }
            }
            Err(err) => {
                warn!(key, %err, "Failed to serialize value for cache");
            }
        }

        Ok(value)
    }

    /// Removes a single key. Failures are logged, never surfaced.
    pub async fn invalidate(&self, key: &str) {
        if let Err(err) = self.store.delete(key).await {
            warn!(key, %err, "Cache invalidation failed");
        }
    }

    /// Removes every key matching a `prefix*` pattern. Failures are logged,
    /// never surfaced.
    pub async fn invalidate_pattern(&self, pattern: &str) {
        if let Err(err) = self.store.delete_by_pattern(pattern).await {
            warn!(pattern, %err, "Cache pattern invalidation failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuthError;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Minimal in-crate store for unit tests; the full backend lives in
    /// gatekeeper-auth-memory.
    #[derive(Default)]
    struct MapStore {
        map: Mutex<HashMap<String, String>>,
        fail: bool,
    }

    #[async_trait]
    impl CacheStore for MapStore {
        async fn get(&self, key: &str) -> AuthResult<Option<String>> {
            if self.fail {
                return Err(AuthError::storage("cache down"));
            }
            Ok(self.map.lock().unwrap().get(key).cloned())
        }

        async fn set_with_ttl(&self, key: &str, value: &str, _ttl: Duration) -> AuthResult<()> {
            if self.fail {
                return Err(AuthError::storage("cache down"));
            }
            self.map
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_string());
            Ok(())
        }

        async fn delete(&self, key: &str) -> AuthResult<()> {
            self.map.lock().unwrap().remove(key);
            Ok(())
        }

        async fn delete_by_pattern(&self, pattern: &str) -> AuthResult<()> {
            let prefix = pattern.trim_end_matches('*');
            self.map
                .lock()
                .unwrap()
                .retain(|k, _| !k.starts_with(prefix));
            Ok(())
        }

        async fn increment_with_ttl(&self, _key: &str, _ttl: Duration) -> AuthResult<u64> {
            Err(AuthError::storage("not used in this test"))
        }
    }

    #[tokio::test]
    async fn test_get_or_load_populates_and_hits() {
        let cache = Cache::new(Arc::new(MapStore::default()));
        let calls = AtomicU32::new(0);

        let calls = &calls;
        let load = || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, AuthError>(vec!["a".to_string()])
        };
        let first: Vec<String> = cache
            .get_or_load("k", Duration::from_secs(60), load)
            .await
            .unwrap();
        assert_eq!(first, vec!["a"]);

        // Second read is served from cache; the loader must not run again.
        let second: Vec<String> = cache
            .get_or_load("k", Duration::from_secs(60), || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(vec!["b".to_string()])
            })
            .await
            .unwrap();
        assert_eq!(second, vec!["a"]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cache_failure_falls_through() {
        let store = MapStore {
            fail: true,
            ..MapStore::default()
        };
        let cache = Cache::new(Arc::new(store));

        // The broken cache must be invisible to the caller.
        let value: u32 = cache
            .get_or_load("k", Duration::from_secs(60), || async { Ok(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_corrupt_entry_falls_through() {
        let store = Arc::new(MapStore::default());
        store
            .set_with_ttl("k", "{not json", Duration::from_secs(60))
            .await
            .unwrap();
        let cache = Cache::new(store);

        let value: u32 = cache
            .get_or_load("k", Duration::from_secs(60), || async { Ok(42) })
            .await
            .unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn test_invalidate_pattern() {
        let store = Arc::new(MapStore::default());
        let cache = Cache::new(store.clone());
        for key in ["authz:user:1", "authz:user:2", "session:1"] {
            store
                .set_with_ttl(key, "\"x\"", Duration::from_secs(60))
                .await
                .unwrap();
        }

        cache.invalidate_pattern("authz:user:*").await;
        assert!(store.get("authz:user:1").await.unwrap().is_none());
        assert!(store.get("authz:user:2").await.unwrap().is_none());
        assert!(store.get("session:1").await.unwrap().is_some());
    }
}
