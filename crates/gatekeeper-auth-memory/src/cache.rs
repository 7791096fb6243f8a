//! In-memory cache store with TTL entries and atomic window counters.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use gatekeeper_auth::cache::CacheStore;
use gatekeeper_auth::AuthResult;

struct ValueEntry {
    value: String,
    expires_at: Instant,
}

struct CounterEntry {
    count: u64,
    expires_at: Instant,
}

/// DashMap-backed cache store.
///
/// Expired entries are evicted lazily on access; `increment_with_ttl` runs
/// under the shard lock of its entry, so concurrent increments never lose
/// updates.
#[derive(Default)]
pub struct MemoryCacheStore {
    values: DashMap<String, ValueEntry>,
    counters: DashMap<String, CounterEntry>,
}

impl MemoryCacheStore {
    /// Creates an empty cache store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) value entries, for tests and stats.
    #[must_use]
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.values
            .iter()
            .filter(|entry| entry.expires_at > now)
            .count()
    }

    /// Returns `true` if no live value entries exist.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> AuthResult<Option<String>> {
        if let Some(entry) = self.values.get(key) {
            if entry.expires_at > Instant::now() {
                return Ok(Some(entry.value.clone()));
            }
            drop(entry);
            self.values.remove(key);
        }
        Ok(None)
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> AuthResult<()> {
        self.values.insert(
            key.to_string(),
            ValueEntry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> AuthResult<()> {
        self.values.remove(key);
        Ok(())
    }

    async fn delete_by_pattern(&self, pattern: &str) -> AuthResult<()> {
        let prefix = pattern.trim_end_matches('*');
        self.values.retain(|key, _| !key.starts_with(prefix));
        self.counters.retain(|key, _| !key.starts_with(prefix));
        Ok(())
    }

    async fn increment_with_ttl(&self, key: &str, ttl: Duration) -> AuthResult<u64> {
        let now = Instant::now();
        let mut entry = self
            .counters
            .entry(key.to_string())
            .or_insert_with(|| CounterEntry {
                count: 0,
                expires_at: now + ttl,
            });
        if entry.expires_at <= now {
            // The window elapsed but the entry was never evicted; restart it.
            entry.count = 0;
            entry.expires_at = now + ttl;
        }
        entry.count += 1;
        Ok(entry.count)
    }
}
