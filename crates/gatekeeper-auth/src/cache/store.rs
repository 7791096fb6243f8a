//! Key-value cache store trait.
//!
//! The contract a cache backend (e.g. Redis, or the in-memory backend in
//! `gatekeeper-auth-memory`) must satisfy. Counters and TTL writes must be
//! atomic on the backend: application code never does read-modify-write on
//! cache state.

use std::time::Duration;

use async_trait::async_trait;

use crate::AuthResult;

/// Key-value cache operations.
///
/// Keys are flat strings namespaced by colon-separated segments (see
/// [`crate::cache::keys`]); patterns are a literal prefix followed by `*`.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Get the value for a key.
    ///
    /// Returns `None` if the key is absent or expired.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unavailable.
    async fn get(&self, key: &str) -> AuthResult<Option<String>>;

    /// Set a value with a time-to-live.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unavailable.
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> AuthResult<()>;

    /// Delete a key. Deleting an absent key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unavailable.
    async fn delete(&self, key: &str) -> AuthResult<()>;

    /// Delete every key matching a `prefix*` pattern.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unavailable.
    async fn delete_by_pattern(&self, pattern: &str) -> AuthResult<()>;

    /// Atomically increment a counter, setting the TTL on first increment.
    ///
    /// Returns the counter value after the increment. The TTL is applied
    /// only when the increment creates the key, so a window's counter
    /// expires relative to its first event.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unavailable.
    async fn increment_with_ttl(&self, key: &str, ttl: Duration) -> AuthResult<u64>;
}
