//! Fixed-window rate limiting.
//!
//! Attempts are counted per identifier+endpoint against the cache store
//! using atomic increment-with-expiry; there is no read-modify-write in
//! application code, so concurrent requests from the same identifier cannot
//! lose updates.
//!
//! The limiter fails open: when the counting substrate itself is
//! unavailable, availability wins over strict enforcement: the failure is
//! logged and the request allowed. There is no administrative unblock;
//! blocks self-clear when the window elapses.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::cache::{CacheStore, keys};
use crate::clock::Clock;

/// Identifies the caller being throttled.
///
/// Combines the caller IP with the user id when authenticated, falling back
/// to IP alone. A missing IP keys on `"unknown"` so throttling still
/// aggregates within a window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateIdentifier(String);

impl RateIdentifier {
    /// Builds an identifier from what the adapter knows about the caller.
    #[must_use]
    pub fn new(ip: Option<&str>, user_id: Option<Uuid>) -> Self {
        let ip = ip.unwrap_or("unknown");
        match user_id {
            Some(id) => Self(format!("{id}@{ip}")),
            None => Self(ip.to_string()),
        }
    }

    /// The cache-key fragment for this identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RateIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Fixed-window rate limiter over the cache store.
pub struct RateLimiter {
    store: Arc<dyn CacheStore>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    /// Creates a limiter over the given store and clock.
    #[must_use]
    pub fn new(store: Arc<dyn CacheStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Counts an attempt and reports whether it is allowed.
    ///
    /// Exactly `max_attempts` attempts pass within a window; the next is
    /// denied with `false`, never an error. After the window elapses the
    /// counter resets. Store failures log a warning and allow the attempt
    /// (fail open).
    pub async fn check(
        &self,
        identifier: &RateIdentifier,
        endpoint: &str,
        max_attempts: u32,
        window: Duration,
    ) -> bool {
        let window_secs = window.as_secs().max(1);
        let now = self.clock.now().unix_timestamp();
        // Fixed windows aligned to the epoch: all attempts in the same
        // window share one counter key.
        let window_start = now - now.rem_euclid(window_secs as i64);
        let key = keys::rate_limit(identifier.as_str(), endpoint, window_start);

        match self.store.increment_with_ttl(&key, window).await {
            Ok(count) => {
                let allowed = count <= u64::from(max_attempts);
                if !allowed {
                    debug!(
                        identifier = %identifier,
                        endpoint,
                        count,
                        max_attempts,
                        "Rate limit exceeded"
                    );
                }
                allowed
            }
            Err(err) => {
                // Fail open: the counting substrate is down, not the caller.
                warn!(
                    identifier = %identifier,
                    endpoint,
                    %err,
                    "Rate limit check failed, allowing request"
                );
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AuthResult;
    use crate::clock::FixedClock;
    use crate::error::AuthError;
    use async_trait::async_trait;
    use support::CountingStore;
    use time::OffsetDateTime;

    /// Test doubles for the cache store.
    mod support {
        use super::*;
        use std::collections::HashMap;
        use std::sync::Mutex;

        #[derive(Default)]
        pub struct CountingStore {
            pub counters: Mutex<HashMap<String, u64>>,
            pub fail: bool,
        }

        #[async_trait]
        impl CacheStore for CountingStore {
            async fn get(&self, _key: &str) -> AuthResult<Option<String>> {
                Ok(None)
            }

            async fn set_with_ttl(
                &self,
                _key: &str,
                _value: &str,
                _ttl: Duration,
            ) -> AuthResult<()> {
                Ok(())
            }

            async fn delete(&self, _key: &str) -> AuthResult<()> {
                Ok(())
            }

            async fn delete_by_pattern(&self, _pattern: &str) -> AuthResult<()> {
                Ok(())
            }

            async fn increment_with_ttl(&self, key: &str, _ttl: Duration) -> AuthResult<u64> {
                if self.fail {
                    return Err(AuthError::storage("cache down"));
                }
                let mut counters = self.counters.lock().unwrap();
                let count = counters.entry(key.to_string()).or_insert(0);
                *count += 1;
                Ok(*count)
            }
        }
    }

    fn limiter(fail: bool) -> (RateLimiter, Arc<FixedClock>) {
        let clock = Arc::new(FixedClock::new(OffsetDateTime::UNIX_EPOCH));
        let store = Arc::new(CountingStore {
            fail,
            ..CountingStore::default()
        });
        (RateLimiter::new(store, clock.clone()), clock)
    }

    #[tokio::test]
    async fn test_allows_exactly_max_attempts() {
        let (limiter, _clock) = limiter(false);
        let id = RateIdentifier::new(Some("203.0.113.9"), None);
        let window = Duration::from_secs(300);

        for _ in 0..5 {
            assert!(limiter.check(&id, "login", 5, window).await);
        }
        assert!(!limiter.check(&id, "login", 5, window).await);
    }

    #[tokio::test]
    async fn test_window_elapse_resets_counter() {
        let (limiter, clock) = limiter(false);
        let id = RateIdentifier::new(Some("203.0.113.9"), None);
        let window = Duration::from_secs(300);

        for _ in 0..5 {
            assert!(limiter.check(&id, "login", 5, window).await);
        }
        assert!(!limiter.check(&id, "login", 5, window).await);

        clock.advance(time::Duration::seconds(300));
        assert!(limiter.check(&id, "login", 5, window).await);
    }

    #[tokio::test]
    async fn test_identifiers_and_endpoints_are_independent() {
        let (limiter, _clock) = limiter(false);
        let window = Duration::from_secs(300);
        let a = RateIdentifier::new(Some("203.0.113.9"), None);
        let b = RateIdentifier::new(Some("203.0.113.10"), None);

        assert!(limiter.check(&a, "login", 1, window).await);
        assert!(!limiter.check(&a, "login", 1, window).await);
        // Different IP, same endpoint.
        assert!(limiter.check(&b, "login", 1, window).await);
        // Same IP, different endpoint.
        assert!(limiter.check(&a, "register", 1, window).await);
    }

    #[tokio::test]
    async fn test_fails_open_on_store_error() {
        let (limiter, _clock) = limiter(true);
        let id = RateIdentifier::new(Some("203.0.113.9"), None);

        for _ in 0..100 {
            assert!(limiter.check(&id, "login", 1, Duration::from_secs(60)).await);
        }
    }

    #[test]
    fn test_identifier_shapes() {
        let user = Uuid::new_v4();
        assert_eq!(
            RateIdentifier::new(Some("203.0.113.9"), None).as_str(),
            "203.0.113.9"
        );
        assert_eq!(
            RateIdentifier::new(Some("203.0.113.9"), Some(user)).as_str(),
            format!("{user}@203.0.113.9")
        );
        assert_eq!(RateIdentifier::new(None, None).as_str(), "unknown");
    }
}
