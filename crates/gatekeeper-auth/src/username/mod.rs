//! Username generation.
//!
//! Used at registration when no username is supplied: normalizes the given
//! names into a `first.last` handle, resolves collisions against the store
//! with numeric suffixes, and enforces length/reserved-word policy.
//!
//! The engine never raises on a single collision, only on exhausting the
//! configured attempt budget or on unrecoverable normalization failure.
//! Every accepted or failed attempt is recorded for audit via `tracing`.

mod normalize;

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::AuthResult;
use crate::cache::{Cache, keys};
use crate::config::{CacheTtlConfig, UsernameConfig};
use crate::error::AuthError;
use crate::storage::UserStorage;

pub use normalize::{normalize_name, truncate_proportionally};

/// Generates unique usernames from first/last name pairs.
pub struct UsernameGenerator {
    users: Arc<dyn UserStorage>,
    cache: Cache,
    config: UsernameConfig,
    lookup_ttl: Duration,
}

impl UsernameGenerator {
    /// Creates a generator over the given store and policy.
    #[must_use]
    pub fn new(
        users: Arc<dyn UserStorage>,
        cache: Cache,
        config: UsernameConfig,
        cache_ttls: &CacheTtlConfig,
    ) -> Self {
        Self {
            users,
            cache,
            config,
            lookup_ttl: cache_ttls.username_lookup,
        }
    }

    /// Generates a unique username for the given names.
    ///
    /// # Errors
    ///
    /// Returns `InvalidName` when either name normalizes to nothing, or
    /// `UsernameGenerationFailed` after the attempt budget is exhausted.
    pub async fn generate(&self, first_name: &str, last_name: &str) -> AuthResult<String> {
        let first = normalize_name(first_name)
            .ok_or_else(|| AuthError::invalid_name("first name normalized to empty"))?;
        let last = normalize_name(last_name)
            .ok_or_else(|| AuthError::invalid_name("last name normalized to empty"))?;

        let (first, last) = truncate_proportionally(&first, &last, self.config.max_length);
        let base = format!("{first}.{last}");

        for attempt in 0..self.config.max_attempts {
            // Attempt 0 is the bare base; later attempts append the smallest
            // untried positive suffix, shrinking the base when the suffix
            // would overflow the maximum length.
            let candidate = if attempt == 0 {
                base.clone()
            } else {
                match with_suffix(&base, attempt, self.config.max_length) {
                    Some(candidate) => candidate,
                    None => {
                        debug!(%base, attempt, "Suffix no longer fits, skipping");
                        continue;
                    }
                }
            };

            if candidate.len() < self.config.min_length {
                debug!(%candidate, attempt, "Candidate under minimum length");
                continue;
            }
            if self.is_reserved(&candidate) {
                debug!(%candidate, attempt, "Candidate is a reserved word");
                continue;
            }

            if self.exists(&candidate).await? {
                debug!(%candidate, attempt, "Candidate collides with existing username");
                continue;
            }

            info!(username = %candidate, attempt, "Generated username");
            return Ok(candidate);
        }

        warn!(
            %base,
            attempts = self.config.max_attempts,
            "Username generation exhausted its attempt budget"
        );
        Err(AuthError::UsernameGenerationFailed {
            attempts: self.config.max_attempts,
        })
    }

    fn is_reserved(&self, candidate: &str) -> bool {
        self.config
            .reserved
            .iter()
            .any(|word| word.eq_ignore_ascii_case(candidate))
    }

    /// Case-insensitive existence check with a cached positive path.
    ///
    /// Only positive hits are cached: a cached "absent" would go stale the
    /// moment the generated name is registered.
    async fn exists(&self, candidate: &str) -> AuthResult<bool> {
        let folded = candidate.to_lowercase();
        let key = keys::username_exists(&folded);

        if let Ok(Some(_)) = self.cache.store().get(&key).await {
            return Ok(true);
        }

        let exists = self.users.username_exists(&folded).await?;
        if exists {
            if let Err(err) = self
                .cache
                .store()
                .set_with_ttl(&key, "1", self.lookup_ttl)
                .await
            {
                debug!(%err, "Failed to cache username existence");
            }
        }
        Ok(exists)
    }
}

/// Appends a numeric suffix, shrinking the base to stay within `max_len`.
///
/// Returns `None` when no base character would remain.
fn with_suffix(base: &str, suffix: u32, max_len: usize) -> Option<String> {
    let suffix = suffix.to_string();
    if suffix.len() >= max_len {
        return None;
    }
    let allowed = max_len - suffix.len();
    let mut base_part: String = base.chars().take(allowed).collect();
    // A trailing separator reads badly directly before the digits.
    while base_part.ends_with(['.', '-']) {
        base_part.pop();
    }
    if base_part.is_empty() {
        return None;
    }
    Some(format!("{base_part}{suffix}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AuthResult;
    use crate::cache::CacheStore;
    use crate::storage::User;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use uuid::Uuid;

    #[derive(Default)]
    struct NullCache;

    #[async_trait]
    impl CacheStore for NullCache {
        async fn get(&self, _key: &str) -> AuthResult<Option<String>> {
            Ok(None)
        }

        async fn set_with_ttl(&self, _key: &str, _value: &str, _ttl: Duration) -> AuthResult<()> {
            Ok(())
        }

        async fn delete(&self, _key: &str) -> AuthResult<()> {
            Ok(())
        }

        async fn delete_by_pattern(&self, _pattern: &str) -> AuthResult<()> {
            Ok(())
        }

        async fn increment_with_ttl(&self, _key: &str, _ttl: Duration) -> AuthResult<u64> {
            Ok(0)
        }
    }

    /// User store stub: only `username_exists` matters here.
    #[derive(Default)]
    struct TakenNames {
        taken: Mutex<HashSet<String>>,
        all_taken: bool,
        checks: AtomicU32,
    }

    impl TakenNames {
        fn with(names: &[&str]) -> Self {
            Self {
                taken: Mutex::new(names.iter().map(ToString::to_string).collect()),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl UserStorage for TakenNames {
        async fn find_by_id(&self, _user_id: Uuid) -> AuthResult<Option<User>> {
            Ok(None)
        }

        async fn find_by_username(&self, _username: &str) -> AuthResult<Option<User>> {
            Ok(None)
        }

        async fn find_by_email(&self, _email: &str) -> AuthResult<Option<User>> {
            Ok(None)
        }

        async fn username_exists(&self, username: &str) -> AuthResult<bool> {
            self.checks.fetch_add(1, Ordering::SeqCst);
            if self.all_taken {
                return Ok(true);
            }
            Ok(self.taken.lock().unwrap().contains(username))
        }

        async fn create(&self, _user: &User) -> AuthResult<()> {
            Ok(())
        }

        async fn update(&self, _user: &User) -> AuthResult<()> {
            Ok(())
        }

        async fn deactivate(&self, _user_id: Uuid) -> AuthResult<()> {
            Ok(())
        }

        async fn list(&self, _limit: i64, _offset: i64) -> AuthResult<Vec<User>> {
            Ok(vec![])
        }

        async fn count(&self) -> AuthResult<i64> {
            Ok(0)
        }
    }

    fn generator(store: TakenNames) -> UsernameGenerator {
        UsernameGenerator::new(
            Arc::new(store),
            Cache::new(Arc::new(NullCache)),
            UsernameConfig::default(),
            &CacheTtlConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_generates_base_candidate() {
        let generator = generator(TakenNames::default());
        let username = generator.generate("José", "Núñez").await.unwrap();
        assert_eq!(username, "jose.nunez");
    }

    #[tokio::test]
    async fn test_collision_appends_smallest_suffix() {
        let gen1 = generator(TakenNames::with(&["jose.nunez"]));
        assert_eq!(
            gen1.generate("José", "Núñez").await.unwrap(),
            "jose.nunez1"
        );

        let generator = generator(TakenNames::with(&["jose.nunez", "jose.nunez1", "jose.nunez2"]));
        assert_eq!(
            generator.generate("José", "Núñez").await.unwrap(),
            "jose.nunez3"
        );
    }

    #[tokio::test]
    async fn test_reserved_word_is_skipped_without_store_lookup() {
        let store = TakenNames::default();
        let generator = generator(store);
        // "admin" is reserved; "admin1" is the first acceptable candidate.
        let username = generator.generate("Admin", "").await;
        // Empty last name fails normalization instead.
        assert!(matches!(username, Err(AuthError::InvalidName { .. })));

        let generator = UsernameGenerator::new(
            Arc::new(TakenNames::default()),
            Cache::new(Arc::new(NullCache)),
            UsernameConfig {
                reserved: vec!["ada.root".to_string()],
                ..UsernameConfig::default()
            },
            &CacheTtlConfig::default(),
        );
        assert_eq!(generator.generate("Ada", "Root").await.unwrap(), "ada.root1");
    }

    #[tokio::test]
    async fn test_exhausts_exact_attempt_budget() {
        let store = TakenNames {
            all_taken: true,
            ..TakenNames::default()
        };
        let generator = UsernameGenerator::new(
            Arc::new(store),
            Cache::new(Arc::new(NullCache)),
            UsernameConfig {
                max_attempts: 7,
                ..UsernameConfig::default()
            },
            &CacheTtlConfig::default(),
        );

        let err = generator.generate("Jane", "Doe").await.unwrap_err();
        assert!(matches!(
            err,
            AuthError::UsernameGenerationFailed { attempts: 7 }
        ));
    }

    #[tokio::test]
    async fn test_invalid_names_fail_fast() {
        let generator = generator(TakenNames::default());
        assert!(matches!(
            generator.generate("!!!", "Doe").await,
            Err(AuthError::InvalidName { .. })
        ));
        assert!(matches!(
            generator.generate("Jane", "   ").await,
            Err(AuthError::InvalidName { .. })
        ));
    }

    #[tokio::test]
    async fn test_suffix_respects_max_length() {
        let generator = UsernameGenerator::new(
            Arc::new(TakenNames::with(&["abcd.efgh"])),
            Cache::new(Arc::new(NullCache)),
            UsernameConfig {
                max_length: 9,
                ..UsernameConfig::default()
            },
            &CacheTtlConfig::default(),
        );
        // "abcd.efgh" is taken and exactly max length: the suffixed form
        // must shed a base character rather than grow.
        let username = generator.generate("Abcd", "Efgh").await.unwrap();
        assert_eq!(username, "abcd.efg1");
        assert!(username.len() <= 9);
    }

    #[test]
    fn test_with_suffix_drops_trailing_separator() {
        assert_eq!(with_suffix("ab.cd", 1, 5), Some("ab.c1".to_string()));
        // Truncation leaves "ab.", and the separator goes before the digit.
        assert_eq!(with_suffix("ab.cd", 12, 5), Some("ab12".to_string()));
        assert_eq!(with_suffix(".", 1, 2), None);
    }
}
