//! Session storage trait.
//!
//! Sessions bind a pair of token hashes to a user and an expiry. Raw tokens
//! are never persisted; the hash columns are the only addressable handles,
//! and at most one session row is addressable by a given hash at any time.
//!
//! # Implementation Notes
//!
//! - `rotate` must be a conditional update keyed on the old refresh hash so
//!   that concurrent refreshes racing on the same token resolve to exactly
//!   one winner. A SQL backend would express it as:
//!
//!   ```sql
//!   UPDATE sessions
//!   SET access_token_hash = $2, refresh_token_hash = $3,
//!       expires_at = $4, last_used_at = $5
//!   WHERE refresh_token_hash = $1 AND active AND expires_at > $5
//!   ```
//!
//! - Invalidation is idempotent: deactivating an already-inactive session
//!   is not an error.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::AuthResult;

// =============================================================================
// Session Type
// =============================================================================

/// SHA-256 hashes of an issued token pair, as persisted on a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenHashes {
    /// Hash of the access token.
    pub access_token_hash: String,

    /// Hash of the refresh token.
    pub refresh_token_hash: String,
}

/// A server-side session record.
///
/// Created on successful authentication, mutated on refresh (new token
/// hashes), and terminated by explicit invalidation, expiry, or the periodic
/// cleanup sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Unique identifier for the session.
    pub id: Uuid,

    /// The user this session belongs to.
    pub user_id: Uuid,

    /// Hash of the current access token.
    pub access_token_hash: String,

    /// Hash of the current refresh token.
    pub refresh_token_hash: String,

    /// When the session expires.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,

    /// When the session was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,

    /// When the session was last used (refresh or lookup).
    #[serde(with = "time::serde::rfc3339")]
    pub last_used_at: OffsetDateTime,

    /// Originating IP address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,

    /// Originating user agent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,

    /// Country code enrichment from geolocation, when available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,

    /// Whether the session is active. Inactive sessions fail token lookup.
    pub active: bool,
}

impl Session {
    /// Returns `true` if the session has expired at the given instant.
    #[must_use]
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        now >= self.expires_at
    }

    /// Returns `true` if the session is active and unexpired.
    #[must_use]
    pub fn is_valid(&self, now: OffsetDateTime) -> bool {
        self.active && !self.is_expired(now)
    }
}

// =============================================================================
// Session Storage Trait
// =============================================================================

/// Storage operations for sessions.
#[async_trait]
pub trait SessionStorage: Send + Sync {
    /// Create a new session.
    ///
    /// # Errors
    ///
    /// Returns an error if a session with either token hash already exists
    /// or the storage operation fails.
    async fn create(&self, session: &Session) -> AuthResult<()>;

    /// Find an active session by its ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_id(&self, session_id: Uuid) -> AuthResult<Option<Session>>;

    /// Find a session by the hash of its current access token.
    ///
    /// Returns sessions regardless of their active/expired status; callers
    /// check `is_valid` themselves.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_access_hash(&self, hash: &str) -> AuthResult<Option<Session>>;

    /// Find a session by the hash of its current refresh token.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_refresh_hash(&self, hash: &str) -> AuthResult<Option<Session>>;

    /// Atomically rotate a session's token hashes.
    ///
    /// The update is conditional on `old_refresh_hash` still matching an
    /// active, unexpired session: of several concurrent refreshes racing on
    /// the same token, exactly one observes `true`; the rest observe
    /// `false` and must fail closed.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn rotate(
        &self,
        old_refresh_hash: &str,
        new_hashes: &TokenHashes,
        expires_at: OffsetDateTime,
        now: OffsetDateTime,
    ) -> AuthResult<bool>;

    /// Mark a session inactive. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn invalidate(&self, session_id: Uuid) -> AuthResult<()>;

    /// Mark every active session for a user inactive.
    ///
    /// Returns the number of sessions invalidated.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn invalidate_all_for_user(&self, user_id: Uuid) -> AuthResult<u64>;

    /// Record session activity without extending its expiry.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn touch(&self, session_id: Uuid, at: OffsetDateTime) -> AuthResult<()>;

    /// Delete sessions that expired before `expired_before` or have been
    /// inactive since before `inactive_before`.
    ///
    /// Returns the number of sessions deleted. Intended for a periodic
    /// sweep, not per-request use.
    ///
    /// # Errors
    ///
    /// Returns an error if the cleanup operation fails.
    async fn cleanup(
        &self,
        expired_before: OffsetDateTime,
        inactive_before: OffsetDateTime,
    ) -> AuthResult<u64>;
}

// =============================================================================
// Tests
// =============================================================================
