//! Session and token lifecycle.
//!
//! Creates sessions on authentication, rotates token pairs on refresh,
//! invalidates on logout or credential change, and sweeps expired rows.
//!
//! Concurrency: concurrent authenticates for the same user produce
//! independent sessions. Concurrent refreshes racing on one refresh token
//! are arbitrated by the store's conditional rotate: exactly one wins, and the
//! loser's stale hash no longer matches any session and fails closed as
//! `InvalidToken`.

use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use crate::AuthResult;
use crate::clock::Clock;
use crate::config::SessionConfig;
use crate::credential::CredentialVerifier;
use crate::error::AuthError;
use crate::geo::GeoLookup;
use crate::storage::{RoleStorage, Session, SessionStorage, User, UserStorage};
use crate::token::jwt::TokenKind;
use crate::token::{TokenPair, TokenService, hash_token};

/// What the adapter knows about the caller, used to enrich sessions.
#[derive(Debug, Clone, Default)]
pub struct ClientContext {
    /// Caller IP address, when known.
    pub ip_address: Option<String>,

    /// Caller user agent, when known.
    pub user_agent: Option<String>,
}

/// Why a session is being invalidated; recorded in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidationReason {
    /// Explicit logout by the user.
    Logout,
    /// Credential change forces re-authentication.
    CredentialChange,
    /// The account was deactivated.
    AccountDeactivated,
    /// Administrative action.
    Administrative,
}

/// What a validated access token resolves to.
#[derive(Debug, Clone)]
pub struct AccessContext {
    /// The authenticated user.
    pub user_id: Uuid,

    /// The session backing the token; adapters pass this to logout.
    pub session_id: Uuid,

    /// Role names embedded in the token at issuance.
    pub roles: Vec<String>,
}

/// Manages session creation, rotation, and teardown.
pub struct SessionManager {
    users: Arc<dyn UserStorage>,
    roles: Arc<dyn RoleStorage>,
    sessions: Arc<dyn SessionStorage>,
    tokens: TokenService,
    credentials: Arc<dyn CredentialVerifier>,
    geo: Arc<dyn GeoLookup>,
    clock: Arc<dyn Clock>,
    config: SessionConfig,
    /// A real hash of a throwaway secret, verified against for unknown
    /// identifiers so the failure path costs the same as a mismatch.
    dummy_hash: Option<String>,
}

impl SessionManager {
    /// Creates a manager over the given collaborators.
    #[must_use]
    pub fn new(
        users: Arc<dyn UserStorage>,
        roles: Arc<dyn RoleStorage>,
        sessions: Arc<dyn SessionStorage>,
        tokens: TokenService,
        credentials: Arc<dyn CredentialVerifier>,
        geo: Arc<dyn GeoLookup>,
        clock: Arc<dyn Clock>,
        config: SessionConfig,
    ) -> Self {
        let dummy_hash = credentials.hash("gatekeeper-timing-dummy").ok();
        Self {
            users,
            roles,
            sessions,
            tokens,
            credentials,
            geo,
            clock,
            config,
            dummy_hash,
        }
    }

    /// Verifies credentials and opens a new session.
    ///
    /// The identifier matches username or email, case-insensitively. Every
    /// failure mode (unknown identifier, wrong secret, inactive account)
    /// reports the same `AuthenticationFailed` so callers cannot enumerate
    /// accounts.
    ///
    /// # Errors
    ///
    /// Returns `AuthenticationFailed` or a storage error.
    pub async fn authenticate(
        &self,
        identifier: &str,
        secret: &str,
        context: &ClientContext,
    ) -> AuthResult<TokenPair> {
        let user = self.find_by_identifier(identifier).await?;

        let Some(user) = user else {
            if let Some(dummy) = &self.dummy_hash {
                let _ = self.credentials.verify(secret, dummy);
            }
            debug!(identifier, "Authentication failed: unknown identifier");
            return Err(AuthError::AuthenticationFailed);
        };

        let Some(hash) = user.password_hash.as_deref() else {
            debug!(user_id = %user.id, "Authentication failed: no credential set");
            return Err(AuthError::AuthenticationFailed);
        };
        if !self.credentials.verify(secret, hash).unwrap_or(false) {
            info!(user_id = %user.id, "Authentication failed: credential mismatch");
            return Err(AuthError::AuthenticationFailed);
        }
        if !user.is_active() {
            info!(user_id = %user.id, "Authentication failed: inactive account");
            return Err(AuthError::AuthenticationFailed);
        }

        self.open_session(&user, context).await
    }

    /// Rotates a token pair.
    ///
    /// Validates the refresh token, looks the session up by its hash, and
    /// atomically swaps in new hashes. The old refresh token becomes
    /// unusable the moment rotation commits. Only the rotated session is
    /// touched; the user's other sessions are left alone.
    ///
    /// # Errors
    ///
    /// Returns `InvalidToken` when the token fails validation, matches no
    /// session, or loses a rotation race; or a storage error.
    pub async fn refresh(
        &self,
        refresh_token: &str,
        _context: &ClientContext,
    ) -> AuthResult<TokenPair> {
        let now = self.clock.now();
        let claims = self.tokens.verify(refresh_token, TokenKind::Refresh, now)?;

        let old_hash = hash_token(refresh_token);
        let session = self
            .sessions
            .find_by_refresh_hash(&old_hash)
            .await?
            .ok_or_else(|| AuthError::invalid_token("no session for token"))?;

        if !session.is_valid(now) {
            return Err(AuthError::invalid_token("session expired or inactive"));
        }

        // Roles may have changed since issuance; re-embed the current set.
        let roles = match self.users.find_by_id(claims.sub).await? {
            Some(user) if user.is_active() => self.role_names(&user).await?,
            _ => return Err(AuthError::invalid_token("subject no longer active")),
        };

        let issued = self.tokens.issue_pair(claims.sub, roles, now)?;
        let rotated = self
            .sessions
            .rotate(&old_hash, &issued.hashes, issued.refresh_expires_at, now)
            .await?;
        if !rotated {
            // Lost a race against a concurrent refresh of the same token.
            debug!(session_id = %session.id, "Refresh lost rotation race");
            return Err(AuthError::invalid_token("token already rotated"));
        }

        info!(session_id = %session.id, user_id = %claims.sub, "Session rotated");
        Ok(issued.pair)
    }

    /// Marks a session inactive. Invalidating twice is not an error.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the update fails.
    pub async fn invalidate(
        &self,
        session_id: Uuid,
        reason: InvalidationReason,
    ) -> AuthResult<()> {
        self.sessions.invalidate(session_id).await?;
        info!(%session_id, ?reason, "Session invalidated");
        Ok(())
    }

    /// Marks every active session for a user inactive.
    ///
    /// Used on password change or forced logout-everywhere.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the update fails.
    pub async fn invalidate_all_for_user(
        &self,
        user_id: Uuid,
        reason: InvalidationReason,
    ) -> AuthResult<u64> {
        let count = self.sessions.invalidate_all_for_user(user_id).await?;
        info!(%user_id, ?reason, count, "All sessions invalidated for user");
        Ok(count)
    }

    /// Deletes expired sessions and inactive sessions past the retention
    /// window. Intended for a periodic sweep, not per-request use.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the sweep fails.
    pub async fn cleanup_expired(&self) -> AuthResult<u64> {
        let now = self.clock.now();
        let retention =
            time::Duration::seconds_f64(self.config.inactive_retention.as_secs_f64());
        let count = self.sessions.cleanup(now, now - retention).await?;
        if count > 0 {
            info!(count, "Session cleanup sweep removed rows");
        }
        Ok(count)
    }

    /// Validates an access token and confirms its session is still live.
    ///
    /// # Errors
    ///
    /// Returns `InvalidToken` on any validation failure.
    pub async fn validate_access(&self, access_token: &str) -> AuthResult<AccessContext> {
        let now = self.clock.now();
        let claims = self.tokens.verify(access_token, TokenKind::Access, now)?;

        let session = self
            .sessions
            .find_by_access_hash(&hash_token(access_token))
            .await?
            .ok_or_else(|| AuthError::invalid_token("no session for token"))?;
        if !session.is_valid(now) {
            return Err(AuthError::invalid_token("session expired or inactive"));
        }

        self.sessions.touch(session.id, now).await?;
        Ok(AccessContext {
            user_id: claims.sub,
            session_id: session.id,
            roles: claims.roles,
        })
    }

    async fn find_by_identifier(&self, identifier: &str) -> AuthResult<Option<User>> {
        if identifier.contains('@') {
            self.users.find_by_email(identifier).await
        } else {
            self.users.find_by_username(identifier).await
        }
    }

    async fn open_session(&self, user: &User, context: &ClientContext) -> AuthResult<TokenPair> {
        let now = self.clock.now();
        let roles = self.role_names(user).await?;
        let issued = self.tokens.issue_pair(user.id, roles, now)?;

        // Geo enrichment is optional and must never block authentication.
        let country_code = match &context.ip_address {
            Some(ip) => self.geo.country(ip).await,
            None => None,
        };

        let session = Session {
            id: Uuid::new_v4(),
            user_id: user.id,
            access_token_hash: issued.hashes.access_token_hash.clone(),
            refresh_token_hash: issued.hashes.refresh_token_hash.clone(),
            expires_at: issued.refresh_expires_at,
            created_at: now,
            last_used_at: now,
            ip_address: context.ip_address.clone(),
            user_agent: context.user_agent.clone(),
            country_code,
            active: true,
        };
        self.sessions.create(&session).await?;

        info!(user_id = %user.id, session_id = %session.id, "Session created");
        Ok(issued.pair)
    }

    /// Resolves the user's role names for embedding in token claims.
    ///
    /// Dangling assignments are skipped; the authorization engine remains
    /// the authoritative permission check.
    async fn role_names(&self, user: &User) -> AuthResult<Vec<String>> {
        let mut names = Vec::with_capacity(user.roles.len());
        for role_id in &user.roles {
            if let Some(role) = self.roles.find_by_id(*role_id).await? {
                names.push(role.name);
            }
        }
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    // Full lifecycle coverage (authenticate/refresh/rotation races/cleanup)
    // lives in tests/lifecycle.rs against the in-memory backend; these unit
    // tests pin the pure pieces.
    use super::*;

    #[test]
    fn test_client_context_default_is_empty() {
        let context = ClientContext::default();
        assert!(context.ip_address.is_none());
        assert!(context.user_agent.is_none());
    }

    #[test]
    fn test_invalidation_reason_is_loggable() {
        assert_eq!(format!("{:?}", InvalidationReason::Logout), "Logout");
        assert_eq!(
            format!("{:?}", InvalidationReason::CredentialChange),
            "CredentialChange"
        );
    }
}
