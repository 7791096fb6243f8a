//! Session lifecycle commands.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::AuthResult;
use crate::dispatch::{Command, CommandHandler, Query, QueryHandler, Request};
use crate::error::AuthError;
use crate::handlers::AuthCore;
use crate::ratelimit::RateIdentifier;
use crate::session::{AccessContext, ClientContext, InvalidationReason};
use crate::token::TokenPair;

// ============================================================================
// Authenticate
// ============================================================================

/// Verifies credentials and opens a session.
#[derive(Debug, Clone)]
pub struct Authenticate {
    /// Username or email, matched case-insensitively.
    pub identifier: String,

    /// The plaintext secret.
    pub secret: String,

    /// Caller context for session enrichment and rate limiting.
    pub context: ClientContext,
}

impl Request for Authenticate {
    type Output = TokenPair;

    fn validate(&self) -> AuthResult<()> {
        if self.identifier.trim().is_empty() {
            return Err(AuthError::validation("identifier must not be empty"));
        }
        if self.secret.is_empty() {
            return Err(AuthError::validation("secret must not be empty"));
        }
        Ok(())
    }
}

impl Command for Authenticate {}

/// Handles [`Authenticate`].
pub struct AuthenticateHandler {
    core: Arc<AuthCore>,
}

impl AuthenticateHandler {
    pub(crate) fn new(core: &Arc<AuthCore>) -> Self {
        Self {
            core: Arc::clone(core),
        }
    }
}

#[async_trait]
impl CommandHandler<Authenticate> for AuthenticateHandler {
    async fn handle(&self, command: Authenticate) -> AuthResult<TokenPair> {
        // Throttle before touching the store; the caller is unauthenticated
        // here so the identifier is IP-only.
        let limits = &self.core.config.rate_limiting;
        let identifier = RateIdentifier::new(command.context.ip_address.as_deref(), None);
        let allowed = self
            .core
            .rate_limiter
            .check(
                &identifier,
                "login",
                limits.login_max_attempts,
                limits.login_window,
            )
            .await;
        if !allowed {
            return Err(AuthError::rate_limited("login"));
        }

        self.core
            .sessions
            .authenticate(&command.identifier, &command.secret, &command.context)
            .await
    }
}

// ============================================================================
// RefreshSession
// ============================================================================

/// Rotates a token pair using a refresh token.
#[derive(Debug, Clone)]
pub struct RefreshSession {
    /// The refresh token presented by the client.
    pub refresh_token: String,

    /// Caller context.
    pub context: ClientContext,
}

impl Request for RefreshSession {
    type Output = TokenPair;

    fn validate(&self) -> AuthResult<()> {
        if self.refresh_token.is_empty() {
            return Err(AuthError::validation("refresh token must not be empty"));
        }
        Ok(())
    }
}

impl Command for RefreshSession {}

/// Handles [`RefreshSession`].
pub struct RefreshSessionHandler {
    core: Arc<AuthCore>,
}

impl RefreshSessionHandler {
    pub(crate) fn new(core: &Arc<AuthCore>) -> Self {
        Self {
            core: Arc::clone(core),
        }
    }
}

#[async_trait]
impl CommandHandler<RefreshSession> for RefreshSessionHandler {
    async fn handle(&self, command: RefreshSession) -> AuthResult<TokenPair> {
        self.core
            .sessions
            .refresh(&command.refresh_token, &command.context)
            .await
    }
}

// ============================================================================
// InvalidateSession
// ============================================================================

/// Marks one session inactive. Idempotent.
#[derive(Debug, Clone)]
pub struct InvalidateSession {
    /// The session to invalidate.
    pub session_id: Uuid,

    /// Why the session is going away.
    pub reason: InvalidationReason,
}

impl Request for InvalidateSession {
    type Output = ();
}

impl Command for InvalidateSession {}

/// Handles [`InvalidateSession`].
pub struct InvalidateSessionHandler {
    core: Arc<AuthCore>,
}

impl InvalidateSessionHandler {
    pub(crate) fn new(core: &Arc<AuthCore>) -> Self {
        Self {
            core: Arc::clone(core),
        }
    }
}

#[async_trait]
impl CommandHandler<InvalidateSession> for InvalidateSessionHandler {
    async fn handle(&self, command: InvalidateSession) -> AuthResult<()> {
        self.core
            .sessions
            .invalidate(command.session_id, command.reason)
            .await
    }
}

// ============================================================================
// InvalidateAllSessions
// ============================================================================

/// Marks every active session for a user inactive (logout everywhere).
#[derive(Debug, Clone)]
pub struct InvalidateAllSessions {
    /// The user whose sessions are invalidated.
    pub user_id: Uuid,

    /// Why the sessions are going away.
    pub reason: InvalidationReason,
}

impl Request for InvalidateAllSessions {
    type Output = u64;
}

impl Command for InvalidateAllSessions {}

/// Handles [`InvalidateAllSessions`].
pub struct InvalidateAllSessionsHandler {
    core: Arc<AuthCore>,
}

impl InvalidateAllSessionsHandler {
    pub(crate) fn new(core: &Arc<AuthCore>) -> Self {
        Self {
            core: Arc::clone(core),
        }
    }
}

#[async_trait]
impl CommandHandler<InvalidateAllSessions> for InvalidateAllSessionsHandler {
    async fn handle(&self, command: InvalidateAllSessions) -> AuthResult<u64> {
        self.core
            .sessions
            .invalidate_all_for_user(command.user_id, command.reason)
            .await
    }
}

// ============================================================================
// CleanupSessions
// ============================================================================

/// Deletes expired and long-inactive sessions. Run periodically.
#[derive(Debug, Clone, Copy, Default)]
pub struct CleanupSessions;

impl Request for CleanupSessions {
    type Output = u64;
}

impl Command for CleanupSessions {}

/// Handles [`CleanupSessions`].
pub struct CleanupSessionsHandler {
    core: Arc<AuthCore>,
}

impl CleanupSessionsHandler {
    pub(crate) fn new(core: &Arc<AuthCore>) -> Self {
        Self {
            core: Arc::clone(core),
        }
    }
}

#[async_trait]
impl CommandHandler<CleanupSessions> for CleanupSessionsHandler {
    async fn handle(&self, _command: CleanupSessions) -> AuthResult<u64> {
        self.core.sessions.cleanup_expired().await
    }
}

// ============================================================================
// ValidateAccess
// ============================================================================

/// Validates an access token and resolves its subject and session.
///
/// Adapters run this per-request; it checks signature, expiry, issuer, and
/// that the backing session is still live. The returned session id is what
/// [`InvalidateSession`] takes on logout.
#[derive(Debug, Clone)]
pub struct ValidateAccess {
    /// The access token presented by the client.
    pub access_token: String,
}

impl Request for ValidateAccess {
    type Output = AccessContext;

    fn validate(&self) -> AuthResult<()> {
        if self.access_token.is_empty() {
            return Err(AuthError::validation("access token must not be empty"));
        }
        Ok(())
    }
}

impl Query for ValidateAccess {}

/// Handles [`ValidateAccess`].
pub struct ValidateAccessHandler {
    core: Arc<AuthCore>,
}

impl ValidateAccessHandler {
    pub(crate) fn new(core: &Arc<AuthCore>) -> Self {
        Self {
            core: Arc::clone(core),
        }
    }
}

#[async_trait]
impl QueryHandler<ValidateAccess> for ValidateAccessHandler {
    async fn handle(&self, query: ValidateAccess) -> AuthResult<AccessContext> {
        self.core.sessions.validate_access(&query.access_token).await
    }
}
