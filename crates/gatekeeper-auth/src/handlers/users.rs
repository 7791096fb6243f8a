//! User commands and queries.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::AuthResult;
use crate::cache::keys;
use crate::dispatch::{Command, CommandHandler, Query, QueryHandler, Request};
use crate::error::AuthError;
use crate::handlers::AuthCore;
use crate::ratelimit::RateIdentifier;
use crate::session::{ClientContext, InvalidationReason};
use crate::storage::{Permission, User};
use crate::username::normalize_name;

// ============================================================================
// RegisterUser
// ============================================================================

/// Creates a new user account.
///
/// When no username is supplied, one is generated from the names; a
/// supplied username must already satisfy handle format and policy.
#[derive(Debug, Clone)]
pub struct RegisterUser {
    /// Email address (unique, case-insensitive).
    pub email: String,

    /// Plaintext secret to hash and store.
    pub password: String,

    /// Given name.
    pub first_name: String,

    /// Family name.
    pub last_name: String,

    /// Explicit username; generated from the names when `None`.
    pub username: Option<String>,

    /// Caller context for rate limiting.
    pub context: ClientContext,
}

impl Request for RegisterUser {
    type Output = UserProfile;

    fn validate(&self) -> AuthResult<()> {
        if !self.email.contains('@') {
            return Err(AuthError::validation("email is malformed"));
        }
        if self.password.len() < 8 {
            return Err(AuthError::validation(
                "password must be at least 8 characters",
            ));
        }
        if self.first_name.trim().is_empty() && self.last_name.trim().is_empty() {
            return Err(AuthError::validation("at least one name is required"));
        }
        Ok(())
    }
}

impl Command for RegisterUser {}

/// Handles [`RegisterUser`].
pub struct RegisterUserHandler {
    core: Arc<AuthCore>,
}

impl RegisterUserHandler {
    pub(crate) fn new(core: &Arc<AuthCore>) -> Self {
        Self {
            core: Arc::clone(core),
        }
    }

    /// Validates a caller-supplied username against handle policy.
    fn check_supplied_username(&self, username: &str) -> AuthResult<String> {
        let config = &self.core.config.username;
        let normalized = normalize_name(username)
            .ok_or_else(|| AuthError::validation("username contains no usable characters"))?;
        if normalized != username {
            return Err(AuthError::validation(
                "username must be lowercase a-z, 0-9, '.' or '-'",
            ));
        }
        if username.len() < config.min_length || username.len() > config.max_length {
            return Err(AuthError::validation("username length out of bounds"));
        }
        if config
            .reserved
            .iter()
            .any(|word| word.eq_ignore_ascii_case(username))
        {
            return Err(AuthError::validation("username is reserved"));
        }
        Ok(normalized)
    }
}

#[async_trait]
impl CommandHandler<RegisterUser> for RegisterUserHandler {
    async fn handle(&self, command: RegisterUser) -> AuthResult<UserProfile> {
        let limits = &self.core.config.rate_limiting;
        let identifier = RateIdentifier::new(command.context.ip_address.as_deref(), None);
        let allowed = self
            .core
            .rate_limiter
            .check(
                &identifier,
                "register",
                limits.register_max_attempts,
                limits.register_window,
            )
            .await;
        if !allowed {
            return Err(AuthError::rate_limited("register"));
        }

        let username = match &command.username {
            Some(supplied) => {
                let username = self.check_supplied_username(supplied)?;
                if self.core.users.username_exists(&username).await? {
                    return Err(AuthError::already_exists("username"));
                }
                username
            }
            None => {
                self.core
                    .usernames
                    .generate(&command.first_name, &command.last_name)
                    .await?
            }
        };

        if self
            .core
            .users
            .find_by_email(&command.email)
            .await?
            .is_some()
        {
            return Err(AuthError::already_exists("email"));
        }

        let now = self.core.clock.now();
        let mut user = User::new(username, command.email.to_lowercase(), now);
        user.password_hash = Some(self.core.credentials.hash(&command.password)?);
        user.first_name = some_trimmed(&command.first_name);
        user.last_name = some_trimmed(&command.last_name);

        // The storage uniqueness check is the authoritative one; the
        // lookups above only give friendlier early errors.
        self.core.users.create(&user).await?;

        Ok(UserProfile::from(&user))
    }
}

fn some_trimmed(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

// ============================================================================
// ChangePassword
// ============================================================================

/// Replaces a user's credential and forces logout everywhere.
#[derive(Debug, Clone)]
pub struct ChangePassword {
    /// The user changing their credential.
    pub user_id: Uuid,

    /// The current plaintext secret, verified before anything changes.
    pub current_password: String,

    /// The replacement secret.
    pub new_password: String,
}

impl Request for ChangePassword {
    type Output = ();

    fn validate(&self) -> AuthResult<()> {
        if self.new_password.len() < 8 {
            return Err(AuthError::validation(
                "password must be at least 8 characters",
            ));
        }
        Ok(())
    }
}

impl Command for ChangePassword {}

/// Handles [`ChangePassword`].
pub struct ChangePasswordHandler {
    core: Arc<AuthCore>,
}

impl ChangePasswordHandler {
    pub(crate) fn new(core: &Arc<AuthCore>) -> Self {
        Self {
            core: Arc::clone(core),
        }
    }
}

#[async_trait]
impl CommandHandler<ChangePassword> for ChangePasswordHandler {
    async fn handle(&self, command: ChangePassword) -> AuthResult<()> {
        let mut user = self
            .core
            .users
            .find_by_id(command.user_id)
            .await?
            .ok_or_else(|| AuthError::user_not_found(command.user_id))?;

        let current_ok = user
            .password_hash
            .as_deref()
            .map(|hash| {
                self.core
                    .credentials
                    .verify(&command.current_password, hash)
                    .unwrap_or(false)
            })
            .unwrap_or(false);
        if !current_ok {
            return Err(AuthError::AuthenticationFailed);
        }

        user.password_hash = Some(self.core.credentials.hash(&command.new_password)?);
        user.updated_at = self.core.clock.now();
        self.core.users.update(&user).await?;

        // Credential change invalidates every session and the cached
        // profile projection.
        self.core
            .sessions
            .invalidate_all_for_user(user.id, InvalidationReason::CredentialChange)
            .await?;
        self.core
            .cache
            .invalidate(&keys::user_profile(user.id))
            .await;

        Ok(())
    }
}

// ============================================================================
// DeactivateUser
// ============================================================================

/// Deactivates an account, preferred over deletion.
///
/// The user can no longer authenticate and every live session is killed;
/// the row stays for audit and uniqueness purposes.
#[derive(Debug, Clone, Copy)]
pub struct DeactivateUser {
    /// The user to deactivate.
    pub user_id: Uuid,
}

impl Request for DeactivateUser {
    type Output = ();
}

impl Command for DeactivateUser {}

/// Handles [`DeactivateUser`].
pub struct DeactivateUserHandler {
    core: Arc<AuthCore>,
}

impl DeactivateUserHandler {
    pub(crate) fn new(core: &Arc<AuthCore>) -> Self {
        Self {
            core: Arc::clone(core),
        }
    }
}

#[async_trait]
impl CommandHandler<DeactivateUser> for DeactivateUserHandler {
    async fn handle(&self, command: DeactivateUser) -> AuthResult<()> {
        self.core.users.deactivate(command.user_id).await?;
        self.core
            .sessions
            .invalidate_all_for_user(command.user_id, InvalidationReason::AccountDeactivated)
            .await?;

        // Drop the stale profile and any cached authorization state.
        self.core
            .cache
            .invalidate(&keys::user_profile(command.user_id))
            .await;
        self.core.authz.invalidate_user(command.user_id).await;

        Ok(())
    }
}

// ============================================================================
// GetUserProfile
// ============================================================================

/// A user projection safe to hand to adapters (no credential hash).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    /// The user id.
    pub id: Uuid,

    /// Unique username.
    pub username: String,

    /// Unique email.
    pub email: String,

    /// Given name.
    pub first_name: Option<String>,

    /// Family name.
    pub last_name: Option<String>,

    /// Assigned role ids.
    pub roles: Vec<Uuid>,

    /// Whether the account is active.
    pub active: bool,

    /// When the account was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            roles: user.roles.clone(),
            active: user.active,
            created_at: user.created_at,
        }
    }
}

/// Reads a user profile, served read-through from the cache.
#[derive(Debug, Clone, Copy)]
pub struct GetUserProfile {
    /// The user to read.
    pub user_id: Uuid,
}

impl Request for GetUserProfile {
    type Output = UserProfile;
}

impl Query for GetUserProfile {}

/// Handles [`GetUserProfile`].
pub struct GetUserProfileHandler {
    core: Arc<AuthCore>,
}

impl GetUserProfileHandler {
    pub(crate) fn new(core: &Arc<AuthCore>) -> Self {
        Self {
            core: Arc::clone(core),
        }
    }
}

#[async_trait]
impl QueryHandler<GetUserProfile> for GetUserProfileHandler {
    async fn handle(&self, query: GetUserProfile) -> AuthResult<UserProfile> {
        let users = Arc::clone(&self.core.users);
        let user_id = query.user_id;
        self.core
            .cache
            .get_or_load(
                &keys::user_profile(user_id),
                self.core.config.cache.user_profile,
                || async move {
                    let user = users
                        .find_by_id(user_id)
                        .await?
                        .ok_or_else(|| AuthError::user_not_found(user_id))?;
                    Ok(UserProfile::from(&user))
                },
            )
            .await
    }
}

// ============================================================================
// CheckPermission / GetEffectivePermissions
// ============================================================================

/// Checks one (resource, action) permission for a user.
#[derive(Debug, Clone)]
pub struct CheckPermission {
    /// The user being checked.
    pub user_id: Uuid,

    /// The resource name, matched exactly.
    pub resource: String,

    /// The action name, matched exactly.
    pub action: String,
}

impl Request for CheckPermission {
    type Output = bool;

    fn validate(&self) -> AuthResult<()> {
        if self.resource.is_empty() || self.action.is_empty() {
            return Err(AuthError::validation("resource and action are required"));
        }
        Ok(())
    }
}

impl Query for CheckPermission {}

/// Handles [`CheckPermission`].
pub struct CheckPermissionHandler {
    core: Arc<AuthCore>,
}

impl CheckPermissionHandler {
    pub(crate) fn new(core: &Arc<AuthCore>) -> Self {
        Self {
            core: Arc::clone(core),
        }
    }
}

#[async_trait]
impl QueryHandler<CheckPermission> for CheckPermissionHandler {
    async fn handle(&self, query: CheckPermission) -> AuthResult<bool> {
        self.core
            .authz
            .has_permission(query.user_id, &query.resource, &query.action)
            .await
    }
}

/// Resolves a user's full effective permission set.
#[derive(Debug, Clone, Copy)]
pub struct GetEffectivePermissions {
    /// The user being resolved.
    pub user_id: Uuid,
}

impl Request for GetEffectivePermissions {
    type Output = HashSet<Permission>;
}

impl Query for GetEffectivePermissions {}

/// Handles [`GetEffectivePermissions`].
pub struct GetEffectivePermissionsHandler {
    core: Arc<AuthCore>,
}

impl GetEffectivePermissionsHandler {
    pub(crate) fn new(core: &Arc<AuthCore>) -> Self {
        Self {
            core: Arc::clone(core),
        }
    }
}

#[async_trait]
impl QueryHandler<GetEffectivePermissions> for GetEffectivePermissionsHandler {
    async fn handle(&self, query: GetEffectivePermissions) -> AuthResult<HashSet<Permission>> {
        self.core.authz.effective_permissions(query.user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_validation() {
        let base = RegisterUser {
            email: "jane@example.com".to_string(),
            password: "correcthorse".to_string(),
            first_name: "Jane".to_string(),
            last_name: "Doe".to_string(),
            username: None,
            context: ClientContext::default(),
        };
        assert!(base.validate().is_ok());

        let bad_email = RegisterUser {
            email: "not-an-email".to_string(),
            ..base.clone()
        };
        assert!(matches!(
            bad_email.validate(),
            Err(AuthError::Validation { .. })
        ));

        let short_password = RegisterUser {
            password: "short".to_string(),
            ..base.clone()
        };
        assert!(matches!(
            short_password.validate(),
            Err(AuthError::Validation { .. })
        ));

        let no_names = RegisterUser {
            first_name: " ".to_string(),
            last_name: String::new(),
            ..base
        };
        assert!(matches!(
            no_names.validate(),
            Err(AuthError::Validation { .. })
        ));
    }

    #[test]
    fn test_check_permission_validation() {
        let query = CheckPermission {
            user_id: Uuid::new_v4(),
            resource: String::new(),
            action: "read".to_string(),
        };
        assert!(matches!(query.validate(), Err(AuthError::Validation { .. })));
    }

    #[test]
    fn test_profile_hides_credential_hash() {
        let mut user = User::new("jdoe", "jdoe@example.com", OffsetDateTime::UNIX_EPOCH);
        user.password_hash = Some("$argon2id$...".to_string());

        let profile = UserProfile::from(&user);
        let json = serde_json::to_string(&profile).unwrap();
        assert!(!json.contains("argon2id"));
        assert!(json.contains("jdoe"));
    }
}
