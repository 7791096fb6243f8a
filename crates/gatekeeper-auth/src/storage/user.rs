//! User storage trait.
//!
//! Defines the interface for user persistence operations.
//! Implementations are provided by storage backends.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::AuthResult;

// =============================================================================
// User Type
// =============================================================================

/// A user in the authentication system.
///
/// Users authenticate with a username-or-email identifier plus a secret and
/// inherit permissions from their assigned roles.
///
/// Username and email are case-insensitively unique across all users; the
/// storage backend enforces this on create and update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier for the user.
    pub id: Uuid,

    /// Unique username (handle) for authentication and display.
    pub username: String,

    /// Unique email address.
    pub email: String,

    /// Hashed credential (None for users provisioned without a secret).
    ///
    /// Only the one-way hash is ever stored. Filter this field out before
    /// exposing a user through an adapter.
    #[serde(default)]
    pub password_hash: Option<String>,

    /// Given name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,

    /// Family name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,

    /// Roles assigned to the user (by role id).
    #[serde(default)]
    pub roles: Vec<Uuid>,

    /// Whether the account is active. Inactive users cannot authenticate.
    pub active: bool,

    /// When the user was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,

    /// When the user was last updated.
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl User {
    /// Creates a new active user with the given username and email.
    #[must_use]
    pub fn new(username: impl Into<String>, email: impl Into<String>, now: OffsetDateTime) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
            email: email.into(),
            password_hash: None,
            first_name: None,
            last_name: None,
            roles: Vec::new(),
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns `true` if the account is active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Returns `true` if the user is assigned the given role.
    #[must_use]
    pub fn has_role(&self, role_id: Uuid) -> bool {
        self.roles.contains(&role_id)
    }

    /// The user's display name: full name when available, username otherwise.
    #[must_use]
    pub fn display_name(&self) -> String {
        match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) => format!("{first} {last}"),
            (Some(first), None) => first.clone(),
            (None, Some(last)) => last.clone(),
            (None, None) => self.username.clone(),
        }
    }
}

// =============================================================================
// User Storage Trait
// =============================================================================

/// Storage operations for users.
///
/// Username and email lookups are case-insensitive; the backend owns the
/// folding so that SQL implementations can use functional indexes.
#[async_trait]
pub trait UserStorage: Send + Sync {
    /// Find a user by their unique ID.
    ///
    /// Returns `None` if the user doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_id(&self, user_id: Uuid) -> AuthResult<Option<User>>;

    /// Find a user by username, case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_username(&self, username: &str) -> AuthResult<Option<User>>;

    /// Find a user by email, case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_email(&self, email: &str) -> AuthResult<Option<User>>;

    /// Returns `true` if a user with the given username exists
    /// (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn username_exists(&self, username: &str) -> AuthResult<bool>;

    /// Create a new user.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyExists` if the username or email is taken
    /// (case-insensitive), or an error if the storage operation fails.
    async fn create(&self, user: &User) -> AuthResult<()>;

    /// Update an existing user.
    ///
    /// # Errors
    ///
    /// Returns `UserNotFound` if the user doesn't exist, `AlreadyExists` on
    /// a uniqueness violation, or an error if the storage operation fails.
    async fn update(&self, user: &User) -> AuthResult<()>;

    /// Deactivate a user (soft delete; preferred over deletion).
    ///
    /// # Errors
    ///
    /// Returns `UserNotFound` if the user doesn't exist, or an error if the
    /// storage operation fails.
    async fn deactivate(&self, user_id: Uuid) -> AuthResult<()>;

    /// List users with pagination.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn list(&self, limit: i64, offset: i64) -> AuthResult<Vec<User>>;

    /// Count all users.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn count(&self) -> AuthResult<i64>;
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> OffsetDateTime {
        OffsetDateTime::UNIX_EPOCH
    }

    #[test]
    fn test_user_new() {
        let user = User::new("jdoe", "jdoe@example.com", now());
        assert_eq!(user.username, "jdoe");
        assert_eq!(user.email, "jdoe@example.com");
        assert!(user.active);
        assert!(user.roles.is_empty());
        assert!(user.password_hash.is_none());
    }

    #[test]
    fn test_user_has_role() {
        let mut user = User::new("jdoe", "jdoe@example.com", now());
        let role_id = Uuid::new_v4();
        assert!(!user.has_role(role_id));
        user.roles.push(role_id);
        assert!(user.has_role(role_id));
    }

    #[test]
    fn test_display_name() {
        let mut user = User::new("jdoe", "jdoe@example.com", now());
        assert_eq!(user.display_name(), "jdoe");

        user.first_name = Some("Jane".to_string());
        assert_eq!(user.display_name(), "Jane");

        user.last_name = Some("Doe".to_string());
        assert_eq!(user.display_name(), "Jane Doe");
    }

    #[test]
    fn test_user_serialization_roundtrip() {
        let user = User::new("jdoe", "jdoe@example.com", now());
        let json = serde_json::to_string(&user).unwrap();
        let back: User = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, user.id);
        assert_eq!(back.username, user.username);
        assert_eq!(back.email, user.email);
    }
}
