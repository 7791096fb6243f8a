//! Role and permission storage trait.
//!
//! Defines the interface for role persistence operations.
//! Implementations are provided by storage backends.

use std::collections::HashSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::AuthResult;

// =============================================================================
// Permission
// =============================================================================

/// A permission identified by its (resource, action) pair.
///
/// Permission checks are case-sensitive exact matches on the pair; there are
/// no wildcard or hierarchy semantics.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Permission {
    /// Unique identifier for the permission.
    pub id: Uuid,

    /// The resource the permission applies to (e.g. "user", "report").
    pub resource: String,

    /// The action permitted on the resource (e.g. "read", "delete").
    pub action: String,

    /// Display name for the permission.
    pub name: String,

    /// Description of what the permission allows.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Permission {
    /// Creates a new permission for a (resource, action) pair.
    #[must_use]
    pub fn new(resource: impl Into<String>, action: impl Into<String>) -> Self {
        let resource = resource.into();
        let action = action.into();
        let name = format!("{resource}:{action}");
        Self {
            id: Uuid::new_v4(),
            resource,
            action,
            name,
            description: None,
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// The canonical `resource:action` key for this permission.
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}:{}", self.resource, self.action)
    }

    /// Returns `true` if this permission matches the given pair exactly.
    #[must_use]
    pub fn matches(&self, resource: &str, action: &str) -> bool {
        self.resource == resource && self.action == action
    }
}

// =============================================================================
// Role Type
// =============================================================================

/// A role in the authorization system.
///
/// Roles group permissions together and are assigned to users, who inherit
/// the union of their roles' permissions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    /// Unique identifier for the role.
    pub id: Uuid,

    /// Unique role name (e.g. "admin", "auditor").
    pub name: String,

    /// Human-readable description of the role.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Permissions granted by this role.
    #[serde(default)]
    pub permissions: HashSet<Permission>,

    /// When the role was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Role {
    /// Creates a new role with the given name and no permissions.
    #[must_use]
    pub fn new(name: impl Into<String>, now: OffsetDateTime) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: None,
            permissions: HashSet::new(),
            created_at: now,
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Adds a permission to the role.
    #[must_use]
    pub fn with_permission(mut self, permission: Permission) -> Self {
        self.permissions.insert(permission);
        self
    }

    /// Returns `true` if the role grants the (resource, action) pair.
    #[must_use]
    pub fn grants(&self, resource: &str, action: &str) -> bool {
        self.permissions.iter().any(|p| p.matches(resource, action))
    }
}

// =============================================================================
// Role Storage Trait
// =============================================================================

/// Storage operations for roles.
///
/// The (resource, action) pair uniquely identifies a permission within a
/// role; the role name is unique across roles.
#[async_trait]
pub trait RoleStorage: Send + Sync {
    /// Find a role by its unique ID.
    ///
    /// Returns `None` if the role doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_id(&self, role_id: Uuid) -> AuthResult<Option<Role>>;

    /// Find a role by its name.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_name(&self, name: &str) -> AuthResult<Option<Role>>;

    /// Create a new role.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyExists` if the name is taken, or an error if the
    /// storage operation fails.
    async fn create(&self, role: &Role) -> AuthResult<()>;

    /// Update an existing role (including its permission set).
    ///
    /// # Errors
    ///
    /// Returns `RoleNotFound` if the role doesn't exist, or an error if the
    /// storage operation fails.
    async fn update(&self, role: &Role) -> AuthResult<()>;

    /// Delete a role.
    ///
    /// # Errors
    ///
    /// Returns `RoleNotFound` if the role doesn't exist, or an error if the
    /// storage operation fails.
    async fn delete(&self, role_id: Uuid) -> AuthResult<()>;

    /// List roles with pagination.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn list(&self, limit: i64, offset: i64) -> AuthResult<Vec<Role>>;

    /// Count all roles.
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
    fn test_permission_key() {
        let perm = Permission::new("report", "read");
        assert_eq!(perm.key(), "report:read");
        assert_eq!(perm.name, "report:read");
    }

    #[test]
    fn test_permission_matching_is_case_sensitive() {
        let perm = Permission::new("report", "read");
        assert!(perm.matches("report", "read"));
        assert!(!perm.matches("Report", "read"));
        assert!(!perm.matches("report", "READ"));
    }

    #[test]
    fn test_role_grants() {
        let role = Role::new("auditor", now())
            .with_permission(Permission::new("report", "read"))
            .with_permission(Permission::new("audit-log", "read"));

        assert!(role.grants("report", "read"));
        assert!(role.grants("audit-log", "read"));
        assert!(!role.grants("report", "delete"));
    }

    #[test]
    fn test_role_builder() {
        let role = Role::new("admin", now()).with_description("Full access");
        assert_eq!(role.name, "admin");
        assert_eq!(role.description, Some("Full access".to_string()));
        assert!(role.permissions.is_empty());
    }

    #[test]
    fn test_permission_set_dedup() {
        // Two permissions with the same identity are distinct entries (ids
        // differ), but an identical clone is not.
        let perm = Permission::new("report", "read");
        let role = Role::new("auditor", now())
            .with_permission(perm.clone())
            .with_permission(perm);
        assert_eq!(role.permissions.len(), 1);
    }
}
