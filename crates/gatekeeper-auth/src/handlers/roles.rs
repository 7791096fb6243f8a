//! Role and permission commands.
//!
//! Every mutation here invalidates conservatively through
//! [`crate::authz::AuthorizationEngine`]: the role's own entry, every
//! roles-list page, and every cached per-user entry where membership could
//! be affected.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

use crate::AuthResult;
use crate::cache::keys;
use crate::dispatch::{Command, CommandHandler, Query, QueryHandler, Request};
use crate::error::AuthError;
use crate::handlers::AuthCore;
use crate::storage::{Permission, Role};

/// Upper bound on a list page, matching what the store can serve sanely.
const MAX_PAGE_SIZE: i64 = 100;

// ============================================================================
// CreateRole
// ============================================================================

/// Creates a new empty role.
#[derive(Debug, Clone)]
pub struct CreateRole {
    /// Unique role name.
    pub name: String,

    /// Optional human-readable description.
    pub description: Option<String>,
}

impl Request for CreateRole {
    type Output = Role;

    fn validate(&self) -> AuthResult<()> {
        if self.name.trim().is_empty() {
            return Err(AuthError::validation("role name must not be empty"));
        }
        Ok(())
    }
}

impl Command for CreateRole {}

/// Handles [`CreateRole`].
pub struct CreateRoleHandler {
    core: Arc<AuthCore>,
}

impl CreateRoleHandler {
    pub(crate) fn new(core: &Arc<AuthCore>) -> Self {
        Self {
            core: Arc::clone(core),
        }
    }
}

#[async_trait]
impl CommandHandler<CreateRole> for CreateRoleHandler {
    async fn handle(&self, command: CreateRole) -> AuthResult<Role> {
        if self.core.roles.find_by_name(&command.name).await?.is_some() {
            return Err(AuthError::already_exists("role name"));
        }

        let mut role = Role::new(command.name, self.core.clock.now());
        role.description = command.description;
        self.core.roles.create(&role).await?;

        // New role: only the list pages can be stale.
        self.core
            .cache
            .invalidate_pattern(keys::role_list_pattern())
            .await;

        info!(role_id = %role.id, name = %role.name, "Role created");
        Ok(role)
    }
}

// ============================================================================
// DeleteRole
// ============================================================================

/// Deletes a role.
///
/// Assignments referencing the deleted role become dangling and grant
/// nothing; they are cleaned up lazily as users are updated.
#[derive(Debug, Clone, Copy)]
pub struct DeleteRole {
    /// The role to delete.
    pub role_id: Uuid,
}

impl Request for DeleteRole {
    type Output = ();
}

impl Command for DeleteRole {}

/// Handles [`DeleteRole`].
pub struct DeleteRoleHandler {
    core: Arc<AuthCore>,
}

impl DeleteRoleHandler {
    pub(crate) fn new(core: &Arc<AuthCore>) -> Self {
        Self {
            core: Arc::clone(core),
        }
    }
}

#[async_trait]
impl CommandHandler<DeleteRole> for DeleteRoleHandler {
    async fn handle(&self, command: DeleteRole) -> AuthResult<()> {
        self.core.roles.delete(command.role_id).await?;
        self.core.authz.invalidate_role(command.role_id).await;
        info!(role_id = %command.role_id, "Role deleted");
        Ok(())
    }
}

// ============================================================================
// AssignRole / RevokeRole
// ============================================================================

/// Assigns a role to a user. Assigning an already-held role is a no-op.
#[derive(Debug, Clone, Copy)]
pub struct AssignRole {
    /// The user receiving the role.
    pub user_id: Uuid,

    /// The role to assign.
    pub role_id: Uuid,
}

impl Request for AssignRole {
    type Output = ();
}

impl Command for AssignRole {}

/// Handles [`AssignRole`].
pub struct AssignRoleHandler {
    core: Arc<AuthCore>,
}

impl AssignRoleHandler {
    pub(crate) fn new(core: &Arc<AuthCore>) -> Self {
        Self {
            core: Arc::clone(core),
        }
    }
}

#[async_trait]
impl CommandHandler<AssignRole> for AssignRoleHandler {
    async fn handle(&self, command: AssignRole) -> AuthResult<()> {
        let mut user = self
            .core
            .users
            .find_by_id(command.user_id)
            .await?
            .ok_or_else(|| AuthError::user_not_found(command.user_id))?;
        if self
            .core
            .roles
            .find_by_id(command.role_id)
            .await?
            .is_none()
        {
            return Err(AuthError::role_not_found(command.role_id));
        }

        if !user.has_role(command.role_id) {
            user.roles.push(command.role_id);
            user.updated_at = self.core.clock.now();
            self.core.users.update(&user).await?;
        }

        // Assignment only affects this user's cached authorization state
        // and profile.
        self.core.authz.invalidate_user(command.user_id).await;
        self.core
            .cache
            .invalidate(&keys::user_profile(command.user_id))
            .await;

        info!(user_id = %command.user_id, role_id = %command.role_id, "Role assigned");
        Ok(())
    }
}

/// Removes a role from a user. Revoking an unheld role is a no-op.
#[derive(Debug, Clone, Copy)]
pub struct RevokeRole {
    /// The user losing the role.
    pub user_id: Uuid,

    /// The role to revoke.
    pub role_id: Uuid,
}

impl Request for RevokeRole {
    type Output = ();
}

impl Command for RevokeRole {}

/// Handles [`RevokeRole`].
pub struct RevokeRoleHandler {
    core: Arc<AuthCore>,
}

impl RevokeRoleHandler {
    pub(crate) fn new(core: &Arc<AuthCore>) -> Self {
        Self {
            core: Arc::clone(core),
        }
    }
}

#[async_trait]
impl CommandHandler<RevokeRole> for RevokeRoleHandler {
    async fn handle(&self, command: RevokeRole) -> AuthResult<()> {
        let mut user = self
            .core
            .users
            .find_by_id(command.user_id)
            .await?
            .ok_or_else(|| AuthError::user_not_found(command.user_id))?;

        if user.has_role(command.role_id) {
            user.roles.retain(|id| *id != command.role_id);
            user.updated_at = self.core.clock.now();
            self.core.users.update(&user).await?;
        }

        self.core.authz.invalidate_user(command.user_id).await;
        self.core
            .cache
            .invalidate(&keys::user_profile(command.user_id))
            .await;

        info!(user_id = %command.user_id, role_id = %command.role_id, "Role revoked");
        Ok(())
    }
}

// ============================================================================
// GrantPermission / RevokePermission
// ============================================================================

/// Adds a (resource, action) permission to a role.
#[derive(Debug, Clone)]
pub struct GrantPermission {
    /// The role receiving the permission.
    pub role_id: Uuid,

    /// Resource name, matched exactly at check time.
    pub resource: String,

    /// Action name, matched exactly at check time.
    pub action: String,

    /// Optional description for the permission.
    pub description: Option<String>,
}

impl Request for GrantPermission {
    type Output = ();

    fn validate(&self) -> AuthResult<()> {
        if self.resource.is_empty() || self.action.is_empty() {
            return Err(AuthError::validation("resource and action are required"));
        }
        Ok(())
    }
}

impl Command for GrantPermission {}

/// Handles [`GrantPermission`].
pub struct GrantPermissionHandler {
    core: Arc<AuthCore>,
}

impl GrantPermissionHandler {
    pub(crate) fn new(core: &Arc<AuthCore>) -> Self {
        Self {
            core: Arc::clone(core),
        }
    }
}

#[async_trait]
impl CommandHandler<GrantPermission> for GrantPermissionHandler {
    async fn handle(&self, command: GrantPermission) -> AuthResult<()> {
        let mut role = self
            .core
            .roles
            .find_by_id(command.role_id)
            .await?
            .ok_or_else(|| AuthError::role_not_found(command.role_id))?;

        // (resource, action) uniquely identifies a permission within the
        // role; granting it twice is a conflict, not a silent no-op.
        if role.grants(&command.resource, &command.action) {
            return Err(AuthError::already_exists("permission"));
        }

        let mut permission = Permission::new(command.resource, command.action);
        permission.description = command.description;
        role.permissions.insert(permission);
        self.core.roles.update(&role).await?;

        self.core.authz.invalidate_role(command.role_id).await;
        info!(role_id = %command.role_id, "Permission granted");
        Ok(())
    }
}

/// Removes a (resource, action) permission from a role. Idempotent.
#[derive(Debug, Clone)]
pub struct RevokePermission {
    /// The role losing the permission.
    pub role_id: Uuid,

    /// Resource name of the permission to remove.
    pub resource: String,

    /// Action name of the permission to remove.
    pub action: String,
}

impl Request for RevokePermission {
    type Output = ();

    fn validate(&self) -> AuthResult<()> {
        if self.resource.is_empty() || self.action.is_empty() {
            return Err(AuthError::validation("resource and action are required"));
        }
        Ok(())
    }
}

impl Command for RevokePermission {}

/// Handles [`RevokePermission`].
pub struct RevokePermissionHandler {
    core: Arc<AuthCore>,
}

impl RevokePermissionHandler {
    pub(crate) fn new(core: &Arc<AuthCore>) -> Self {
        Self {
            core: Arc::clone(core),
        }
    }
}

#[async_trait]
impl CommandHandler<RevokePermission> for RevokePermissionHandler {
    async fn handle(&self, command: RevokePermission) -> AuthResult<()> {
        let mut role = self
            .core
            .roles
            .find_by_id(command.role_id)
            .await?
            .ok_or_else(|| AuthError::role_not_found(command.role_id))?;

        let before = role.permissions.len();
        role.permissions
            .retain(|p| !p.matches(&command.resource, &command.action));
        if role.permissions.len() != before {
            self.core.roles.update(&role).await?;
            self.core.authz.invalidate_role(command.role_id).await;
            info!(role_id = %command.role_id, "Permission revoked");
        }

        Ok(())
    }
}

// ============================================================================
// ListRoles
// ============================================================================

/// Reads one page of roles, cached per page.
#[derive(Debug, Clone, Copy)]
pub struct ListRoles {
    /// Maximum roles to return (1..=100).
    pub limit: i64,

    /// Number of roles to skip.
    pub offset: i64,
}

impl Default for ListRoles {
    fn default() -> Self {
        Self {
            limit: 50,
            offset: 0,
        }
    }
}

impl Request for ListRoles {
    type Output = Vec<Role>;

    fn validate(&self) -> AuthResult<()> {
        if self.limit < 1 || self.limit > MAX_PAGE_SIZE {
            return Err(AuthError::validation("limit out of bounds"));
        }
        if self.offset < 0 {
            return Err(AuthError::validation("offset must not be negative"));
        }
        Ok(())
    }
}

impl Query for ListRoles {}

/// Handles [`ListRoles`].
pub struct ListRolesHandler {
    core: Arc<AuthCore>,
}

impl ListRolesHandler {
    pub(crate) fn new(core: &Arc<AuthCore>) -> Self {
        Self {
            core: Arc::clone(core),
        }
    }
}

#[async_trait]
impl QueryHandler<ListRoles> for ListRolesHandler {
    async fn handle(&self, query: ListRoles) -> AuthResult<Vec<Role>> {
        let roles = Arc::clone(&self.core.roles);
        self.core
            .cache
            .get_or_load(
                &keys::role_list_page(query.limit, query.offset),
                self.core.config.cache.role_list,
                || async move { roles.list(query.limit, query.offset).await },
            )
            .await
    }
}
