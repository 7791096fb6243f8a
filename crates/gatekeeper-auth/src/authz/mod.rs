//! RBAC authorization engine.
//!
//! Resolves a user's effective permissions as the union of their assigned
//! roles' permissions, with a read-through cache over the durable store.
//!
//! Role mutations invalidate conservatively: the role's own entry, every
//! cached roles-list page, and every cached per-user entry. Role membership
//! cannot be cheaply reverse-indexed in the cache, so correctness wins over
//! hit rate.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use crate::AuthResult;
use crate::cache::{Cache, keys};
use crate::config::CacheTtlConfig;
use crate::error::AuthError;
use crate::storage::{Permission, RoleStorage, UserStorage};

/// Cache-backed permission resolution.
pub struct AuthorizationEngine {
    users: Arc<dyn UserStorage>,
    roles: Arc<dyn RoleStorage>,
    cache: Cache,
    ttls: CacheTtlConfig,
}

impl AuthorizationEngine {
    /// Creates an engine over the given stores and cache.
    #[must_use]
    pub fn new(
        users: Arc<dyn UserStorage>,
        roles: Arc<dyn RoleStorage>,
        cache: Cache,
        ttls: CacheTtlConfig,
    ) -> Self {
        Self {
            users,
            roles,
            cache,
            ttls,
        }
    }

    /// Resolves the user's effective permissions.
    ///
    /// Read-through: cache keyed by user id; on miss, load the user's roles
    /// from the store, compute the union of their permissions, populate the
    /// cache, and return.
    ///
    /// # Errors
    ///
    /// Returns `UserNotFound` if the user doesn't exist, or a storage error.
    pub async fn effective_permissions(&self, user_id: Uuid) -> AuthResult<HashSet<Permission>> {
        let key = keys::user_permissions(user_id);
        let users = Arc::clone(&self.users);
        let roles = Arc::clone(&self.roles);

        let permissions: Vec<Permission> = self
            .cache
            .get_or_load(&key, self.ttls.user_permissions, || async move {
                let user = users
                    .find_by_id(user_id)
                    .await?
                    .ok_or_else(|| AuthError::user_not_found(user_id))?;

                let mut union = HashSet::new();
                for role_id in &user.roles {
                    // A dangling assignment (role deleted since) grants
                    // nothing rather than failing the whole resolution.
                    if let Some(role) = roles.find_by_id(*role_id).await? {
                        union.extend(role.permissions.into_iter());
                    } else {
                        debug!(%user_id, %role_id, "Skipping dangling role assignment");
                    }
                }
                Ok(union.into_iter().collect())
            })
            .await?;

        Ok(permissions.into_iter().collect())
    }

    /// Checks a single (resource, action) permission for a user.
    ///
    /// Served from a composite-key cache entry with the shortest TTL; on
    /// miss it resolves through [`Self::effective_permissions`] (itself
    /// cached). Matching is case-sensitive and exact; no wildcards, no
    /// hierarchy.
    ///
    /// # Errors
    ///
    /// Returns `UserNotFound` if the user doesn't exist, or a storage error.
    pub async fn has_permission(
        &self,
        user_id: Uuid,
        resource: &str,
        action: &str,
    ) -> AuthResult<bool> {
        let key = keys::permission_check(user_id, resource, action);

        self.cache
            .get_or_load(&key, self.ttls.permission_check, || async move {
                let permissions = self.effective_permissions(user_id).await?;
                Ok(permissions.iter().any(|p| p.matches(resource, action)))
            })
            .await
    }

    /// Invalidates every cached authorization entry for one user.
    ///
    /// Called when the user's own role assignments change.
    pub async fn invalidate_user(&self, user_id: Uuid) {
        self.cache
            .invalidate_pattern(&keys::user_authz_pattern(user_id))
            .await;
    }

    /// Invalidates after a role-level mutation (permission grant/revoke,
    /// role deletion).
    ///
    /// Drops the role's own entry, every roles-list page, and, because any
    /// user may hold the role, every per-user authorization entry.
    pub async fn invalidate_role(&self, role_id: Uuid) {
        self.cache.invalidate(&keys::role(role_id)).await;
        self.cache.invalidate_pattern(keys::role_list_pattern()).await;
        self.cache
            .invalidate_pattern(keys::all_users_authz_pattern())
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheStore;
    use crate::storage::{Role, User};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;
    use time::OffsetDateTime;

    /// Cache double that actually stores entries, so coherence is testable.
    #[derive(Default)]
    struct MapCache {
        map: Mutex<HashMap<String, String>>,
    }

    #[async_trait]
    impl CacheStore for MapCache {
        async fn get(&self, key: &str) -> AuthResult<Option<String>> {
            Ok(self.map.lock().unwrap().get(key).cloned())
        }

        async fn set_with_ttl(&self, key: &str, value: &str, _ttl: Duration) -> AuthResult<()> {
            self.map
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_string());
            Ok(())
        }

        async fn delete(&self, key: &str) -> AuthResult<()> {
            self.map.lock().unwrap().remove(key);
            Ok(())
        }

        async fn delete_by_pattern(&self, pattern: &str) -> AuthResult<()> {
            let prefix = pattern.trim_end_matches('*');
            self.map
                .lock()
                .unwrap()
                .retain(|k, _| !k.starts_with(prefix));
            Ok(())
        }

        async fn increment_with_ttl(&self, _key: &str, _ttl: Duration) -> AuthResult<u64> {
            Ok(0)
        }
    }

    #[derive(Default)]
    struct Fixture {
        users: Mutex<HashMap<Uuid, User>>,
        roles: Mutex<HashMap<Uuid, Role>>,
    }

    #[async_trait]
    impl UserStorage for Fixture {
        async fn find_by_id(&self, user_id: Uuid) -> AuthResult<Option<User>> {
            Ok(self.users.lock().unwrap().get(&user_id).cloned())
        }

        async fn find_by_username(&self, _username: &str) -> AuthResult<Option<User>> {
            Ok(None)
        }

        async fn find_by_email(&self, _email: &str) -> AuthResult<Option<User>> {
            Ok(None)
        }

        async fn username_exists(&self, _username: &str) -> AuthResult<bool> {
            Ok(false)
        }

        async fn create(&self, user: &User) -> AuthResult<()> {
            self.users.lock().unwrap().insert(user.id, user.clone());
            Ok(())
        }

        async fn update(&self, user: &User) -> AuthResult<()> {
            self.users.lock().unwrap().insert(user.id, user.clone());
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

    #[async_trait]
    impl RoleStorage for Fixture {
        async fn find_by_id(&self, role_id: Uuid) -> AuthResult<Option<Role>> {
            Ok(self.roles.lock().unwrap().get(&role_id).cloned())
        }

        async fn find_by_name(&self, _name: &str) -> AuthResult<Option<Role>> {
            Ok(None)
        }

        async fn create(&self, role: &Role) -> AuthResult<()> {
            self.roles.lock().unwrap().insert(role.id, role.clone());
            Ok(())
        }

        async fn update(&self, role: &Role) -> AuthResult<()> {
            self.roles.lock().unwrap().insert(role.id, role.clone());
            Ok(())
        }

        async fn delete(&self, role_id: Uuid) -> AuthResult<()> {
            self.roles.lock().unwrap().remove(&role_id);
            Ok(())
        }

        async fn list(&self, _limit: i64, _offset: i64) -> AuthResult<Vec<Role>> {
            Ok(vec![])
        }

        async fn count(&self) -> AuthResult<i64> {
            Ok(0)
        }
    }

    fn now() -> OffsetDateTime {
        OffsetDateTime::UNIX_EPOCH
    }

    async fn engine_with_user() -> (AuthorizationEngine, Arc<Fixture>, Uuid, Uuid) {
        let fixture = Arc::new(Fixture::default());
        let role = Role::new("auditor", now())
            .with_permission(Permission::new("report", "read"))
            .with_permission(Permission::new("audit-log", "read"));
        let role_id = role.id;
        RoleStorage::create(fixture.as_ref(), &role).await.unwrap();

        let mut user = User::new("jdoe", "jdoe@example.com", now());
        user.roles.push(role_id);
        let user_id = user.id;
        UserStorage::create(fixture.as_ref(), &user).await.unwrap();

        let engine = AuthorizationEngine::new(
            fixture.clone(),
            fixture.clone(),
            Cache::new(Arc::new(MapCache::default())),
            CacheTtlConfig::default(),
        );
        (engine, fixture, user_id, role_id)
    }

    #[tokio::test]
    async fn test_effective_permissions_union() {
        let (engine, _fixture, user_id, _role_id) = engine_with_user().await;
        let permissions = engine.effective_permissions(user_id).await.unwrap();

        let kinds: HashSet<String> = permissions.iter().map(Permission::key).collect();
        assert_eq!(kinds.len(), 2);
        assert!(kinds.contains("report:read"));
        assert!(kinds.contains("audit-log:read"));
    }

    #[tokio::test]
    async fn test_has_permission_exact_match() {
        let (engine, _fixture, user_id, _role_id) = engine_with_user().await;

        assert!(engine.has_permission(user_id, "report", "read").await.unwrap());
        assert!(!engine.has_permission(user_id, "report", "delete").await.unwrap());
        // Case-sensitive.
        assert!(!engine.has_permission(user_id, "Report", "read").await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_user_is_not_found() {
        let (engine, _fixture, _user_id, _role_id) = engine_with_user().await;
        let err = engine.effective_permissions(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AuthError::UserNotFound { .. }));
    }

    #[tokio::test]
    async fn test_revocation_with_warm_cache() {
        let (engine, fixture, user_id, role_id) = engine_with_user().await;

        // Warm both cache tiers.
        assert!(engine.has_permission(user_id, "report", "read").await.unwrap());

        // Revoke the sole granting role and invalidate as a mutating
        // handler would.
        let mut user = UserStorage::find_by_id(fixture.as_ref(), user_id)
            .await
            .unwrap()
            .unwrap();
        user.roles.retain(|id| *id != role_id);
        UserStorage::update(fixture.as_ref(), &user).await.unwrap();
        engine.invalidate_user(user_id).await;

        assert!(!engine.has_permission(user_id, "report", "read").await.unwrap());
    }

    #[tokio::test]
    async fn test_role_mutation_invalidates_conservatively() {
        let (engine, fixture, user_id, role_id) = engine_with_user().await;
        assert!(engine.has_permission(user_id, "report", "read").await.unwrap());

        // Strip the permission from the role itself.
        let mut role = RoleStorage::find_by_id(fixture.as_ref(), role_id)
            .await
            .unwrap()
            .unwrap();
        role.permissions.retain(|p| !p.matches("report", "read"));
        RoleStorage::update(fixture.as_ref(), &role).await.unwrap();
        engine.invalidate_role(role_id).await;

        assert!(!engine.has_permission(user_id, "report", "read").await.unwrap());
        assert!(engine.has_permission(user_id, "audit-log", "read").await.unwrap());
    }

    #[tokio::test]
    async fn test_dangling_role_assignment_grants_nothing() {
        let (engine, fixture, user_id, role_id) = engine_with_user().await;
        RoleStorage::delete(fixture.as_ref(), role_id).await.unwrap();
        engine.invalidate_role(role_id).await;

        let permissions = engine.effective_permissions(user_id).await.unwrap();
        assert!(permissions.is_empty());
    }
}
