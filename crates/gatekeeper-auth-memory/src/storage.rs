//! In-memory user, role, and session storage.

use async_trait::async_trait;
use dashmap::DashMap;
use time::OffsetDateTime;
use uuid::Uuid;

use gatekeeper_auth::AuthResult;
use gatekeeper_auth::error::AuthError;
use gatekeeper_auth::storage::{
    Role, RoleStorage, Session, SessionStorage, TokenHashes, User, UserStorage,
};

// =============================================================================
// Users
// =============================================================================

/// DashMap-backed user storage.
///
/// Username and email uniqueness are enforced through case-folded index
/// maps; claiming an index entry is the commit point, so two concurrent
/// creates with the same handle cannot both succeed.
#[derive(Default)]
pub struct MemoryUserStorage {
    users: DashMap<Uuid, User>,
    by_username: DashMap<String, Uuid>,
    by_email: DashMap<String, Uuid>,
}

impl MemoryUserStorage {
    /// Creates an empty user storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn claim(
        index: &DashMap<String, Uuid>,
        key: String,
        user_id: Uuid,
        what: &str,
    ) -> AuthResult<()> {
        match index.entry(key) {
            dashmap::mapref::entry::Entry::Occupied(entry) if *entry.get() != user_id => {
                Err(AuthError::already_exists(what))
            }
            dashmap::mapref::entry::Entry::Occupied(_) => Ok(()),
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                entry.insert(user_id);
                Ok(())
            }
        }
    }
}

#[async_trait]
impl UserStorage for MemoryUserStorage {
    async fn find_by_id(&self, user_id: Uuid) -> AuthResult<Option<User>> {
        Ok(self.users.get(&user_id).map(|user| user.value().clone()))
    }

    async fn find_by_username(&self, username: &str) -> AuthResult<Option<User>> {
        let folded = username.to_lowercase();
        Ok(self
            .by_username
            .get(&folded)
            .and_then(|id| self.users.get(&id).map(|user| user.value().clone())))
    }

    async fn find_by_email(&self, email: &str) -> AuthResult<Option<User>> {
        let folded = email.to_lowercase();
        Ok(self
            .by_email
            .get(&folded)
            .and_then(|id| self.users.get(&id).map(|user| user.value().clone())))
    }

    async fn username_exists(&self, username: &str) -> AuthResult<bool> {
        Ok(self.by_username.contains_key(&username.to_lowercase()))
    }

    async fn create(&self, user: &User) -> AuthResult<()> {
        let username_key = user.username.to_lowercase();
        let email_key = user.email.to_lowercase();

        Self::claim(&self.by_username, username_key.clone(), user.id, "username")?;
        if let Err(err) = Self::claim(&self.by_email, email_key, user.id, "email") {
            // Roll back the username claim so the failed create leaves
            // nothing behind.
            self.by_username.remove(&username_key);
            return Err(err);
        }

        self.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn update(&self, user: &User) -> AuthResult<()> {
        let Some(existing) = self.users.get(&user.id).map(|u| u.value().clone()) else {
            return Err(AuthError::user_not_found(user.id));
        };

        let old_username = existing.username.to_lowercase();
        let new_username = user.username.to_lowercase();
        if old_username != new_username {
            Self::claim(&self.by_username, new_username, user.id, "username")?;
            self.by_username.remove(&old_username);
        }

        let old_email = existing.email.to_lowercase();
        let new_email = user.email.to_lowercase();
        if old_email != new_email {
            Self::claim(&self.by_email, new_email, user.id, "email")?;
            self.by_email.remove(&old_email);
        }

        self.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn deactivate(&self, user_id: Uuid) -> AuthResult<()> {
        match self.users.get_mut(&user_id) {
            Some(mut user) => {
                user.active = false;
                Ok(())
            }
            None => Err(AuthError::user_not_found(user_id)),
        }
    }

    async fn list(&self, limit: i64, offset: i64) -> AuthResult<Vec<User>> {
        let mut users: Vec<User> = self.users.iter().map(|entry| entry.value().clone()).collect();
        users.sort_by_key(|user| user.created_at);
        Ok(users
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn count(&self) -> AuthResult<i64> {
        Ok(self.users.len() as i64)
    }
}

// =============================================================================
// Roles
// =============================================================================

/// DashMap-backed role storage with a unique name index.
#[derive(Default)]
pub struct MemoryRoleStorage {
    roles: DashMap<Uuid, Role>,
    by_name: DashMap<String, Uuid>,
}

impl MemoryRoleStorage {
    /// Creates an empty role storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RoleStorage for MemoryRoleStorage {
    async fn find_by_id(&self, role_id: Uuid) -> AuthResult<Option<Role>> {
        Ok(self.roles.get(&role_id).map(|role| role.value().clone()))
    }

    async fn find_by_name(&self, name: &str) -> AuthResult<Option<Role>> {
        Ok(self
            .by_name
            .get(name)
            .and_then(|id| self.roles.get(&id).map(|role| role.value().clone())))
    }

    async fn create(&self, role: &Role) -> AuthResult<()> {
        match self.by_name.entry(role.name.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(AuthError::already_exists("role name"))
            }
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                entry.insert(role.id);
                self.roles.insert(role.id, role.clone());
                Ok(())
            }
        }
    }

    async fn update(&self, role: &Role) -> AuthResult<()> {
        let Some(existing) = self.roles.get(&role.id).map(|r| r.value().clone()) else {
            return Err(AuthError::role_not_found(role.id));
        };

        if existing.name != role.name {
            match self.by_name.entry(role.name.clone()) {
                dashmap::mapref::entry::Entry::Occupied(_) => {
                    return Err(AuthError::already_exists("role name"));
                }
                dashmap::mapref::entry::Entry::Vacant(entry) => {
                    entry.insert(role.id);
                }
            }
            self.by_name.remove(&existing.name);
        }

        self.roles.insert(role.id, role.clone());
        Ok(())
    }

    async fn delete(&self, role_id: Uuid) -> AuthResult<()> {
        let Some((_, role)) = self.roles.remove(&role_id) else {
            return Err(AuthError::role_not_found(role_id));
        };
        self.by_name.remove(&role.name);
        Ok(())
    }

    async fn list(&self, limit: i64, offset: i64) -> AuthResult<Vec<Role>> {
        let mut roles: Vec<Role> = self.roles.iter().map(|entry| entry.value().clone()).collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn count(&self) -> AuthResult<i64> {
        Ok(self.roles.len() as i64)
    }
}

// =============================================================================
// Sessions
// =============================================================================

/// DashMap-backed session storage with token-hash indexes.
///
/// The refresh-hash index entry is the rotation commit point: a conditional
/// `remove_if` claims it atomically, so concurrent rotations of one token
/// resolve to exactly one winner.
#[derive(Default)]
pub struct MemorySessionStorage {
    sessions: DashMap<Uuid, Session>,
    by_access: DashMap<String, Uuid>,
    by_refresh: DashMap<String, Uuid>,
}

impl MemorySessionStorage {
    /// Creates an empty session storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStorage for MemorySessionStorage {
    async fn create(&self, session: &Session) -> AuthResult<()> {
        if self.by_access.contains_key(&session.access_token_hash)
            || self.by_refresh.contains_key(&session.refresh_token_hash)
        {
            return Err(AuthError::storage("token hash already addressed"));
        }
        self.by_access
            .insert(session.access_token_hash.clone(), session.id);
        self.by_refresh
            .insert(session.refresh_token_hash.clone(), session.id);
        self.sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn find_by_id(&self, session_id: Uuid) -> AuthResult<Option<Session>> {
        Ok(self.sessions.get(&session_id).map(|s| s.value().clone()))
    }

    async fn find_by_access_hash(&self, hash: &str) -> AuthResult<Option<Session>> {
        Ok(self
            .by_access
            .get(hash)
            .and_then(|id| self.sessions.get(&id).map(|s| s.value().clone())))
    }

    async fn find_by_refresh_hash(&self, hash: &str) -> AuthResult<Option<Session>> {
        Ok(self
            .by_refresh
            .get(hash)
            .and_then(|id| self.sessions.get(&id).map(|s| s.value().clone())))
    }

    async fn rotate(
        &self,
        old_refresh_hash: &str,
        new_hashes: &TokenHashes,
        expires_at: OffsetDateTime,
        now: OffsetDateTime,
    ) -> AuthResult<bool> {
        // Claim the old index entry; losing racers see a missing key and
        // report the lost race to the caller.
        let claimed = self.by_refresh.remove_if(old_refresh_hash, |_, session_id| {
            self.sessions
                .get(session_id)
                .map(|session| session.is_valid(now))
                .unwrap_or(false)
        });
        let Some((_, session_id)) = claimed else {
            return Ok(false);
        };

        let Some(mut session) = self.sessions.get_mut(&session_id) else {
            return Ok(false);
        };
        self.by_access.remove(&session.access_token_hash);

        session.access_token_hash = new_hashes.access_token_hash.clone();
        session.refresh_token_hash = new_hashes.refresh_token_hash.clone();
        session.expires_at = expires_at;
        session.last_used_at = now;

        self.by_access
            .insert(new_hashes.access_token_hash.clone(), session_id);
        self.by_refresh
            .insert(new_hashes.refresh_token_hash.clone(), session_id);
        Ok(true)
    }

    async fn invalidate(&self, session_id: Uuid) -> AuthResult<()> {
        // Idempotent: an unknown or already-inactive session is fine.
        if let Some(mut session) = self.sessions.get_mut(&session_id) {
            session.active = false;
        }
        Ok(())
    }

    async fn invalidate_all_for_user(&self, user_id: Uuid) -> AuthResult<u64> {
        let mut count = 0;
        for mut entry in self.sessions.iter_mut() {
            if entry.user_id == user_id && entry.active {
                entry.active = false;
                count += 1;
            }
        }
        Ok(count)
    }

    async fn touch(&self, session_id: Uuid, at: OffsetDateTime) -> AuthResult<()> {
        if let Some(mut session) = self.sessions.get_mut(&session_id) {
            session.last_used_at = at;
        }
        Ok(())
    }

    async fn cleanup(
        &self,
        expired_before: OffsetDateTime,
        inactive_before: OffsetDateTime,
    ) -> AuthResult<u64> {
        let doomed: Vec<Uuid> = self
            .sessions
            .iter()
            .filter(|session| {
                session.expires_at <= expired_before
                    || (!session.active && session.last_used_at <= inactive_before)
            })
            .map(|session| session.id)
            .collect();

        let mut count = 0;
        for session_id in doomed {
            if let Some((_, session)) = self.sessions.remove(&session_id) {
                self.by_access.remove(&session.access_token_hash);
                self.by_refresh.remove(&session.refresh_token_hash);
                count += 1;
            }
        }
        Ok(count)
    }
}

// =============================================================================
// Tests
// =============================================================================
