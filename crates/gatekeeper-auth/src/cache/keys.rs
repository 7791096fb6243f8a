//! Cache key builders.
//!
//! Every cache key used by the core is built here so that the invalidation
//! patterns in mutating handlers stay in one place. Key layout:
//!
//! ```text
//! authz:user:{user_id}:permissions          effective permission set
//! authz:user:{user_id}:perm:{res}:{action}  single permission check
//! authz:role:{role_id}                      single role
//! authz:roles:list:{limit}:{offset}         role list page
//! user:{user_id}:profile                    user profile projection
//! username:exists:{folded}                  username existence lookup
//! ratelimit:{identifier}:{endpoint}:{window_start}
//! ```

use uuid::Uuid;

/// Key for a user's effective permission set.
#[must_use]
pub fn user_permissions(user_id: Uuid) -> String {
    format!("authz:user:{user_id}:permissions")
}

/// Key for a single (user, resource, action) permission check.
#[must_use]
pub fn permission_check(user_id: Uuid, resource: &str, action: &str) -> String {
    format!("authz:user:{user_id}:perm:{resource}:{action}")
}

/// Pattern matching every authorization entry for a single user.
#[must_use]
pub fn user_authz_pattern(user_id: Uuid) -> String {
    format!("authz:user:{user_id}:*")
}

/// Pattern matching every per-user authorization entry.
///
/// Role mutations invalidate this conservatively: role membership cannot be
/// cheaply reverse-indexed in the cache, so correctness wins over hit rate.
#[must_use]
pub fn all_users_authz_pattern() -> &'static str {
    "authz:user:*"
}

/// Key for a single role.
#[must_use]
pub fn role(role_id: Uuid) -> String {
    format!("authz:role:{role_id}")
}

/// Key for one page of the role list.
#[must_use]
pub fn role_list_page(limit: i64, offset: i64) -> String {
    format!("authz:roles:list:{limit}:{offset}")
}

/// Pattern matching every cached role list page.
#[must_use]
pub fn role_list_pattern() -> &'static str {
    "authz:roles:list:*"
}

/// Key for a cached user profile.
#[must_use]
pub fn user_profile(user_id: Uuid) -> String {
    format!("user:{user_id}:profile")
}

/// Key for a case-folded username existence lookup.
#[must_use]
pub fn username_exists(folded: &str) -> String {
    format!("username:exists:{folded}")
}

/// Key for a fixed rate-limit window counter.
#[must_use]
pub fn rate_limit(identifier: &str, endpoint: &str, window_start: i64) -> String {
    format!("ratelimit:{identifier}:{endpoint}:{window_start}")
}
