//! Authentication and authorization configuration.
//!
//! This module provides the configuration types for the auth core, organized
//! into logical subsections: token issuance, session retention, rate
//! limiting, username generation, and cache TTLs.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root authentication and authorization configuration.
///
/// # Example (TOML)
///
/// ```toml
/// [auth]
/// issuer = "https://auth.example.com"
///
/// [auth.tokens]
/// access_token_lifetime = "15m"
/// refresh_token_lifetime = "30d"
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Token issuer (used in the `iss` claim and checked on validation).
    pub issuer: String,

    /// Token issuance configuration.
    pub tokens: TokenConfig,

    /// Session lifecycle configuration.
    pub sessions: SessionConfig,

    /// Rate limiting configuration.
    pub rate_limiting: RateLimitConfig,

    /// Username generation configuration.
    pub username: UsernameConfig,

    /// Cache TTL configuration.
    pub cache: CacheTtlConfig,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            issuer: "gatekeeper".to_string(),
            tokens: TokenConfig::default(),
            sessions: SessionConfig::default(),
            rate_limiting: RateLimitConfig::default(),
            username: UsernameConfig::default(),
            cache: CacheTtlConfig::default(),
        }
    }
}

/// Token issuance configuration.
///
/// Controls lifetimes of the access/refresh token pair. The access token is
/// short-lived and carried per-request; the refresh token is longer-lived
/// and only used to mint new pairs.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TokenConfig {
    /// Access token lifetime.
    /// Shorter lifetimes are more secure but require more frequent refresh.
    #[serde(with = "humantime_serde")]
    pub access_token_lifetime: Duration,

    /// Refresh token lifetime. Also bounds the session expiry.
    #[serde(with = "humantime_serde")]
    pub refresh_token_lifetime: Duration,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            access_token_lifetime: Duration::from_secs(15 * 60), // 15 minutes
            refresh_token_lifetime: Duration::from_secs(30 * 24 * 3600), // 30 days
        }
    }
}

/// Session lifecycle configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// How long inactive (explicitly invalidated) sessions are kept before
    /// the periodic cleanup sweep deletes them.
    #[serde(with = "humantime_serde")]
    pub inactive_retention: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            inactive_retention: Duration::from_secs(30 * 24 * 3600), // 30 days
        }
    }
}

/// Rate limiting configuration.
///
/// Per-endpoint window sizes and attempt budgets. The limiter fails open on
/// infrastructure errors; these values only bound well-behaved counting.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Failed authentication attempts per identifier per window.
    pub login_max_attempts: u32,

    /// Window for authentication attempts.
    #[serde(with = "humantime_serde")]
    pub login_window: Duration,

    /// Registrations per identifier per window.
    pub register_max_attempts: u32,

    /// Window for registration attempts.
    #[serde(with = "humantime_serde")]
    pub register_window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            login_max_attempts: 5,
            login_window: Duration::from_secs(300), // 5 minutes
            register_max_attempts: 10,
            register_window: Duration::from_secs(3600), // 1 hour
        }
    }
}

/// Username generation configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UsernameConfig {
    /// Minimum accepted username length.
    pub min_length: usize,

    /// Maximum accepted username length. Over-length base candidates are
    /// truncated proportionally.
    pub max_length: usize,

    /// Reserved words rejected case-insensitively as usernames.
    pub reserved: Vec<String>,

    /// Attempt budget for collision/reserved-word resolution before the
    /// engine gives up.
    pub max_attempts: u32,
}

impl Default for UsernameConfig {
    fn default() -> Self {
        Self {
            min_length: 3,
            max_length: 30,
            reserved: [
                "admin",
                "administrator",
                "root",
                "system",
                "support",
                "api",
                "null",
                "undefined",
            ]
            .iter()
            .map(ToString::to_string)
            .collect(),
            max_attempts: 100,
        }
    }
}

/// Cache TTL configuration.
///
/// TTLs are tiered by volatility: single permission checks expire fastest,
/// role list pages slowest. The cache is never the source of truth, so these
/// only bound staleness between a mutation and its explicit invalidation.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheTtlConfig {
    /// TTL for single permission-check entries.
    #[serde(with = "humantime_serde")]
    pub permission_check: Duration,

    /// TTL for per-user effective permission sets.
    #[serde(with = "humantime_serde")]
    pub user_permissions: Duration,

    /// TTL for cached user profiles.
    #[serde(with = "humantime_serde")]
    pub user_profile: Duration,

    /// TTL for single role entries.
    #[serde(with = "humantime_serde")]
    pub role: Duration,

    /// TTL for role list pages.
    #[serde(with = "humantime_serde")]
    pub role_list: Duration,

    /// TTL for username-existence lookups in the generation engine.
    #[serde(with = "humantime_serde")]
    pub username_lookup: Duration,
}

impl Default for CacheTtlConfig {
    fn default() -> Self {
        Self {
            permission_check: Duration::from_secs(5 * 60), // 5 minutes
            user_permissions: Duration::from_secs(10 * 60), // 10 minutes
            user_profile: Duration::from_secs(10 * 60),    // 10 minutes
            role: Duration::from_secs(15 * 60),            // 15 minutes
            role_list: Duration::from_secs(30 * 60),       // 30 minutes
            username_lookup: Duration::from_secs(5 * 60),  // 5 minutes
        }
    }
}
