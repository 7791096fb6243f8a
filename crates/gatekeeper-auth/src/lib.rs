//! # gatekeeper-auth
//!
//! Authentication and authorization core for multi-tenant services.
//!
//! This crate provides:
//! - A typed command/query dispatcher, the sole entry point for adapters
//! - Session and token lifecycle (signed pairs, hash-addressed sessions,
//!   rotation on refresh)
//! - RBAC authorization with cache-backed permission checks
//! - Fixed-window rate limiting (fail-open on infrastructure errors)
//! - Deterministic username generation with collision resolution
//! - A read-through, write-invalidate cache discipline over a pluggable
//!   key-value store
//!
//! ## Overview
//!
//! The core is independent of any HTTP framework: adapters construct
//! [`handlers::AuthCore`] over their storage backends, build a
//! [`dispatch::Dispatcher`] once at startup via
//! [`handlers::build_dispatcher`], and submit commands and queries through
//! [`dispatch::Dispatcher::send`]. Nothing else is part of the contract.
//!
//! ## Modules
//!
//! - [`config`] - Configuration for tokens, sessions, throttling, and caching
//! - [`dispatch`] - Command/query dispatcher
//! - [`session`] - Session and token lifecycle manager
//! - [`authz`] - RBAC authorization engine
//! - [`ratelimit`] - Fixed-window rate limiter
//! - [`username`] - Username generation engine
//! - [`cache`] - Cache store trait and read-through layer
//! - [`storage`] - Domain types and storage traits
//! - [`token`] - Token claims, signing, and pair issuance
//! - [`handlers`] - Handler registrations wiring the engines together

pub mod authz;
pub mod cache;
pub mod clock;
pub mod config;
pub mod credential;
pub mod dispatch;
pub mod error;
pub mod geo;
pub mod handlers;
pub mod ratelimit;
pub mod session;
pub mod storage;
pub mod token;
pub mod username;

pub use authz::AuthorizationEngine;
pub use cache::{Cache, CacheStore};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::AuthConfig;
pub use credential::{Argon2Verifier, CredentialVerifier};
pub use dispatch::{Command, CommandHandler, Dispatcher, DispatcherBuilder, Query, QueryHandler, Request};
pub use error::{AuthError, ErrorCategory};
pub use geo::{GeoLookup, NoopGeoLookup};
pub use handlers::{AuthCore, build_dispatcher};
pub use ratelimit::{RateIdentifier, RateLimiter};
pub use session::{AccessContext, ClientContext, InvalidationReason, SessionManager};
pub use storage::{
    Permission, Role, RoleStorage, Session, SessionStorage, TokenHashes, User, UserStorage,
};
pub use token::{JwtSigner, TokenClaims, TokenKind, TokenPair, TokenService};
pub use username::UsernameGenerator;

/// Type alias for authentication/authorization results.
pub type AuthResult<T> = Result<T, AuthError>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use gatekeeper_auth::prelude::*;
/// ```
pub mod prelude {
    pub use crate::AuthResult;
    pub use crate::config::AuthConfig;
    pub use crate::dispatch::{
        Command, CommandHandler, Dispatcher, DispatcherBuilder, Query, QueryHandler, Request,
    };
    pub use crate::error::{AuthError, ErrorCategory};
    pub use crate::handlers::{
        AssignRole, AuthCore, Authenticate, ChangePassword, CheckPermission, CleanupSessions,
        CreateRole, DeactivateUser, DeleteRole, GetEffectivePermissions, GetUserProfile,
        GrantPermission, InvalidateAllSessions, InvalidateSession, ListRoles, RefreshSession,
        RegisterUser, RevokePermission, RevokeRole, UserProfile, ValidateAccess, build_dispatcher,
    };
    pub use crate::session::{AccessContext, ClientContext, InvalidationReason};
    pub use crate::storage::{
        Permission, Role, RoleStorage, Session, SessionStorage, User, UserStorage,
    };
    pub use crate::token::TokenPair;
}
