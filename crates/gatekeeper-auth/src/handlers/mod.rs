//! Command and query handlers.
//!
//! Every engine in the core is reachable only through the handlers
//! registered here. Mutating handlers own their cache invalidation lists;
//! `Authenticate` and `RegisterUser` consult the rate limiter before doing
//! any work.

pub mod auth;
pub mod roles;
pub mod users;

use std::sync::Arc;

use crate::AuthResult;
use crate::authz::AuthorizationEngine;
use crate::cache::{Cache, CacheStore};
use crate::clock::Clock;
use crate::config::AuthConfig;
use crate::credential::CredentialVerifier;
use crate::dispatch::Dispatcher;
use crate::geo::GeoLookup;
use crate::ratelimit::RateLimiter;
use crate::session::SessionManager;
use crate::storage::{RoleStorage, SessionStorage, UserStorage};
use crate::token::{JwtSigner, TokenService};
use crate::username::UsernameGenerator;

pub use auth::{
    Authenticate, CleanupSessions, InvalidateAllSessions, InvalidateSession, RefreshSession,
    ValidateAccess,
};
pub use roles::{
    AssignRole, CreateRole, DeleteRole, GrantPermission, ListRoles, RevokePermission, RevokeRole,
};
pub use users::{
    ChangePassword, CheckPermission, DeactivateUser, GetEffectivePermissions, GetUserProfile,
    RegisterUser, UserProfile,
};

/// The assembled engines, shared by every handler.
///
/// Built once during process initialization and passed by handle; adapters
/// talk only to the [`Dispatcher`].
pub struct AuthCore {
    pub(crate) users: Arc<dyn UserStorage>,
    pub(crate) roles: Arc<dyn RoleStorage>,
    pub(crate) cache: Cache,
    pub(crate) sessions: SessionManager,
    pub(crate) authz: AuthorizationEngine,
    pub(crate) rate_limiter: RateLimiter,
    pub(crate) usernames: UsernameGenerator,
    pub(crate) credentials: Arc<dyn CredentialVerifier>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) config: AuthConfig,
}

impl AuthCore {
    /// Wires the engines over the supplied backends.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        users: Arc<dyn UserStorage>,
        roles: Arc<dyn RoleStorage>,
        sessions: Arc<dyn SessionStorage>,
        cache_store: Arc<dyn CacheStore>,
        credentials: Arc<dyn CredentialVerifier>,
        geo: Arc<dyn GeoLookup>,
        clock: Arc<dyn Clock>,
        token_secret: &[u8],
        config: AuthConfig,
    ) -> Self {
        let cache = Cache::new(Arc::clone(&cache_store));
        let signer = JwtSigner::new(token_secret, config.issuer.clone());
        let token_service = TokenService::new(signer, &config.tokens);

        let session_manager = SessionManager::new(
            Arc::clone(&users),
            Arc::clone(&roles),
            sessions,
            token_service,
            Arc::clone(&credentials),
            geo,
            Arc::clone(&clock),
            config.sessions.clone(),
        );
        let authz = AuthorizationEngine::new(
            Arc::clone(&users),
            Arc::clone(&roles),
            cache.clone(),
            config.cache.clone(),
        );
        let rate_limiter = RateLimiter::new(Arc::clone(&cache_store), Arc::clone(&clock));
        let usernames = UsernameGenerator::new(
            Arc::clone(&users),
            cache.clone(),
            config.username.clone(),
            &config.cache,
        );

        Self {
            users,
            roles,
            cache,
            sessions: session_manager,
            authz,
            rate_limiter,
            usernames,
            credentials,
            clock,
            config,
        }
    }
}

/// Builds the dispatcher with every core handler registered.
///
/// # Errors
///
/// Returns `Configuration` if a handler type is registered twice, fatal at
/// startup.
pub fn build_dispatcher(core: Arc<AuthCore>) -> AuthResult<Dispatcher> {
    let mut builder = Dispatcher::builder();

    builder
        .register_command::<Authenticate, _>(auth::AuthenticateHandler::new(&core))?
        .register_command::<RefreshSession, _>(auth::RefreshSessionHandler::new(&core))?
        .register_command::<InvalidateSession, _>(auth::InvalidateSessionHandler::new(&core))?
        .register_command::<InvalidateAllSessions, _>(auth::InvalidateAllSessionsHandler::new(
            &core,
        ))?
        .register_command::<CleanupSessions, _>(auth::CleanupSessionsHandler::new(&core))?
        .register_query::<ValidateAccess, _>(auth::ValidateAccessHandler::new(&core))?
        .register_command::<RegisterUser, _>(users::RegisterUserHandler::new(&core))?
        .register_command::<ChangePassword, _>(users::ChangePasswordHandler::new(&core))?
        .register_command::<DeactivateUser, _>(users::DeactivateUserHandler::new(&core))?
        .register_query::<GetUserProfile, _>(users::GetUserProfileHandler::new(&core))?
        .register_query::<CheckPermission, _>(users::CheckPermissionHandler::new(&core))?
        .register_query::<GetEffectivePermissions, _>(users::GetEffectivePermissionsHandler::new(
            &core,
        ))?
        .register_command::<CreateRole, _>(roles::CreateRoleHandler::new(&core))?
        .register_command::<DeleteRole, _>(roles::DeleteRoleHandler::new(&core))?
        .register_command::<AssignRole, _>(roles::AssignRoleHandler::new(&core))?
        .register_command::<RevokeRole, _>(roles::RevokeRoleHandler::new(&core))?
        .register_command::<GrantPermission, _>(roles::GrantPermissionHandler::new(&core))?
        .register_command::<RevokePermission, _>(roles::RevokePermissionHandler::new(&core))?
        .register_query::<ListRoles, _>(roles::ListRolesHandler::new(&core))?;

    Ok(builder.build())
}
