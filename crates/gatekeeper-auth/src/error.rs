//! Authentication and authorization error types.
//!
//! This module defines all error types that can occur during authentication
//! and authorization operations.

use std::fmt;

use uuid::Uuid;

/// Errors that can occur during authentication and authorization operations.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The credentials are wrong or the account is inactive.
    ///
    /// Deliberately carries no detail: callers must not be able to tell
    /// which check failed (user enumeration).
    #[error("Authentication failed")]
    AuthenticationFailed,

    /// The token failed signature, expiry, or hash-lookup validation.
    #[error("Invalid token: {message}")]
    InvalidToken {
        /// Description of why the token is invalid.
        message: String,
    },

    /// The referenced user does not exist.
    #[error("User not found: {id}")]
    UserNotFound {
        /// The user ID that was not found.
        id: Uuid,
    },

    /// The referenced role does not exist.
    #[error("Role not found: {id}")]
    RoleNotFound {
        /// The role ID that was not found.
        id: Uuid,
    },

    /// A unique field (email, username, role name) is already taken.
    #[error("Already exists: {what}")]
    AlreadyExists {
        /// Description of the conflicting field.
        what: String,
    },

    /// A name normalized to nothing usable.
    #[error("Invalid name: {message}")]
    InvalidName {
        /// Description of the normalization failure.
        message: String,
    },

    /// The username engine exhausted its collision attempt budget.
    #[error("Username generation failed after {attempts} attempts")]
    UsernameGenerationFailed {
        /// How many attempts were made before giving up.
        attempts: u32,
    },

    /// Malformed input rejected before reaching a handler.
    #[error("Validation error: {message}")]
    Validation {
        /// Description of the validation failure.
        message: String,
    },

    /// The caller exceeded the attempt budget for an endpoint.
    ///
    /// Distinct from `AuthenticationFailed` so adapters can answer with a
    /// retry-later signal instead of a credentials error.
    #[error("Rate limited: {endpoint}")]
    RateLimited {
        /// The throttled endpoint.
        endpoint: String,
    },

    /// An error occurred while storing or retrieving data.
    #[error("Storage error: {message}")]
    Storage {
        /// Description of the storage error.
        message: String,
    },

    /// The dispatcher or engine configuration is invalid.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },

    /// An unexpected internal error occurred.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl AuthError {
    /// Creates a new `InvalidToken` error.
    #[must_use]
    pub fn invalid_token(message: impl Into<String>) -> Self {
        Self::InvalidToken {
            message: message.into(),
        }
    }

    /// Creates a new `UserNotFound` error.
    #[must_use]
    pub fn user_not_found(id: Uuid) -> Self {
        Self::UserNotFound { id }
    }

    /// Creates a new `RoleNotFound` error.
    #[must_use]
    pub fn role_not_found(id: Uuid) -> Self {
        Self::RoleNotFound { id }
    }

    /// Creates a new `AlreadyExists` error.
    #[must_use]
    pub fn already_exists(what: impl Into<String>) -> Self {
        Self::AlreadyExists { what: what.into() }
    }

    /// Creates a new `InvalidName` error.
    #[must_use]
    pub fn invalid_name(message: impl Into<String>) -> Self {
        Self::InvalidName {
            message: message.into(),
        }
    }

    /// Creates a new `Validation` error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates a new `RateLimited` error.
    #[must_use]
    pub fn rate_limited(endpoint: impl Into<String>) -> Self {
        Self::RateLimited {
            endpoint: endpoint.into(),
        }
    }

    /// Creates a new `Storage` error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a client error ("your request was invalid
    /// or denied").
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::AuthenticationFailed
                | Self::InvalidToken { .. }
                | Self::UserNotFound { .. }
                | Self::RoleNotFound { .. }
                | Self::AlreadyExists { .. }
                | Self::InvalidName { .. }
                | Self::UsernameGenerationFailed { .. }
                | Self::Validation { .. }
                | Self::RateLimited { .. }
        )
    }

    /// Returns `true` if this is a server error ("the system malfunctioned").
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::Storage { .. } | Self::Configuration { .. } | Self::Internal { .. }
        )
    }

    /// Returns the error category for logging/monitoring purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::AuthenticationFailed => ErrorCategory::Authentication,
            Self::InvalidToken { .. } => ErrorCategory::Token,
            Self::UserNotFound { .. } | Self::RoleNotFound { .. } | Self::AlreadyExists { .. } => {
                ErrorCategory::Domain
            }
            Self::InvalidName { .. } | Self::UsernameGenerationFailed { .. } => {
                ErrorCategory::UsernameGeneration
            }
            Self::Validation { .. } => ErrorCategory::Validation,
            Self::RateLimited { .. } => ErrorCategory::Throttling,
            Self::Storage { .. } => ErrorCategory::Infrastructure,
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }
}

/// Categories of authentication/authorization errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Identity verification errors.
    Authentication,
    /// Token validation errors.
    Token,
    /// Domain entity errors (missing or conflicting entities).
    Domain,
    /// Username generation errors.
    UsernameGeneration,
    /// Request validation errors.
    Validation,
    /// Rate limiting denials.
    Throttling,
    /// Infrastructure/storage errors.
    Infrastructure,
    /// Configuration errors.
    Configuration,
    /// Internal server errors.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Authentication => write!(f, "authentication"),
            Self::Token => write!(f, "token"),
            Self::Domain => write!(f, "domain"),
            Self::UsernameGeneration => write!(f, "username_generation"),
            Self::Validation => write!(f, "validation"),
            Self::Throttling => write!(f, "throttling"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Configuration => write!(f, "configuration"),
            Self::Internal => write!(f, "internal"),
        }
    }
}
