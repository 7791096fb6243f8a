//! Storage traits for authentication and authorization data.
//!
//! This module defines the persistence interfaces the core requires:
//!
//! - Users and their role assignments
//! - Roles and permissions
//! - Sessions (token-hash addressed)
//!
//! Domain types live beside the traits that persist them. Implementations
//! are provided by backend crates; `gatekeeper-auth-memory` ships the
//! in-memory reference backend used by the test suite.

pub mod role;
pub mod session;
pub mod user;

pub use role::{Permission, Role, RoleStorage};
pub use session::{Session, SessionStorage, TokenHashes};
pub use user::{User, UserStorage};
