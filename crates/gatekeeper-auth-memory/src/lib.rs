//! In-memory storage and cache backends for Gatekeeper.
//!
//! This crate implements the `gatekeeper-auth` storage traits over
//! `DashMap` for development and testing. It is also the reference
//! semantics for durable backends: uniqueness, conditional rotation, and
//! TTL behavior here define what a SQL or Redis adapter must reproduce.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use gatekeeper_auth::{Argon2Verifier, AuthConfig, NoopGeoLookup, SystemClock};
//! use gatekeeper_auth::handlers::{AuthCore, build_dispatcher};
//! use gatekeeper_auth_memory::{
//!     MemoryCacheStore, MemoryRoleStorage, MemorySessionStorage, MemoryUserStorage,
//! };
//!
//! let core = Arc::new(AuthCore::new(
//!     Arc::new(MemoryUserStorage::new()),
//!     Arc::new(MemoryRoleStorage::new()),
//!     Arc::new(MemorySessionStorage::new()),
//!     Arc::new(MemoryCacheStore::new()),
//!     Arc::new(Argon2Verifier::new()),
//!     Arc::new(NoopGeoLookup),
//!     Arc::new(SystemClock),
//!     b"a-32-byte-minimum-signing-secret!",
//!     AuthConfig::default(),
//! ));
//! let dispatcher = build_dispatcher(core)?;
//! ```

mod cache;
mod storage;

pub use cache::MemoryCacheStore;
pub use storage::{MemoryRoleStorage, MemorySessionStorage, MemoryUserStorage};
