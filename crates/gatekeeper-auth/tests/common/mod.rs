//! Shared fixture: a full core wired over the in-memory backend with a
//! controllable clock.

use std::sync::Arc;

use gatekeeper_auth::clock::FixedClock;
use gatekeeper_auth::credential::Argon2Verifier;
use gatekeeper_auth::dispatch::Dispatcher;
use gatekeeper_auth::geo::NoopGeoLookup;
use gatekeeper_auth::handlers::{AuthCore, build_dispatcher};
use gatekeeper_auth::AuthConfig;
use gatekeeper_auth_memory::{
    MemoryCacheStore, MemoryRoleStorage, MemorySessionStorage, MemoryUserStorage,
};
use time::{Duration, OffsetDateTime};

pub const TOKEN_SECRET: &[u8] = b"integration-test-signing-secret-0001";

pub struct TestCore {
    pub dispatcher: Dispatcher,
    pub clock: Arc<FixedClock>,
    pub cache: Arc<MemoryCacheStore>,
}

pub fn start_time() -> OffsetDateTime {
    OffsetDateTime::UNIX_EPOCH + Duration::days(20_000)
}

/// Best-effort tracing init so `RUST_LOG=debug cargo test` shows engine
/// events; repeated calls are fine.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn build() -> TestCore {
    init_tracing();
    let config = AuthConfig::default();
    let clock = Arc::new(FixedClock::new(start_time()));
    let cache = Arc::new(MemoryCacheStore::new());

    let core = Arc::new(AuthCore::new(
        Arc::new(MemoryUserStorage::new()),
        Arc::new(MemoryRoleStorage::new()),
        Arc::new(MemorySessionStorage::new()),
        cache.clone(),
        Arc::new(Argon2Verifier::new()),
        Arc::new(NoopGeoLookup),
        clock.clone(),
        TOKEN_SECRET,
        config,
    ));
    let dispatcher = build_dispatcher(core).expect("handler registration is unique");

    TestCore {
        dispatcher,
        clock,
        cache,
    }
}
