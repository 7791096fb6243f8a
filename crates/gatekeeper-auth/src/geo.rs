//! Optional IP geolocation.
//!
//! Sessions are enriched with a country code when a lookup backend is
//! wired in. Lookup failures must never block authentication, so the trait
//! returns `Option` rather than `Result`.

use async_trait::async_trait;

/// IP address to country-code lookup.
#[async_trait]
pub trait GeoLookup: Send + Sync {
    /// Resolves an IP address to an ISO 3166-1 alpha-2 country code.
    ///
    /// Returns `None` when the address is unknown or the backend is
    /// unavailable; implementations log their own failures.
    async fn country(&self, ip: &str) -> Option<String>;
}

/// Lookup that always misses, for deployments without a geo backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopGeoLookup;

#[async_trait]
impl GeoLookup for NoopGeoLookup {
    async fn country(&self, _ip: &str) -> Option<String> {
        None
    }
}
