//! Token issuance and validation.
//!
//! Tokens are signed JWTs carrying subject id, issued-at, expiry, and
//! embedded role claims. The raw tokens travel to clients; the core
//! persists only their SHA-256 hashes (see [`crate::storage::session`]).

pub mod jwt;
pub mod service;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub use jwt::{JwtSigner, TokenClaims, TokenKind};
pub use service::{IssuedTokens, TokenService};

/// An access/refresh token pair as returned to clients.
///
/// The access token is short-lived and carried per-request; the refresh
/// token is longer-lived and only used to mint new pairs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    /// The signed access token.
    pub access_token: String,

    /// The signed refresh token.
    pub refresh_token: String,
}

/// Hash a token value using SHA-256.
///
/// Used both when storing new session hashes and when looking up sessions
/// for validation; raw tokens are never persisted.
#[must_use]
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_token() {
        let hash = hash_token("some-token-value");

        // SHA-256 produces 64 hex characters.
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, hash_token("some-token-value"));
        assert_ne!(hash, hash_token("another-token-value"));
    }
}
