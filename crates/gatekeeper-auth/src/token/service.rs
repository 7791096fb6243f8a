//! Token service: issues and validates access/refresh token pairs.
//!
//! This is a leaf engine: it depends only on the signer and the clock-free
//! claim types. Session bookkeeping lives in
//! [`crate::session::SessionManager`].

use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::AuthResult;
use crate::config::TokenConfig;
use crate::storage::TokenHashes;
use crate::token::jwt::{JwtSigner, TokenClaims, TokenKind};
use crate::token::{TokenPair, hash_token};

/// A freshly issued pair plus the bookkeeping the session layer needs.
#[derive(Debug, Clone)]
pub struct IssuedTokens {
    /// The raw pair, returned to the client and never persisted.
    pub pair: TokenPair,

    /// SHA-256 hashes of the pair, persisted on the session.
    pub hashes: TokenHashes,

    /// When the refresh token (and hence the session) expires.
    pub refresh_expires_at: OffsetDateTime,
}

/// Issues and validates signed token pairs.
pub struct TokenService {
    signer: JwtSigner,
    access_lifetime: Duration,
    refresh_lifetime: Duration,
}

impl TokenService {
    /// Creates a token service from a signer and lifetime configuration.
    #[must_use]
    pub fn new(signer: JwtSigner, config: &TokenConfig) -> Self {
        Self {
            signer,
            access_lifetime: Duration::seconds_f64(config.access_token_lifetime.as_secs_f64()),
            refresh_lifetime: Duration::seconds_f64(config.refresh_token_lifetime.as_secs_f64()),
        }
    }

    /// Issues a new access/refresh pair for a subject.
    ///
    /// Role names are embedded as claims in both tokens so adapters can make
    /// coarse decisions without a store round trip; authoritative checks go
    /// through the authorization engine.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if signing fails.
    pub fn issue_pair(
        &self,
        user_id: Uuid,
        roles: Vec<String>,
        now: OffsetDateTime,
    ) -> AuthResult<IssuedTokens> {
        let access = TokenClaims {
            iss: self.signer.issuer().to_string(),
            sub: user_id,
            exp: (now + self.access_lifetime).unix_timestamp(),
            iat: now.unix_timestamp(),
            jti: Uuid::new_v4(),
            kind: TokenKind::Access,
            roles: roles.clone(),
        };
        let refresh_expires_at = now + self.refresh_lifetime;
        let refresh = TokenClaims {
            iss: self.signer.issuer().to_string(),
            sub: user_id,
            exp: refresh_expires_at.unix_timestamp(),
            iat: now.unix_timestamp(),
            jti: Uuid::new_v4(),
            kind: TokenKind::Refresh,
            roles,
        };

        let access_token = self.signer.encode(&access)?;
        let refresh_token = self.signer.encode(&refresh)?;

        let hashes = TokenHashes {
            access_token_hash: hash_token(&access_token),
            refresh_token_hash: hash_token(&refresh_token),
        };

        Ok(IssuedTokens {
            pair: TokenPair {
                access_token,
                refresh_token,
            },
            hashes,
            refresh_expires_at,
        })
    }

    /// Validates a token of the expected kind, returning its claims.
    ///
    /// # Errors
    ///
    /// Returns `InvalidToken` on signature, issuer, expiry, or kind failure.
    pub fn verify(
        &self,
        token: &str,
        expected_kind: TokenKind,
        now: OffsetDateTime,
    ) -> AuthResult<TokenClaims> {
        self.signer.decode(token, expected_kind, now)
    }
}
