//! JWT encoding, decoding, and claim validation.
//!
//! Tokens are signed with HS256 over a configured secret. Expiry is checked
//! against the injectable [`Clock`](crate::clock::Clock) rather than the
//! library's wall-clock validation, so lifecycle behavior is fully testable;
//! the signature check stays with `jsonwebtoken`.

use std::fmt;

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::AuthResult;
use crate::error::AuthError;

// ============================================================================
// Token Kind
// ============================================================================

/// Discriminates the two halves of a token pair.
///
/// A refresh token presented where an access token is expected (or vice
/// versa) fails validation closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    /// Short-lived, carried per-request.
    Access,
    /// Longer-lived, used only to mint new pairs.
    Refresh,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Access => write!(f, "access"),
            Self::Refresh => write!(f, "refresh"),
        }
    }
}

// ============================================================================
// Claims
// ============================================================================

/// Claims carried by every Gatekeeper token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Issuer.
    pub iss: String,

    /// Subject: the user id.
    pub sub: Uuid,

    /// Expiry as a unix timestamp.
    pub exp: i64,

    /// Issued-at as a unix timestamp.
    pub iat: i64,

    /// Unique token id.
    pub jti: Uuid,

    /// Which half of the pair this token is.
    pub kind: TokenKind,

    /// Names of the roles assigned to the subject at issuance.
    #[serde(default)]
    pub roles: Vec<String>,
}

impl TokenClaims {
    /// Returns `true` if the token has expired at the given instant.
    #[must_use]
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        now.unix_timestamp() >= self.exp
    }
}

// ============================================================================
// Signer
// ============================================================================

/// Signs and verifies Gatekeeper tokens.
pub struct JwtSigner {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
}

impl JwtSigner {
    /// Creates a signer over an HS256 secret.
    #[must_use]
    pub fn new(secret: &[u8], issuer: impl Into<String>) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            issuer: issuer.into(),
        }
    }

    /// The issuer embedded in and required of every token.
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Encodes claims into a signed token.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if encoding fails; this is a malfunction, not a
    /// caller error.
    pub fn encode(&self, claims: &TokenClaims) -> AuthResult<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| AuthError::internal(format!("Failed to encode token: {e}")))
    }

    /// Decodes a token, checking signature, issuer, expiry, and kind.
    ///
    /// Expiry is compared against the supplied instant so callers can
    /// inject their clock. Every failure maps to `InvalidToken`: expired,
    /// malformed, and forged tokens are indistinguishable to callers.
    ///
    /// # Errors
    ///
    /// Returns `InvalidToken` on any validation failure.
    pub fn decode(
        &self,
        token: &str,
        expected_kind: TokenKind,
        now: OffsetDateTime,
    ) -> AuthResult<TokenClaims> {
        // Expiry is validated manually below against the injected clock;
        // audience is not part of the claim set.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let data = decode::<TokenClaims>(token, &self.decoding_key, &validation)
            .map_err(|e| AuthError::invalid_token(e.to_string()))?;
        let claims = data.claims;

        if claims.iss != self.issuer {
            return Err(AuthError::invalid_token("issuer mismatch"));
        }
        if claims.is_expired(now) {
            return Err(AuthError::invalid_token("token expired"));
        }
        if claims.kind != expected_kind {
            return Err(AuthError::invalid_token(format!(
                "expected {expected_kind} token"
            )));
        }

        Ok(claims)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    fn signer() -> JwtSigner {
        JwtSigner::new(b"test-secret-at-least-32-bytes-long!", "gatekeeper-test")
    }

    fn claims(kind: TokenKind, now: OffsetDateTime) -> TokenClaims {
        TokenClaims {
            iss: "gatekeeper-test".to_string(),
            sub: Uuid::new_v4(),
            exp: (now + Duration::minutes(15)).unix_timestamp(),
            iat: now.unix_timestamp(),
            jti: Uuid::new_v4(),
            kind,
            roles: vec!["auditor".to_string()],
        }
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let signer = signer();
        let now = OffsetDateTime::UNIX_EPOCH + Duration::days(20_000);
        let claims = claims(TokenKind::Access, now);

        let token = signer.encode(&claims).unwrap();
        let decoded = signer.decode(&token, TokenKind::Access, now).unwrap();

        assert_eq!(decoded.sub, claims.sub);
        assert_eq!(decoded.jti, claims.jti);
        assert_eq!(decoded.roles, vec!["auditor"]);
    }

    #[test]
    fn test_expired_token_fails_closed() {
        let signer = signer();
        let now = OffsetDateTime::UNIX_EPOCH + Duration::days(20_000);
        let claims = claims(TokenKind::Access, now);
        let token = signer.encode(&claims).unwrap();

        let later = now + Duration::minutes(16);
        let err = signer.decode(&token, TokenKind::Access, later).unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken { .. }));
    }

    #[test]
    fn test_wrong_kind_fails_closed() {
        let signer = signer();
        let now = OffsetDateTime::UNIX_EPOCH + Duration::days(20_000);
        let token = signer.encode(&claims(TokenKind::Refresh, now)).unwrap();

        let err = signer.decode(&token, TokenKind::Access, now).unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken { .. }));
    }

    #[test]
    fn test_wrong_issuer_fails_closed() {
        let now = OffsetDateTime::UNIX_EPOCH + Duration::days(20_000);
        let mut bad = claims(TokenKind::Access, now);
        bad.iss = "intruder".to_string();
        let token = signer().encode(&bad).unwrap();

        let err = signer().decode(&token, TokenKind::Access, now).unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken { .. }));
    }

    #[test]
    fn test_forged_signature_fails_closed() {
        let now = OffsetDateTime::UNIX_EPOCH + Duration::days(20_000);
        let forger = JwtSigner::new(b"a-completely-different-secret-value", "gatekeeper-test");
        let token = forger.encode(&claims(TokenKind::Access, now)).unwrap();

        let err = signer().decode(&token, TokenKind::Access, now).unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken { .. }));
    }

    #[test]
    fn test_garbage_fails_closed() {
        let now = OffsetDateTime::UNIX_EPOCH;
        let err = signer()
            .decode("not.a.token", TokenKind::Access, now)
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken { .. }));
    }
}
