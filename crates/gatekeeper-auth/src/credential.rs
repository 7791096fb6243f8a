//! Pluggable credential hashing and verification.
//!
//! The core never sees plaintext secrets beyond the verify call: storage
//! holds only the one-way hash produced here.

use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};

use crate::AuthResult;
use crate::error::AuthError;

/// One-way hash and constant-time verification of a secret.
///
/// Implementations must be safe to call concurrently and must not leak
/// timing information about how far verification progressed.
pub trait CredentialVerifier: Send + Sync {
    /// Hashes a plaintext secret for storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the hashing primitive fails.
    fn hash(&self, secret: &str) -> AuthResult<String>;

    /// Verifies a plaintext secret against a stored hash.
    ///
    /// Returns `Ok(false)` on mismatch; `Err` only on malformed hashes or
    /// primitive failure.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored hash cannot be parsed.
    fn verify(&self, secret: &str, hash: &str) -> AuthResult<bool>;
}

/// Argon2id credential verifier, the default implementation.
#[derive(Clone, Default)]
pub struct Argon2Verifier {
    argon2: Argon2<'static>,
}

impl Argon2Verifier {
    /// Creates a verifier with the default Argon2id parameters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialVerifier for Argon2Verifier {
    fn hash(&self, secret: &str) -> AuthResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(secret.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AuthError::internal(format!("Failed to hash credential: {e}")))
    }

    fn verify(&self, secret: &str, hash: &str) -> AuthResult<bool> {
        let parsed = PasswordHash::new(hash)
            .map_err(|e| AuthError::internal(format!("Malformed credential hash: {e}")))?;
        match self.argon2.verify_password(secret.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(AuthError::internal(format!(
                "Credential verification failed: {e}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify_roundtrip() {
        let verifier = Argon2Verifier::new();
        let hash = verifier.hash("correct horse battery staple").unwrap();

        assert!(verifier.verify("correct horse battery staple", &hash).unwrap());
        assert!(!verifier.verify("incorrect horse", &hash).unwrap());
    }

    #[test]
    fn test_hashes_are_salted() {
        let verifier = Argon2Verifier::new();
        let a = verifier.hash("secret").unwrap();
        let b = verifier.hash("secret").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_malformed_hash_is_an_error() {
        let verifier = Argon2Verifier::new();
        assert!(verifier.verify("secret", "not-a-phc-string").is_err());
    }
}
