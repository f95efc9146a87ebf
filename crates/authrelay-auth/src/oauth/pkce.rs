//! PKCE (Proof Key for Code Exchange), RFC 7636, S256 only.
//!
//! The application is the OAuth client here: it generates the verifier,
//! sends only the derived challenge in the authorization request, and
//! reveals the verifier to the provider at token exchange time. The
//! provider proves possession without ever having seen the verifier during
//! authorization.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};

use super::nonce::random_urlsafe;

/// Errors that can occur validating PKCE values.
#[derive(Debug, thiserror::Error)]
pub enum PkceError {
    /// Verifier length is outside the RFC 7636 range (43-128 characters).
    #[error("Invalid verifier length: must be 43-128 characters, got {0}")]
    InvalidVerifierLength(usize),

    /// Verifier contains characters outside `[A-Za-z0-9-._~]`.
    #[error("Invalid verifier characters: must be URL-safe ([A-Za-z0-9-._~])")]
    InvalidVerifierCharacters,

    /// Verifier does not hash to the expected challenge.
    #[error("PKCE verification failed: verifier does not match challenge")]
    VerificationFailed,
}

/// PKCE code verifier.
///
/// A high-entropy random string that never leaves the server except inside
/// the token exchange request body. Stored in the session between the
/// redirect-out and the callback.
#[derive(Debug, Clone)]
pub struct PkceVerifier(String);

impl PkceVerifier {
    /// Create a verifier from a stored string, enforcing RFC 7636 length
    /// and character constraints.
    ///
    /// # Errors
    ///
    /// Returns an error if the length is not 43-128 characters or if any
    /// character falls outside `[A-Za-z0-9-._~]`.
    pub fn new(verifier: String) -> Result<Self, PkceError> {
        let len = verifier.len();
        if !(43..=128).contains(&len) {
            return Err(PkceError::InvalidVerifierLength(len));
        }

        if !verifier
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.' || c == '_' || c == '~')
        {
            return Err(PkceError::InvalidVerifierCharacters);
        }

        Ok(Self(verifier))
    }

    /// Generate a cryptographically random verifier (32 random bytes,
    /// base64url encoded, 43 characters).
    #[must_use]
    pub fn generate() -> Self {
        Self(random_urlsafe())
    }

    /// Get the verifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the verifier and return the inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl AsRef<str> for PkceVerifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// PKCE code challenge: `BASE64URL(SHA256(ASCII(code_verifier)))`.
///
/// This is the only PKCE value transmitted in the authorization request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkceChallenge(String);

impl PkceChallenge {
    /// Derive the S256 challenge from a verifier.
    ///
    /// Pure and deterministic: the same verifier always yields the same
    /// challenge.
    #[must_use]
    pub fn from_verifier(verifier: &PkceVerifier) -> Self {
        let digest = Sha256::digest(verifier.0.as_bytes());
        Self(URL_SAFE_NO_PAD.encode(digest))
    }

    /// Verify that a verifier hashes to this challenge.
    ///
    /// # Errors
    ///
    /// Returns `PkceError::VerificationFailed` if it does not.
    pub fn verify(&self, verifier: &PkceVerifier) -> Result<(), PkceError> {
        if *self == Self::from_verifier(verifier) {
            Ok(())
        } else {
            Err(PkceError::VerificationFailed)
        }
    }

    /// Get the challenge as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for PkceChallenge {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
