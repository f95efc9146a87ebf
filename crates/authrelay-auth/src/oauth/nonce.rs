//! One-time cryptographic nonces.
//!
//! The CSRF state token and the PKCE verifier are built on the same
//! primitive: 32 bytes from the OS-backed secure random source, base64url
//! encoded without padding (43 characters). They differ only in role, so
//! the primitive lives here and the PKCE types reuse it.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Number of random bytes behind every generated nonce.
pub const NONCE_BYTES: usize = 32;

/// Generates 32 bytes of cryptographically secure randomness, base64url
/// encoded without padding.
pub(crate) fn random_urlsafe() -> String {
    let mut bytes = [0u8; NONCE_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// CSRF state token round-tripped through the identity provider.
///
/// Generated at initiation, stored in the session, echoed back by the
/// provider in the callback, and compared exactly once. The comparison is
/// plain equality; an absent stored token never matches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateToken(String);

impl StateToken {
    /// Generates a fresh random state token.
    #[must_use]
    pub fn generate() -> Self {
        Self(random_urlsafe())
    }

    /// Wraps a token value read back from storage.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns `true` if the echoed callback value exactly equals this token.
    #[must_use]
    pub fn matches(&self, echoed: &str) -> bool {
        self.0 == echoed
    }

    /// Get the token as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for StateToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
