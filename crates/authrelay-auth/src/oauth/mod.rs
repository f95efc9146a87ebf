//! OAuth2 authorization-code + PKCE building blocks.
//!
//! - [`nonce`] - one-time cryptographic values (CSRF state token)
//! - [`pkce`] - RFC 7636 verifier/challenge pair, S256 only
//! - [`authorize`] - authorization request URL construction
//! - [`token`] - code-for-token exchange client

pub mod authorize;
pub mod nonce;
pub mod pkce;
pub mod token;

pub use authorize::build_authorization_url;
pub use nonce::StateToken;
pub use pkce::{PkceChallenge, PkceError, PkceVerifier};
pub use token::{IdentityClaims, TokenExchangeClient, TokenResponse};
