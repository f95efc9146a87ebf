//! # authrelay-auth
//!
//! Authenticates end users against an external identity provider with the
//! OAuth2 Authorization Code flow + PKCE and maintains the per-user session
//! recording authentication state.
//!
//! ## Overview
//!
//! The core is the handshake state machine spanning two independent HTTP
//! requests: the application generates a CSRF state token and a PKCE
//! verifier, persists both in the session, and redirects the user agent to
//! the provider; the provider redirects back with an authorization code,
//! which — after the state check — is exchanged server-to-server for
//! tokens, finalizing the session as authenticated.
//!
//! ## Modules
//!
//! - [`config`] - provider endpoints, credentials, timeouts, routes
//! - [`oauth`] - nonces, PKCE, authorization URL, token exchange
//! - [`session`] - session data and the explicit session handle
//! - [`handshake`] - the state machine orchestrating the flow
//! - [`resolver`] - session-to-user resolution
//! - [`storage`] - session and user storage traits
//! - [`http`] - Axum handlers for the caller-facing operations
//! - [`error`] - error taxonomy

pub mod config;
pub mod error;
pub mod handshake;
pub mod http;
pub mod oauth;
pub mod resolver;
pub mod session;
pub mod storage;

pub use config::{AuthConfig, ConfigError, CookieConfig, ProviderConfig, RouteConfig};
pub use error::AuthError;
pub use handshake::{CallbackParams, HandshakeService, HandshakeState, RedirectTarget};
pub use http::{AuthState, router};
pub use oauth::{
    PkceChallenge, PkceError, PkceVerifier, StateToken, TokenExchangeClient, TokenResponse,
};
pub use resolver::SessionUserResolver;
pub use session::{PendingHandshake, Session, SessionData, SessionId};
pub use storage::{SessionStorage, User, UserStorage};

/// Type alias for authentication results.
pub type AuthResult<T> = Result<T, AuthError>;
