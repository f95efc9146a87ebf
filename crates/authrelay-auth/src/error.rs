//! Authentication error types.
//!
//! Every error in the login handshake is recoverable: the caller degrades to
//! a redirect (home or login) and the session is either left untouched or
//! explicitly cleared. Error detail is for server-side diagnostics only and
//! is never rendered to the user agent.

/// Errors that can occur during the login handshake and session resolution.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The provider callback is missing the `code` or `state` parameter.
    #[error("Malformed callback: {message}")]
    MalformedCallback {
        /// Which parameter was missing or empty.
        message: String,
    },

    /// The callback `state` does not match the value stored in the session.
    ///
    /// This covers the case where the session holds no pending handshake at
    /// all: an absent stored state never matches a provided one.
    #[error("CSRF state mismatch")]
    CsrfMismatch,

    /// The session store failed while reading or writing session data.
    #[error("Session store error: {message}")]
    SessionStore {
        /// Description of the store failure.
        message: String,
    },

    /// The code-for-token exchange with the identity provider failed.
    ///
    /// Covers network errors, non-2xx responses, and malformed response
    /// bodies. The exchange is never retried: authorization codes are
    /// single-use.
    #[error("Token exchange failed: {message}")]
    TokenExchange {
        /// Description of the exchange failure.
        message: String,
    },

    /// The identity provider returned a structured OAuth error.
    #[error("OAuth error from provider: {error} - {description}")]
    OAuthProvider {
        /// The OAuth error code (e.g., `invalid_grant`).
        error: String,
        /// Optional human-readable description from the provider.
        description: String,
    },

    /// The session references a user that no longer exists.
    #[error("User not found: {user_id}")]
    UserNotFound {
        /// The dangling user id from the session.
        user_id: String,
    },

    /// The session carries no authenticated identity.
    #[error("Unauthenticated")]
    Unauthenticated,

    /// The auth configuration is invalid or incomplete.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration problem.
        message: String,
    },

    /// An unexpected internal error occurred.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl AuthError {
    /// Creates a new `MalformedCallback` error.
    #[must_use]
    pub fn malformed_callback(message: impl Into<String>) -> Self {
        Self::MalformedCallback {
            message: message.into(),
        }
    }

    /// Creates a new `SessionStore` error.
    #[must_use]
    pub fn session_store(message: impl Into<String>) -> Self {
        Self::SessionStore {
            message: message.into(),
        }
    }

    /// Creates a new `TokenExchange` error.
    #[must_use]
    pub fn token_exchange(message: impl Into<String>) -> Self {
        Self::TokenExchange {
            message: message.into(),
        }
    }

    /// Creates a new `OAuthProvider` error from a provider response.
    #[must_use]
    pub fn oauth_provider(error: impl Into<String>, description: impl Into<String>) -> Self {
        Self::OAuthProvider {
            error: error.into(),
            description: description.into(),
        }
    }

    /// Creates a new `UserNotFound` error.
    #[must_use]
    pub fn user_not_found(user_id: impl Into<String>) -> Self {
        Self::UserNotFound {
            user_id: user_id.into(),
        }
    }

    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if this error should be logged as a security event.
    #[must_use]
    pub fn is_security_event(&self) -> bool {
        matches!(self, Self::CsrfMismatch)
    }

    /// Returns `true` if this error originated at the identity provider or
    /// on the network path to it.
    #[must_use]
    pub fn is_external(&self) -> bool {
        matches!(self, Self::TokenExchange { .. } | Self::OAuthProvider { .. })
    }

    /// Returns `true` if the caller should be sent back through login.
    ///
    /// Everything else degrades to the application home route.
    #[must_use]
    pub fn requires_login(&self) -> bool {
        matches!(
            self,
            Self::Unauthenticated | Self::UserNotFound { .. } | Self::SessionStore { .. }
        )
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        Self::TokenExchange {
            message: err.to_string(),
        }
    }
}
