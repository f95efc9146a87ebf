//! Per-user session data and the explicit session handle.
//!
//! The handshake spans two independent HTTP requests separated by a round
//! trip through the identity provider; the only thing linking them is the
//! state persisted here. Handshake functions receive an explicit
//! [`Session`] handle instead of reaching into ambient request context, so
//! every read and write of session state is visible at the call site.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::AuthResult;
use crate::oauth::StateToken;
use crate::storage::SessionStorage;

/// Opaque session identifier, stored client-side as the cookie value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    /// Generates a fresh random session id.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wraps an id received from a client credential.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Handshake state pending between redirect-out and callback.
///
/// The CSRF state and the PKCE verifier live and die together: they are
/// written in the same update at initiation and consumed in the same
/// validation step on the callback. Holding them in one struct makes the
/// "present together or absent together" invariant structural.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingHandshake {
    /// CSRF state token awaiting the provider's echo.
    pub state: StateToken,

    /// PKCE verifier awaiting the token exchange.
    pub code_verifier: String,

    /// When the handshake was initiated; pending state past the configured
    /// TTL is treated as absent.
    #[serde(with = "time::serde::rfc3339")]
    pub initiated_at: OffsetDateTime,
}

impl PendingHandshake {
    /// Creates a pending handshake initiated now.
    #[must_use]
    pub fn new(state: StateToken, code_verifier: String) -> Self {
        Self {
            state,
            code_verifier,
            initiated_at: OffsetDateTime::now_utc(),
        }
    }

    /// Returns `true` if the handshake was initiated more than `ttl` ago.
    #[must_use]
    pub fn is_expired(&self, ttl: Duration) -> bool {
        OffsetDateTime::now_utc() - self.initiated_at > ttl
    }
}

/// Server-side session data, serialized into the backing store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionData {
    /// In-flight handshake state, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending: Option<PendingHandshake>,

    /// Authenticated user id, set only by a token exchange that validated
    /// the matching CSRF state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// When the session became authenticated.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub authenticated_at: Option<OffsetDateTime>,
}

impl SessionData {
    /// Returns `true` if the session carries an authenticated identity.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }
}

/// Explicit handle to one user's session in the backing store.
///
/// Cheap to clone; acquisition is scoped to the request and every mutation
/// goes through the store's atomic [`SessionStorage::update`].
#[derive(Clone)]
pub struct Session {
    id: SessionId,
    store: Arc<dyn SessionStorage>,
}

impl Session {
    /// Creates a handle for the given session id.
    #[must_use]
    pub fn new(id: SessionId, store: Arc<dyn SessionStorage>) -> Self {
        Self { id, store }
    }

    /// The session's opaque identifier.
    #[must_use]
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Loads the session data, empty if nothing has been written yet.
    ///
    /// Sessions are created implicitly on first write, so an absent record
    /// reads as default data rather than an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unavailable.
    pub async fn load(&self) -> AuthResult<SessionData> {
        Ok(self.store.load(&self.id).await?.unwrap_or_default())
    }

    /// Applies an atomic read-modify-write to the session data.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unavailable; the mutation is then
    /// not applied.
    pub async fn update<F>(&self, mutate: F) -> AuthResult<()>
    where
        F: FnOnce(&mut SessionData) + Send,
    {
        self.store.update(&self.id, Box::new(mutate)).await
    }

    /// Destroys the session (logout).
    ///
    /// # Errors
    ///
    /// Returns an error if the store is unavailable.
    pub async fn destroy(&self) -> AuthResult<()> {
        self.store.delete(&self.id).await
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").field("id", &self.id).finish()
    }
}
