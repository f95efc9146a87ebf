//! Session storage trait.
//!
//! The handshake's correctness across the provider round trip rests
//! entirely on this store: the state/verifier pair written at initiation
//! must durably survive until the callback. Implementations must make
//! `update` an atomic read-modify-write; they should not hold any lock
//! across network calls (the handshake never performs I/O inside a
//! mutator).

use async_trait::async_trait;

use crate::AuthResult;
use crate::session::{SessionData, SessionId};

/// Mutation applied to session data under the store's atomicity guarantee.
pub type SessionMutator<'a> = Box<dyn FnOnce(&mut SessionData) + Send + 'a>;

/// Storage trait for per-user sessions.
///
/// Concurrent requests on *different* sessions are fully independent. Two
/// requests racing on the *same* session resolve by the store's own
/// read-modify-write semantics; last-write-wins is acceptable because only
/// one PKCE verifier can ever be validly exchanged.
#[async_trait]
pub trait SessionStorage: Send + Sync {
    /// Loads the session data for an id.
    ///
    /// Returns `None` if no data has ever been written for this session.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn load(&self, id: &SessionId) -> AuthResult<Option<SessionData>>;

    /// Atomically mutates the session data for an id.
    ///
    /// Creates the record (from default data) if it does not exist yet.
    /// The read, the mutation, and the write must be one atomic step with
    /// respect to other updates of the same session.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails; the mutation must
    /// then not be applied.
    async fn update(&self, id: &SessionId, mutator: SessionMutator<'_>) -> AuthResult<()>;

    /// Deletes the session record.
    ///
    /// Deleting an absent session is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn delete(&self, id: &SessionId) -> AuthResult<()>;
}
