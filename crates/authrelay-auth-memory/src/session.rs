//! In-memory session storage.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use authrelay_auth::AuthResult;
use authrelay_auth::session::{SessionData, SessionId};
use authrelay_auth::storage::SessionStorage;
use authrelay_auth::storage::session::SessionMutator;

/// Session storage backed by a map behind an async `RwLock`.
///
/// `update` holds the write lock for the duration of the mutator, which
/// makes the read-modify-write atomic with respect to other updates of the
/// same session. Mutators never perform I/O, so the lock is held only
/// briefly.
#[derive(Default)]
pub struct MemorySessionStorage {
    sessions: RwLock<HashMap<SessionId, SessionData>>,
}

impl MemorySessionStorage {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStorage for MemorySessionStorage {
    async fn load(&self, id: &SessionId) -> AuthResult<Option<SessionData>> {
        Ok(self.sessions.read().await.get(id).cloned())
    }

    async fn update(&self, id: &SessionId, mutator: SessionMutator<'_>) -> AuthResult<()> {
        let mut sessions = self.sessions.write().await;
        let data = sessions.entry(id.clone()).or_default();
        mutator(data);
        Ok(())
    }

    async fn delete(&self, id: &SessionId) -> AuthResult<()> {
        self.sessions.write().await.remove(id);
        Ok(())
    }
}
