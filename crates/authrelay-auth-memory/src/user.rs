//! In-memory user storage.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use authrelay_auth::AuthResult;
use authrelay_auth::storage::{User, UserStorage};

/// User storage backed by a map keyed by user id.
///
/// Subject lookups scan the map; fine for the handful of users a test or
/// demo holds.
#[derive(Default)]
pub struct MemoryUserStorage {
    users: RwLock<HashMap<String, User>>,
}

impl MemoryUserStorage {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes a user by id, returning whether one was removed.
    ///
    /// Test helper for simulating a deleted account behind a live session.
    pub async fn remove(&self, user_id: &str) -> bool {
        self.users.write().await.remove(user_id).is_some()
    }
}

#[async_trait]
impl UserStorage for MemoryUserStorage {
    async fn find_by_id(&self, user_id: &str) -> AuthResult<Option<User>> {
        Ok(self.users.read().await.get(user_id).cloned())
    }

    async fn find_by_subject(&self, subject: &str) -> AuthResult<Option<User>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|user| user.subject == subject)
            .cloned())
    }

    async fn upsert(&self, user: &User) -> AuthResult<()> {
        self.users
            .write()
            .await
            .insert(user.id.clone(), user.clone());
        Ok(())
    }
}
