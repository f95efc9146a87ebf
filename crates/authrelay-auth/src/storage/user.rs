//! User record and storage trait.
//!
//! Users are owned by the persistence collaborator and referenced (never
//! owned) by sessions via `user_id`. The store is keyed two ways: by our
//! own id for session resolution, and by the provider-issued subject for
//! first-login provisioning.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::AuthResult;

/// A user of the application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier within the application.
    pub id: String,

    /// Display username.
    pub username: String,

    /// Provider-issued subject identifier this user is linked to.
    pub subject: String,

    /// When the user record was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl User {
    /// Creates a new user provisioned from a provider identity.
    #[must_use]
    pub fn new(subject: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            username: username.into(),
            subject: subject.into(),
            created_at: OffsetDateTime::now_utc(),
        }
    }
}

/// Storage operations for users.
#[async_trait]
pub trait UserStorage: Send + Sync {
    /// Finds a user by application id.
    ///
    /// Returns `None` if the user does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_id(&self, user_id: &str) -> AuthResult<Option<User>>;

    /// Finds a user by provider-issued subject.
    ///
    /// Returns `None` if no user is linked to that subject.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_subject(&self, subject: &str) -> AuthResult<Option<User>>;

    /// Creates or replaces a user record.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn upsert(&self, user: &User) -> AuthResult<()>;
}
