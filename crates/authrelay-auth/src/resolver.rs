//! Session-to-user resolution.
//!
//! Turns an authenticated session into the application's user record. A
//! session that cannot be resolved — no identity, or an identity pointing
//! at a deleted user — is destroyed before the error is returned, so a
//! broken or stale session never silently continues.

use std::sync::Arc;

use crate::AuthResult;
use crate::error::AuthError;
use crate::session::Session;
use crate::storage::{User, UserStorage};

/// Resolves the application user behind a session.
#[derive(Clone)]
pub struct SessionUserResolver {
    users: Arc<dyn UserStorage>,
}

impl SessionUserResolver {
    /// Creates a resolver over the given user storage.
    #[must_use]
    pub fn new(users: Arc<dyn UserStorage>) -> Self {
        Self { users }
    }

    /// Resolves the user referenced by the session.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Unauthenticated` if the session carries no user
    /// id and `AuthError::UserNotFound` if the referenced user no longer
    /// exists. In both cases the session has been destroyed by the time the
    /// error is returned; the caller redirects to login.
    pub async fn resolve(&self, session: &Session) -> AuthResult<User> {
        let data = session.load().await?;

        let Some(user_id) = data.user_id else {
            session.destroy().await?;
            return Err(AuthError::Unauthenticated);
        };

        match self.users.find_by_id(&user_id).await? {
            Some(user) => Ok(user),
            None => {
                tracing::warn!(user_id = %user_id, "session referenced a missing user, forcing logout");
                session.destroy().await?;
                Err(AuthError::user_not_found(user_id))
            }
        }
    }
}
