//! The login handshake state machine.
//!
//! Orchestrates the full flow: initiate → redirect-out → callback →
//! validate → exchange → finalize. The state machine is explicit — derived
//! from session contents via [`HandshakeState`] — and every transition that
//! is not valid for the current state rejects instead of silently doing
//! nothing.
//!
//! ```text
//! Unauthenticated --initiate--> Pending --callback(valid)--> Authenticated
//!                                  |                             |
//!                                  +--callback(mismatch/expired)-+-> rejected, pending kept or cleared
//! ```

use std::sync::Arc;

use url::Url;

use crate::AuthResult;
use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::oauth::{
    PkceChallenge, PkceVerifier, StateToken, TokenExchangeClient, build_authorization_url,
};
use crate::resolver::SessionUserResolver;
use crate::session::{PendingHandshake, Session, SessionData};
use crate::storage::{User, UserStorage};

/// Handshake state, derived from what the session holds.
///
/// `Authenticated` takes precedence: a session that carries a user id is
/// logged in regardless of any leftover pending state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    /// No identity and no handshake in flight.
    Unauthenticated,
    /// State and verifier stored, awaiting the provider callback.
    Pending,
    /// Exchange completed; session carries a user id.
    Authenticated,
}

impl HandshakeState {
    /// Derives the state from session data.
    #[must_use]
    pub fn of(data: &SessionData) -> Self {
        if data.is_authenticated() {
            Self::Authenticated
        } else if data.pending.is_some() {
            Self::Pending
        } else {
            Self::Unauthenticated
        }
    }
}

/// Query parameters carried by the provider's callback redirect.
#[derive(Debug, Clone, Default)]
pub struct CallbackParams {
    /// Provider-issued, single-use authorization code.
    pub code: Option<String>,
    /// Echoed CSRF state token.
    pub state: Option<String>,
}

impl CallbackParams {
    fn require(self) -> AuthResult<(String, String)> {
        let code = self
            .code
            .filter(|c| !c.is_empty())
            .ok_or_else(|| AuthError::malformed_callback("missing code parameter"))?;
        let state = self
            .state
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AuthError::malformed_callback("missing state parameter"))?;
        Ok((code, state))
    }
}

/// Where to send the user agent after a handshake operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectTarget {
    /// The application's main entry point.
    Home,
    /// The login entry point.
    Login,
}

impl RedirectTarget {
    /// The fallback target for a failed operation.
    ///
    /// Raw provider errors are never exposed; the user agent only ever sees
    /// a generic return to the application or to login.
    #[must_use]
    pub fn for_error(err: &AuthError) -> Self {
        if err.requires_login() {
            Self::Login
        } else {
            Self::Home
        }
    }
}

/// Orchestrates the login handshake against the identity provider.
pub struct HandshakeService {
    config: AuthConfig,
    token_client: TokenExchangeClient,
    users: Arc<dyn UserStorage>,
    resolver: SessionUserResolver,
}

impl HandshakeService {
    /// Creates the service from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the configuration does not
    /// validate or the token exchange client cannot be built.
    pub fn new(config: AuthConfig, users: Arc<dyn UserStorage>) -> AuthResult<Self> {
        config
            .validate()
            .map_err(|e| AuthError::configuration(e.to_string()))?;
        let token_client = TokenExchangeClient::new(&config)?;
        let resolver = SessionUserResolver::new(Arc::clone(&users));
        Ok(Self {
            config,
            token_client,
            users,
            resolver,
        })
    }

    /// The service configuration.
    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Initiates the handshake: generates the state/verifier pair, persists
    /// it, and returns the provider URL to redirect the user agent to.
    ///
    /// The pending pair is written *before* the URL is handed out. If the
    /// session write fails, no URL is returned and the user agent is never
    /// sent to the provider with an unpersisted nonce. Initiating over an
    /// existing pending handshake overwrites it; only the newest pair can
    /// validate.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::SessionStore` if persisting the pair fails.
    pub async fn initiate(&self, session: &Session) -> AuthResult<Url> {
        let state = StateToken::generate();
        let verifier = PkceVerifier::generate();
        let challenge = PkceChallenge::from_verifier(&verifier);

        let url = build_authorization_url(
            &self.config.provider,
            &self.config.redirect_uri,
            &state,
            &challenge,
        )
        .map_err(|e| AuthError::internal(format!("authorize URL: {e}")))?;

        let pending = PendingHandshake::new(state, verifier.into_inner());
        session
            .update(move |data| {
                data.pending = Some(pending);
            })
            .await?;

        tracing::debug!(session_id = %session.id(), "login handshake initiated");
        Ok(url)
    }

    /// Handles the provider callback: validates, exchanges, finalizes.
    ///
    /// Ordering matters for safety:
    /// 1. Missing `code`/`state` rejects before any session lookup.
    /// 2. Any session not in the pending state — no handshake in flight,
    ///    already authenticated, or an expired pair — and any state
    ///    mismatch rejects before any network call.
    /// 3. A failed exchange leaves the session unchanged.
    /// 4. On success, the pending pair is cleared and the user id recorded
    ///    in one atomic update, so the pair is consumed exactly once. A
    ///    replayed authorization code fails at the provider, not here.
    ///
    /// # Errors
    ///
    /// Returns the taxonomy error for each rejection; callers map every
    /// error to a redirect via [`RedirectTarget::for_error`].
    pub async fn handle_callback(
        &self,
        session: &Session,
        params: CallbackParams,
    ) -> AuthResult<User> {
        let (code, echoed_state) = params.require()?;

        let data = session.load().await?;

        // The callback transition is only valid while a handshake is
        // pending. An already-authenticated session keeps its identity and
        // cannot be re-finalized without logging out first.
        if HandshakeState::of(&data) != HandshakeState::Pending {
            tracing::warn!(
                session_id = %session.id(),
                state = ?HandshakeState::of(&data),
                "callback outside a pending handshake"
            );
            return Err(AuthError::CsrfMismatch);
        }
        let Some(pending) = data.pending else {
            return Err(AuthError::CsrfMismatch);
        };

        if pending.is_expired(self.config.handshake_ttl) {
            // The stale pair is cleared so it can never be exchanged later.
            session.update(|data| data.pending = None).await?;
            tracing::warn!(session_id = %session.id(), "callback against an expired handshake");
            return Err(AuthError::CsrfMismatch);
        }

        if !pending.state.matches(&echoed_state) {
            tracing::warn!(session_id = %session.id(), "callback state does not match session");
            return Err(AuthError::CsrfMismatch);
        }

        let verifier = PkceVerifier::new(pending.code_verifier)
            .map_err(|e| AuthError::internal(format!("stored verifier: {e}")))?;

        let tokens = self.token_client.exchange(&code, &verifier).await?;
        let claims = tokens.identity_claims()?;

        let user = match self.users.find_by_subject(&claims.sub).await? {
            Some(user) => user,
            None => {
                let user = User::new(&claims.sub, claims.username());
                self.users.upsert(&user).await?;
                tracing::info!(user_id = %user.id, "provisioned user on first login");
                user
            }
        };

        let user_id = user.id.clone();
        session
            .update(move |data| {
                data.pending = None;
                data.user_id = Some(user_id);
                data.authenticated_at = Some(time::OffsetDateTime::now_utc());
            })
            .await?;

        tracing::info!(session_id = %session.id(), user_id = %user.id, "login complete");
        Ok(user)
    }

    /// Logs the session out.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::SessionStore` if the destroy fails.
    pub async fn logout(&self, session: &Session) -> AuthResult<()> {
        session.destroy().await?;
        tracing::info!(session_id = %session.id(), "logged out");
        Ok(())
    }

    /// Resolves the current user behind the session.
    ///
    /// # Errors
    ///
    /// See [`SessionUserResolver::resolve`]; a failed resolution destroys
    /// the session.
    pub async fn current_user(&self, session: &Session) -> AuthResult<User> {
        self.resolver.resolve(session).await
    }
}
