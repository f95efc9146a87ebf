//! Axum handlers for the caller-facing auth operations.
//!
//! Four endpoints: `/auth/login` (initiate), `/auth/callback` (provider
//! redirect back), `/auth/logout`, and `/auth/me` (current user). The
//! session id rides in a cookie; session data stays server-side. Every
//! failure maps to a redirect — home or login — and never to a rendered
//! provider error.
//!
//! # Usage
//!
//! ```ignore
//! use authrelay_auth::http::{AuthState, router};
//!
//! let state = AuthState::new(service, session_storage);
//! let app = axum::Router::new().merge(router(state));
//! ```

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::{CookieConfig, RouteConfig};
use crate::error::AuthError;
use crate::handshake::{CallbackParams, HandshakeService, RedirectTarget};
use crate::session::{Session, SessionId};
use crate::storage::SessionStorage;

// =============================================================================
// State
// =============================================================================

/// Shared state for the auth endpoints.
#[derive(Clone)]
pub struct AuthState {
    /// The handshake orchestrator.
    pub service: Arc<HandshakeService>,
    /// Session storage backend.
    pub sessions: Arc<dyn SessionStorage>,
    /// Session cookie settings.
    pub cookie: CookieConfig,
    /// Redirect target routes.
    pub routes: RouteConfig,
}

impl AuthState {
    /// Creates the state, taking cookie and route settings from the
    /// service configuration.
    #[must_use]
    pub fn new(service: Arc<HandshakeService>, sessions: Arc<dyn SessionStorage>) -> Self {
        let cookie = service.config().cookie.clone();
        let routes = service.config().routes.clone();
        Self {
            service,
            sessions,
            cookie,
            routes,
        }
    }

    fn target_path(&self, target: RedirectTarget) -> &str {
        match target {
            RedirectTarget::Home => &self.routes.home,
            RedirectTarget::Login => &self.routes.login,
        }
    }
}

/// Builds the auth router.
pub fn router(state: AuthState) -> Router {
    Router::new()
        .route("/auth/login", get(login_handler))
        .route("/auth/callback", get(callback_handler))
        .route("/auth/logout", get(logout_handler).post(logout_handler))
        .route("/auth/me", get(me_handler))
        .with_state(state)
}

// =============================================================================
// Request/Response Types
// =============================================================================

/// Query parameters on the provider callback.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    /// Provider-issued authorization code.
    #[serde(default)]
    pub code: Option<String>,
    /// Echoed CSRF state token.
    #[serde(default)]
    pub state: Option<String>,
}

impl From<CallbackQuery> for CallbackParams {
    fn from(query: CallbackQuery) -> Self {
        Self {
            code: query.code,
            state: query.state,
        }
    }
}

/// Response body for `/auth/me`.
#[derive(Debug, Serialize)]
pub struct UserInfoResponse {
    /// Application user id.
    pub id: String,
    /// Display username.
    pub username: String,
}

// =============================================================================
// Handlers
// =============================================================================

/// Handler for GET /auth/login.
///
/// Initiates the handshake and redirects the user agent to the identity
/// provider. If the pending state cannot be persisted, the user agent is
/// sent back to login instead — never to the provider with an unpersisted
/// nonce.
pub async fn login_handler(State(state): State<AuthState>, jar: CookieJar) -> (CookieJar, Redirect) {
    let (session, jar) = establish_session(&state, jar);

    match state.service.initiate(&session).await {
        Ok(url) => (jar, Redirect::to(url.as_str())),
        Err(err) => {
            warn!(error = %err, "failed to initiate login handshake");
            (jar, Redirect::to(&state.routes.login))
        }
    }
}

/// Handler for GET /auth/callback.
///
/// Validates and completes the handshake. All failures degrade to a
/// redirect; detail stays in the server logs.
pub async fn callback_handler(
    State(state): State<AuthState>,
    Query(query): Query<CallbackQuery>,
    jar: CookieJar,
) -> (CookieJar, Redirect) {
    let (session, jar) = establish_session(&state, jar);

    match state.service.handle_callback(&session, query.into()).await {
        Ok(_user) => (jar, Redirect::to(&state.routes.home)),
        Err(err) => {
            log_callback_failure(&err);
            let target = state.target_path(RedirectTarget::for_error(&err)).to_string();
            (jar, Redirect::to(&target))
        }
    }
}

/// Handler for GET/POST /auth/logout.
///
/// Destroys the session, clears the cookie, and redirects to login. The
/// handler is lenient: a store failure still clears the cookie.
pub async fn logout_handler(
    State(state): State<AuthState>,
    jar: CookieJar,
) -> (CookieJar, Redirect) {
    if let Some(cookie) = jar.get(&state.cookie.name) {
        let session = Session::new(SessionId::new(cookie.value()), Arc::clone(&state.sessions));
        if let Err(err) = state.service.logout(&session).await {
            debug!(error = %err, "session destroy failed during logout");
        }
    }

    let jar = jar.remove(Cookie::build(state.cookie.name.clone()).path("/"));
    (jar, Redirect::to(&state.routes.login))
}

/// Handler for GET /auth/me.
///
/// Returns the current user as JSON, or redirects to login when the
/// session cannot be resolved (the resolver has already destroyed it).
pub async fn me_handler(State(state): State<AuthState>, jar: CookieJar) -> Response {
    let Some(cookie) = jar.get(&state.cookie.name) else {
        return Redirect::to(&state.routes.login).into_response();
    };

    let session = Session::new(SessionId::new(cookie.value()), Arc::clone(&state.sessions));
    match state.service.current_user(&session).await {
        Ok(user) => Json(UserInfoResponse {
            id: user.id,
            username: user.username,
        })
        .into_response(),
        Err(err) => {
            debug!(error = %err, "session resolution failed");
            let jar = jar.remove(Cookie::build(state.cookie.name.clone()).path("/"));
            (jar, Redirect::to(&state.routes.login)).into_response()
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Reads the session id from the cookie jar, or establishes a fresh
/// session and sets its cookie.
fn establish_session(state: &AuthState, jar: CookieJar) -> (Session, CookieJar) {
    if let Some(cookie) = jar.get(&state.cookie.name) {
        let id = SessionId::new(cookie.value());
        return (Session::new(id, Arc::clone(&state.sessions)), jar);
    }

    let id = SessionId::generate();
    let cookie = build_session_cookie(&state.cookie, id.as_str().to_string());
    let session = Session::new(id, Arc::clone(&state.sessions));
    (session, jar.add(cookie))
}

fn build_session_cookie(config: &CookieConfig, value: String) -> Cookie<'static> {
    Cookie::build((config.name.clone(), value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(config.secure)
        .build()
}

fn log_callback_failure(err: &AuthError) {
    if err.is_security_event() {
        warn!(error = %err, "rejected provider callback");
    } else if err.is_external() {
        warn!(error = %err, "token exchange with provider failed");
    } else {
        debug!(error = %err, "provider callback not completed");
    }
}
