//! End-to-end handshake tests against a mocked identity provider.

use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use url::Url;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use async_trait::async_trait;
use authrelay_auth::AuthResult;
use authrelay_auth::config::{CookieConfig, RouteConfig};
use authrelay_auth::session::SessionData;
use authrelay_auth::storage::SessionStorage;
use authrelay_auth::storage::session::SessionMutator;
use authrelay_auth::{
    AuthConfig, AuthError, CallbackParams, HandshakeService, HandshakeState, PkceChallenge,
    PkceVerifier, ProviderConfig, RedirectTarget, Session, SessionId,
};
use authrelay_auth_memory::{MemorySessionStorage, MemoryUserStorage};

const TOKEN_PATH: &str = "/v1/tenants/t1/realms/r1/applications/app/token";

fn test_config(provider_base: &str) -> AuthConfig {
    AuthConfig {
        provider: ProviderConfig {
            base_url: Url::parse(provider_base).unwrap(),
            tenant: "t1".to_string(),
            realm: "r1".to_string(),
            application: "app".to_string(),
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
        },
        redirect_uri: Url::parse("http://app.local/auth/callback").unwrap(),
        routes: RouteConfig::default(),
        cookie: CookieConfig::default(),
        handshake_ttl: Duration::from_secs(600),
        request_timeout: Duration::from_secs(5),
    }
}

struct Harness {
    service: HandshakeService,
    sessions: Arc<MemorySessionStorage>,
    users: Arc<MemoryUserStorage>,
}

impl Harness {
    fn new(provider_base: &str) -> Self {
        let sessions = Arc::new(MemorySessionStorage::new());
        let users = Arc::new(MemoryUserStorage::new());
        let user_storage: Arc<dyn authrelay_auth::UserStorage> = users.clone();
        let service = HandshakeService::new(test_config(provider_base), user_storage).unwrap();
        Self {
            service,
            sessions,
            users,
        }
    }

    fn session(&self) -> Session {
        let store: Arc<dyn SessionStorage> = self.sessions.clone();
        Session::new(SessionId::generate(), store)
    }
}

fn encode_jwt(payload: serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
    let body = URL_SAFE_NO_PAD.encode(payload.to_string().as_bytes());
    format!("{header}.{body}.sig")
}

fn token_body(sub: &str, username: &str) -> serde_json::Value {
    serde_json::json!({
        "access_token": "AT-1",
        "token_type": "Bearer",
        "expires_in": 3600,
        "scope": "openid",
        "id_token": encode_jwt(serde_json::json!({
            "sub": sub,
            "preferred_username": username,
        })),
    })
}

fn query_param(url: &Url, name: &str) -> String {
    url.query_pairs()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
        .unwrap_or_else(|| panic!("missing query parameter '{name}'"))
}

#[tokio::test]
async fn test_successful_login_handshake() {
    let provider = MockServer::start().await;
    let harness = Harness::new(&provider.uri());
    let session = harness.session();

    let authorize_url = harness.service.initiate(&session).await.unwrap();

    // The redirect-out carries the state and the derived challenge, never
    // the verifier itself.
    let state = query_param(&authorize_url, "state");
    let challenge = query_param(&authorize_url, "code_challenge");
    assert_eq!(query_param(&authorize_url, "response_type"), "code");
    assert_eq!(query_param(&authorize_url, "code_challenge_method"), "S256");

    let data = session.load().await.unwrap();
    assert_eq!(HandshakeState::of(&data), HandshakeState::Pending);
    let pending = data.pending.unwrap();
    assert_eq!(pending.state.as_str(), state);

    let stored_verifier = PkceVerifier::new(pending.code_verifier.clone()).unwrap();
    assert_eq!(
        PkceChallenge::from_verifier(&stored_verifier).as_str(),
        challenge
    );
    assert!(!authorize_url.as_str().contains(stored_verifier.as_str()));

    let basic = format!("Basic {}", STANDARD.encode("client:secret"));
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(header("authorization", basic.as_str()))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=CODE-1"))
        .and(body_string_contains(format!(
            "code_verifier={}",
            pending.code_verifier
        )))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("user-123", "alice")))
        .expect(1)
        .mount(&provider)
        .await;

    let params = CallbackParams {
        code: Some("CODE-1".to_string()),
        state: Some(state),
    };
    let user = harness.service.handle_callback(&session, params).await.unwrap();
    assert_eq!(user.subject, "user-123");
    assert_eq!(user.username, "alice");

    // One atomic finalize: pending consumed, identity recorded.
    let data = session.load().await.unwrap();
    assert_eq!(HandshakeState::of(&data), HandshakeState::Authenticated);
    assert!(data.pending.is_none());
    assert_eq!(data.user_id.as_deref(), Some(user.id.as_str()));
    assert!(data.authenticated_at.is_some());

    let resolved = harness.service.current_user(&session).await.unwrap();
    assert_eq!(resolved.id, user.id);
}

#[tokio::test]
async fn test_repeat_login_reuses_provisioned_user() {
    let provider = MockServer::start().await;
    let harness = Harness::new(&provider.uri());

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("user-123", "alice")))
        .expect(2)
        .mount(&provider)
        .await;

    let mut user_ids = Vec::new();
    for _ in 0..2 {
        let session = harness.session();
        let url = harness.service.initiate(&session).await.unwrap();
        let params = CallbackParams {
            code: Some("CODE".to_string()),
            state: Some(query_param(&url, "state")),
        };
        let user = harness.service.handle_callback(&session, params).await.unwrap();
        user_ids.push(user.id);
    }

    assert_eq!(user_ids[0], user_ids[1]);
}

#[tokio::test]
async fn test_state_mismatch_rejects_without_exchange() {
    let provider = MockServer::start().await;
    let harness = Harness::new(&provider.uri());
    let session = harness.session();

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("user-123", "alice")))
        .expect(0)
        .mount(&provider)
        .await;

    harness.service.initiate(&session).await.unwrap();

    let params = CallbackParams {
        code: Some("CODE-1".to_string()),
        state: Some("forged-state".to_string()),
    };
    let err = harness
        .service
        .handle_callback(&session, params)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::CsrfMismatch));
    assert!(err.is_security_event());

    // The pending pair survives a mismatch; a later legitimate callback
    // could still complete.
    let data = session.load().await.unwrap();
    assert_eq!(HandshakeState::of(&data), HandshakeState::Pending);
}

#[tokio::test]
async fn test_callback_without_pending_handshake_is_rejected() {
    let provider = MockServer::start().await;
    let harness = Harness::new(&provider.uri());
    let session = harness.session();

    let params = CallbackParams {
        code: Some("CODE-1".to_string()),
        state: Some("S1".to_string()),
    };
    let err = harness
        .service
        .handle_callback(&session, params)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::CsrfMismatch));
}

#[tokio::test]
async fn test_missing_callback_params_reject_before_session_lookup() {
    let provider = MockServer::start().await;
    let harness = Harness::new(&provider.uri());
    let session = harness.session();

    for params in [
        CallbackParams::default(),
        CallbackParams {
            code: Some("CODE-1".to_string()),
            state: None,
        },
        CallbackParams {
            code: None,
            state: Some("S1".to_string()),
        },
        CallbackParams {
            code: Some(String::new()),
            state: Some("S1".to_string()),
        },
    ] {
        let err = harness
            .service
            .handle_callback(&session, params)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::MalformedCallback { .. }));
    }
}

#[tokio::test]
async fn test_provider_error_leaves_session_unchanged() {
    let provider = MockServer::start().await;
    let harness = Harness::new(&provider.uri());
    let session = harness.session();

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": "invalid_grant",
            "error_description": "authorization code already used",
        })))
        .expect(1)
        .mount(&provider)
        .await;

    let url = harness.service.initiate(&session).await.unwrap();
    let params = CallbackParams {
        code: Some("USED-CODE".to_string()),
        state: Some(query_param(&url, "state")),
    };

    let err = harness
        .service
        .handle_callback(&session, params)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::OAuthProvider { .. }));
    assert!(err.is_external());

    let data = session.load().await.unwrap();
    assert!(data.pending.is_some());
    assert!(data.user_id.is_none());
}

#[tokio::test]
async fn test_expired_handshake_is_rejected_and_cleared() {
    let provider = MockServer::start().await;
    let harness = Harness::new(&provider.uri());
    let session = harness.session();

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("user-123", "alice")))
        .expect(0)
        .mount(&provider)
        .await;

    let url = harness.service.initiate(&session).await.unwrap();
    let state = query_param(&url, "state");

    // Age the pending pair past the configured TTL.
    harness
        .sessions
        .update(
            session.id(),
            Box::new(|data| {
                if let Some(pending) = data.pending.as_mut() {
                    pending.initiated_at -= time::Duration::seconds(700);
                }
            }),
        )
        .await
        .unwrap();

    let params = CallbackParams {
        code: Some("CODE-1".to_string()),
        state: Some(state),
    };
    let err = harness
        .service
        .handle_callback(&session, params)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::CsrfMismatch));

    // The stale pair is gone; replaying the same callback cannot reach the
    // exchange later either.
    let data = session.load().await.unwrap();
    assert!(data.pending.is_none());
}

#[tokio::test]
async fn test_reinitiation_overwrites_pending_pair() {
    let provider = MockServer::start().await;
    let harness = Harness::new(&provider.uri());
    let session = harness.session();

    let first_url = harness.service.initiate(&session).await.unwrap();
    let second_url = harness.service.initiate(&session).await.unwrap();
    let first_state = query_param(&first_url, "state");
    let second_state = query_param(&second_url, "state");
    assert_ne!(first_state, second_state);

    let data = session.load().await.unwrap();
    assert_eq!(data.pending.as_ref().unwrap().state.as_str(), second_state);

    // Only the newest pair validates.
    let err = harness
        .service
        .handle_callback(
            &session,
            CallbackParams {
                code: Some("CODE-1".to_string()),
                state: Some(first_state),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::CsrfMismatch));

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("user-123", "alice")))
        .expect(1)
        .mount(&provider)
        .await;

    let user = harness
        .service
        .handle_callback(
            &session,
            CallbackParams {
                code: Some("CODE-1".to_string()),
                state: Some(second_state),
            },
        )
        .await
        .unwrap();
    assert_eq!(user.subject, "user-123");
}

#[tokio::test]
async fn test_unauthenticated_session_fails_resolution_and_is_destroyed() {
    let provider = MockServer::start().await;
    let harness = Harness::new(&provider.uri());
    let session = harness.session();

    // A pending-only session has a record but no identity.
    harness.service.initiate(&session).await.unwrap();

    let err = harness.service.current_user(&session).await.unwrap_err();
    assert!(matches!(err, AuthError::Unauthenticated));
    assert!(err.requires_login());

    assert!(harness.sessions.load(session.id()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_deleted_user_fails_resolution_and_destroys_session() {
    let provider = MockServer::start().await;
    let harness = Harness::new(&provider.uri());
    let session = harness.session();

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("user-123", "alice")))
        .mount(&provider)
        .await;

    let url = harness.service.initiate(&session).await.unwrap();
    let user = harness
        .service
        .handle_callback(
            &session,
            CallbackParams {
                code: Some("CODE-1".to_string()),
                state: Some(query_param(&url, "state")),
            },
        )
        .await
        .unwrap();

    assert!(harness.users.remove(&user.id).await);

    let err = harness.service.current_user(&session).await.unwrap_err();
    assert!(matches!(err, AuthError::UserNotFound { .. }));
    assert!(harness.sessions.load(session.id()).await.unwrap().is_none());
}

/// Session store that refuses every read and write, for exercising the
/// store-failure paths.
struct UnavailableSessionStorage;

#[async_trait]
impl SessionStorage for UnavailableSessionStorage {
    async fn load(&self, _id: &SessionId) -> AuthResult<Option<SessionData>> {
        Err(AuthError::session_store("session store unavailable"))
    }

    async fn update(&self, _id: &SessionId, _mutator: SessionMutator<'_>) -> AuthResult<()> {
        Err(AuthError::session_store("session store unavailable"))
    }

    async fn delete(&self, _id: &SessionId) -> AuthResult<()> {
        Err(AuthError::session_store("session store unavailable"))
    }
}

#[tokio::test]
async fn test_initiate_aborts_when_pending_state_cannot_be_persisted() {
    let provider = MockServer::start().await;
    let harness = Harness::new(&provider.uri());

    let store: Arc<dyn SessionStorage> = Arc::new(UnavailableSessionStorage);
    let session = Session::new(SessionId::generate(), store);

    // No URL is handed out: the user agent must never be sent to the
    // provider with a nonce that was not persisted.
    let err = harness.service.initiate(&session).await.unwrap_err();
    assert!(matches!(err, AuthError::SessionStore { .. }));
    assert_eq!(RedirectTarget::for_error(&err), RedirectTarget::Login);
}

#[tokio::test]
async fn test_callback_propagates_store_failure_without_network() {
    let provider = MockServer::start().await;
    let harness = Harness::new(&provider.uri());

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("user-123", "alice")))
        .expect(0)
        .mount(&provider)
        .await;

    let store: Arc<dyn SessionStorage> = Arc::new(UnavailableSessionStorage);
    let session = Session::new(SessionId::generate(), store);

    let params = CallbackParams {
        code: Some("CODE-1".to_string()),
        state: Some("S1".to_string()),
    };
    let err = harness
        .service
        .handle_callback(&session, params)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::SessionStore { .. }));
    assert_eq!(RedirectTarget::for_error(&err), RedirectTarget::Login);
}

#[tokio::test]
async fn test_authenticated_session_cannot_be_refinalized() {
    let provider = MockServer::start().await;
    let harness = Harness::new(&provider.uri());
    let session = harness.session();

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("user-123", "alice")))
        .expect(1)
        .mount(&provider)
        .await;

    let url = harness.service.initiate(&session).await.unwrap();
    let user = harness
        .service
        .handle_callback(
            &session,
            CallbackParams {
                code: Some("CODE-1".to_string()),
                state: Some(query_param(&url, "state")),
            },
        )
        .await
        .unwrap();

    // A second initiate while logged in writes a new pending pair, but its
    // callback is rejected: the session keeps its identity until logout.
    let second_url = harness.service.initiate(&session).await.unwrap();
    let err = harness
        .service
        .handle_callback(
            &session,
            CallbackParams {
                code: Some("CODE-2".to_string()),
                state: Some(query_param(&second_url, "state")),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::CsrfMismatch));

    let data = session.load().await.unwrap();
    assert_eq!(HandshakeState::of(&data), HandshakeState::Authenticated);
    assert_eq!(data.user_id.as_deref(), Some(user.id.as_str()));
}

#[tokio::test]
async fn test_logout_destroys_session() {
    let provider = MockServer::start().await;
    let harness = Harness::new(&provider.uri());
    let session = harness.session();

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("user-123", "alice")))
        .mount(&provider)
        .await;

    let url = harness.service.initiate(&session).await.unwrap();
    harness
        .service
        .handle_callback(
            &session,
            CallbackParams {
                code: Some("CODE-1".to_string()),
                state: Some(query_param(&url, "state")),
            },
        )
        .await
        .unwrap();

    harness.service.logout(&session).await.unwrap();

    assert!(harness.sessions.load(session.id()).await.unwrap().is_none());
    let err = harness.service.current_user(&session).await.unwrap_err();
    assert!(matches!(err, AuthError::Unauthenticated));
}
