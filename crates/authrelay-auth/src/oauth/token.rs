//! Authorization-code-for-token exchange.
//!
//! A single server-to-server POST to the provider's token endpoint with
//! HTTP Basic client authentication and a form-urlencoded body. The request
//! carries a bounded timeout and is never retried: an authorization code is
//! single-use, so a retry could not succeed anyway.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::Deserialize;
use url::Url;

use super::pkce::PkceVerifier;
use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::AuthResult;

/// Client for the provider's token endpoint.
pub struct TokenExchangeClient {
    http: reqwest::Client,
    token_endpoint: Url,
    client_id: String,
    client_secret: String,
    redirect_uri: Url,
}

impl TokenExchangeClient {
    /// Creates a token exchange client from the auth configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the token endpoint URL cannot be
    /// assembled or the HTTP client cannot be built.
    pub fn new(config: &AuthConfig) -> AuthResult<Self> {
        let token_endpoint = config
            .provider
            .token_endpoint()
            .map_err(|e| AuthError::configuration(format!("token endpoint: {e}")))?;

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AuthError::configuration(format!("http client: {e}")))?;

        Ok(Self {
            http,
            token_endpoint,
            client_id: config.provider.client_id.clone(),
            client_secret: config.provider.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
        })
    }

    /// Exchanges an authorization code (plus the stored PKCE verifier) for
    /// tokens.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::OAuthProvider` when the provider answers with a
    /// structured OAuth error, and `AuthError::TokenExchange` for any other
    /// non-2xx status, network failure, or malformed response body. The
    /// caller's session is not touched by this method.
    pub async fn exchange(&self, code: &str, verifier: &PkceVerifier) -> AuthResult<TokenResponse> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("code_verifier", verifier.as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
        ];

        tracing::debug!(endpoint = %self.token_endpoint, "exchanging authorization code");

        let response = self
            .http
            .post(self.token_endpoint.clone())
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if let Ok(oauth_error) = serde_json::from_str::<OAuthErrorResponse>(&body) {
                return Err(AuthError::oauth_provider(
                    oauth_error.error,
                    oauth_error.error_description.unwrap_or_default(),
                ));
            }
            return Err(AuthError::token_exchange(format!("HTTP {status} - {body}")));
        }

        let tokens: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::token_exchange(format!("malformed token response: {e}")))?;

        if tokens.access_token.is_empty() {
            return Err(AuthError::token_exchange(
                "provider returned an empty access token",
            ));
        }

        Ok(tokens)
    }
}

/// Token response from the identity provider.
///
/// Beyond existence checks and identity extraction, the fields are opaque
/// to the handshake; none of them is persisted into the session.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    /// The access token.
    pub access_token: String,

    /// The token type (usually "Bearer").
    pub token_type: String,

    /// Token lifetime in seconds.
    pub expires_in: Option<u64>,

    /// Granted scopes.
    pub scope: Option<String>,

    /// The ID token (JWT) carrying the user's identity claims.
    pub id_token: Option<String>,
}

impl TokenResponse {
    /// Extracts the provider-issued identity claims from the ID token.
    ///
    /// The payload segment is decoded without signature verification: the
    /// token arrived moments ago over the direct TLS channel from the
    /// provider's token endpoint, authenticated with the client secret.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::TokenExchange` if the response carries no ID
    /// token or its payload cannot be decoded.
    pub fn identity_claims(&self) -> AuthResult<IdentityClaims> {
        let id_token = self
            .id_token
            .as_deref()
            .ok_or_else(|| AuthError::token_exchange("token response carried no id_token"))?;

        let payload = id_token
            .split('.')
            .nth(1)
            .ok_or_else(|| AuthError::token_exchange("id_token is not a JWT"))?;

        let bytes = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|e| AuthError::token_exchange(format!("id_token payload: {e}")))?;

        let claims: IdentityClaims = serde_json::from_slice(&bytes)
            .map_err(|e| AuthError::token_exchange(format!("id_token claims: {e}")))?;

        if claims.sub.is_empty() {
            return Err(AuthError::token_exchange("id_token carried an empty subject"));
        }

        Ok(claims)
    }
}

/// Identity claims extracted from the provider's ID token.
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityClaims {
    /// Provider-issued subject identifier. The user persistence layer is
    /// keyed by this value.
    pub sub: String,

    /// Preferred username, if the provider supplies one.
    pub preferred_username: Option<String>,

    /// Email address, if the provider supplies one.
    pub email: Option<String>,
}

impl IdentityClaims {
    /// The best available display username: preferred username, then email,
    /// then the subject itself.
    #[must_use]
    pub fn username(&self) -> &str {
        self.preferred_username
            .as_deref()
            .or(self.email.as_deref())
            .unwrap_or(&self.sub)
    }
}

/// Structured OAuth error body from the provider.
#[derive(Debug, Deserialize)]
struct OAuthErrorResponse {
    error: String,
    error_description: Option<String>,
}
