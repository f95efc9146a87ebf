//! Authentication configuration.
//!
//! Configuration is either deserialized from the application's config file
//! or loaded from the environment with [`AuthConfig::from_env`]. Both paths
//! go through [`AuthConfig::validate`], which fails fast on missing or
//! malformed values instead of letting an empty identifier degrade into a
//! malformed provider URL at redirect time.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

/// Default lifetime of a pending handshake (state + verifier pair).
pub const DEFAULT_HANDSHAKE_TTL: Duration = Duration::from_secs(600);

/// Default timeout for the server-to-server token exchange request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Root configuration for the login handshake.
///
/// # Example (TOML)
///
/// ```toml
/// [auth]
/// redirect_uri = "https://app.example.com/auth/callback"
/// handshake_ttl = "10m"
///
/// [auth.provider]
/// base_url = "https://id.example.com"
/// tenant = "tenant-1"
/// realm = "main"
/// application = "webapp"
/// client_id = "my-client"
/// client_secret = "s3cret"
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    /// Identity provider endpoints and credentials.
    pub provider: ProviderConfig,

    /// The application's registered redirect URI (the callback endpoint).
    pub redirect_uri: Url,

    /// Application routes used as redirect targets.
    #[serde(default)]
    pub routes: RouteConfig,

    /// Session cookie settings.
    #[serde(default)]
    pub cookie: CookieConfig,

    /// How long a pending handshake stays exchangeable.
    ///
    /// A callback arriving after this window is rejected and the stale
    /// state/verifier pair is cleared.
    #[serde(default = "default_handshake_ttl", with = "humantime_serde")]
    pub handshake_ttl: Duration,

    /// Timeout for the token exchange HTTP request.
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,
}

fn default_handshake_ttl() -> Duration {
    DEFAULT_HANDSHAKE_TTL
}

fn default_request_timeout() -> Duration {
    DEFAULT_REQUEST_TIMEOUT
}

/// Identity provider configuration.
///
/// The provider's endpoints are addressed per tenant, realm, and
/// application: `{base_url}/v1/tenants/{tenant}/realms/{realm}/applications/{application}/...`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderConfig {
    /// Base URL of the identity provider.
    pub base_url: Url,

    /// Tenant identifier at the provider.
    pub tenant: String,

    /// Realm identifier within the tenant.
    pub realm: String,

    /// Application identifier within the realm.
    pub application: String,

    /// OAuth client id registered with the provider.
    pub client_id: String,

    /// OAuth client secret, used for HTTP Basic auth at the token endpoint.
    pub client_secret: String,
}

impl ProviderConfig {
    fn endpoint(&self, leaf: &str) -> Result<Url, url::ParseError> {
        Url::parse(&format!(
            "{}/v1/tenants/{}/realms/{}/applications/{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            self.tenant,
            self.realm,
            self.application,
            leaf
        ))
    }

    /// The provider's authorize endpoint for this application.
    ///
    /// # Errors
    ///
    /// Returns an error if the assembled URL does not parse, which cannot
    /// happen for a validated configuration.
    pub fn authorize_endpoint(&self) -> Result<Url, url::ParseError> {
        self.endpoint("authorize")
    }

    /// The provider's token endpoint for this application.
    ///
    /// # Errors
    ///
    /// Returns an error if the assembled URL does not parse, which cannot
    /// happen for a validated configuration.
    pub fn token_endpoint(&self) -> Result<Url, url::ParseError> {
        self.endpoint("token")
    }
}

/// Application routes used as redirect targets after the handshake.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RouteConfig {
    /// The application's main entry point, used after successful login and
    /// for recoverable handshake failures.
    pub home: String,

    /// The login entry point, used after logout and failed session
    /// resolution.
    pub login: String,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            home: "/".to_string(),
            login: "/login".to_string(),
        }
    }
}

/// Session cookie settings.
///
/// The cookie carries only the opaque session id; session data lives in the
/// server-side store.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CookieConfig {
    /// Cookie name.
    pub name: String,

    /// Set the `Secure` attribute. Disable only for local development.
    pub secure: bool,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            name: "relay_session".to_string(),
            secure: true,
        }
    }
}

/// Configuration validation and loading errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// A required configuration value is missing.
    #[error("Missing required configuration: {0}")]
    Missing(String),
}

impl AuthConfig {
    /// Loads the configuration from environment variables.
    ///
    /// Required: `AUTH_PROVIDER_URL`, `AUTH_TENANT`, `AUTH_REALM`,
    /// `AUTH_APPLICATION`, `AUTH_CLIENT_ID`, `AUTH_CLIENT_SECRET`,
    /// `AUTH_REDIRECT_URI`. All other settings take their defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` for any absent variable and
    /// `ConfigError::InvalidValue` if a URL does not parse or validation
    /// fails. Absent configuration is a startup failure, never a malformed
    /// provider URL at redirect time.
    pub fn from_env() -> Result<Self, ConfigError> {
        fn required(name: &str) -> Result<String, ConfigError> {
            match std::env::var(name) {
                Ok(value) if !value.is_empty() => Ok(value),
                _ => Err(ConfigError::Missing(name.to_string())),
            }
        }

        fn parse_url(name: &str, value: &str) -> Result<Url, ConfigError> {
            Url::parse(value)
                .map_err(|e| ConfigError::InvalidValue(format!("{name}: {e}")))
        }

        let base_url = required("AUTH_PROVIDER_URL")?;
        let redirect_uri = required("AUTH_REDIRECT_URI")?;

        let config = Self {
            provider: ProviderConfig {
                base_url: parse_url("AUTH_PROVIDER_URL", &base_url)?,
                tenant: required("AUTH_TENANT")?,
                realm: required("AUTH_REALM")?,
                application: required("AUTH_APPLICATION")?,
                client_id: required("AUTH_CLIENT_ID")?,
                client_secret: required("AUTH_CLIENT_SECRET")?,
            },
            redirect_uri: parse_url("AUTH_REDIRECT_URI", &redirect_uri)?,
            routes: RouteConfig::default(),
            cookie: CookieConfig::default(),
            handshake_ttl: DEFAULT_HANDSHAKE_TTL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if:
    /// - Any provider identifier or credential is empty
    /// - The redirect URI is not http(s)
    /// - A timeout or TTL is zero
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("provider.tenant", &self.provider.tenant),
            ("provider.realm", &self.provider.realm),
            ("provider.application", &self.provider.application),
            ("provider.client_id", &self.provider.client_id),
            ("provider.client_secret", &self.provider.client_secret),
        ] {
            if value.is_empty() {
                return Err(ConfigError::InvalidValue(format!(
                    "{name} cannot be empty"
                )));
            }
        }

        if !matches!(self.redirect_uri.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidValue(format!(
                "redirect_uri must be http(s), got '{}'",
                self.redirect_uri.scheme()
            )));
        }

        if self.handshake_ttl.is_zero() {
            return Err(ConfigError::InvalidValue(
                "handshake_ttl must be > 0".to_string(),
            ));
        }

        if self.request_timeout.is_zero() {
            return Err(ConfigError::InvalidValue(
                "request_timeout must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}
