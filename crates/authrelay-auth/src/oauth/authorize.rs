//! Authorization request URL construction.
//!
//! Builds the redirect-out URL for the identity provider's authorize
//! endpoint. Pure URL assembly; no network I/O happens here.

use url::Url;

use super::nonce::StateToken;
use super::pkce::PkceChallenge;
use crate::config::ProviderConfig;

/// Scope requested from the identity provider.
const SCOPE: &str = "openid";

/// Builds the authorization URL the user agent is redirected to.
///
/// Embeds the CSRF `state` and the PKCE challenge (`S256`). The verifier
/// itself is never part of this URL; only its one-way hash travels to the
/// provider.
///
/// # Errors
///
/// Returns an error if the provider endpoint URL does not parse, which a
/// validated [`crate::config::AuthConfig`] rules out.
pub fn build_authorization_url(
    provider: &ProviderConfig,
    redirect_uri: &Url,
    state: &StateToken,
    challenge: &PkceChallenge,
) -> Result<Url, url::ParseError> {
    let mut url = provider.authorize_endpoint()?;
    url.query_pairs_mut()
        .append_pair("response_type", "code")
        .append_pair("client_id", &provider.client_id)
        .append_pair("redirect_uri", redirect_uri.as_str())
        .append_pair("scope", SCOPE)
        .append_pair("state", state.as_str())
        .append_pair("code_challenge_method", "S256")
        .append_pair("code_challenge", challenge.as_str());
    Ok(url)
}
