//! OAuth 2.0 authorization-code and refresh grants against Google.
//!
//! Desktop flow with a loopback redirect:
//!
//! 1. Build the consent URL with a random per-attempt `state`
//! 2. The browser redirects to the local callback listener with a code
//! 3. Exchange the code for access and refresh tokens
//! 4. Refresh the access token with the refresh token when it nears expiry

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Duration, Utc};
use rand::Rng as _;
use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use crate::error::{ProviderError, ProviderResult};

use super::config::{GoogleConfig, OAuthCredentials};

/// Bytes of entropy in the `state` parameter.
const STATE_LENGTH: usize = 16;

/// Lifetime assumed when the token endpoint omits `expires_in`.
const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

/// Tokens returned by the token endpoint.
#[derive(Clone, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    /// Present on code exchange; present on refresh only when rotated.
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub token_type: Option<String>,
}

impl TokenGrant {
    /// Absolute expiry for a grant received at `now`.
    pub fn expires_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + Duration::seconds(self.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS))
    }
}

impl std::fmt::Debug for TokenGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenGrant")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("expires_in", &self.expires_in)
            .field("token_type", &self.token_type)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    email: Option<String>,
}

/// OAuth client for Google's token and userinfo endpoints.
#[derive(Debug)]
pub struct OAuthClient {
    credentials: OAuthCredentials,
    auth_url: String,
    token_url: String,
    userinfo_url: String,
    scopes: Vec<String>,
    http_client: reqwest::Client,
}

impl OAuthClient {
    pub fn new(config: &GoogleConfig) -> ProviderResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| ProviderError::internal("failed to create HTTP client").with_source(e))?;

        Ok(Self {
            credentials: config.credentials.clone(),
            auth_url: config.auth_url.clone(),
            token_url: config.token_url.clone(),
            userinfo_url: config.userinfo_url.clone(),
            scopes: config.scopes.clone(),
            http_client,
        })
    }

    /// Generates a random state string for CSRF protection.
    pub fn generate_state() -> String {
        let mut rng = rand::rng();
        let bytes: Vec<u8> = (0..STATE_LENGTH).map(|_| rng.random()).collect();
        URL_SAFE_NO_PAD.encode(&bytes)
    }

    /// Builds the consent page URL.
    ///
    /// Requests offline access and forces the consent prompt so Google
    /// always returns a refresh token.
    pub fn authorization_url(&self, redirect_uri: &str, state: &str) -> ProviderResult<String> {
        let scope = self.scopes.join(" ");
        let url = Url::parse_with_params(
            &self.auth_url,
            &[
                ("client_id", self.credentials.client_id.as_str()),
                ("redirect_uri", redirect_uri),
                ("response_type", "code"),
                ("scope", scope.as_str()),
                ("access_type", "offline"),
                ("prompt", "consent"),
                ("state", state),
            ],
        )
        .map_err(|e| {
            ProviderError::configuration(format!("invalid authorization URL: {}", e)).with_source(e)
        })?;
        Ok(url.into())
    }

    /// Exchanges an authorization code for tokens.
    pub async fn exchange_code(&self, code: &str, redirect_uri: &str) -> ProviderResult<TokenGrant> {
        let params = [
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", redirect_uri),
        ];

        let grant = self.post_token(&params, "token exchange").await?;
        info!("obtained tokens from authorization code");
        Ok(grant)
    }

    /// Obtains a new access token from a refresh token.
    pub async fn refresh(&self, refresh_token: &str) -> ProviderResult<TokenGrant> {
        let params = [
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];

        let grant = self.post_token(&params, "token refresh").await?;
        info!(
            rotated = grant.refresh_token.is_some(),
            "refreshed access token"
        );
        Ok(grant)
    }

    /// Looks up the email address of the signed-in account.
    pub async fn fetch_email(&self, access_token: &str) -> ProviderResult<String> {
        let response = self
            .http_client
            .get(&self.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::network(format!("failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(ProviderError::authentication(format!(
                "userinfo request failed ({})",
                status
            )));
        }

        let info: UserInfo = serde_json::from_str(&body).map_err(|e| {
            ProviderError::invalid_response(format!("invalid userinfo response: {}", e))
        })?;
        info.email
            .ok_or_else(|| ProviderError::invalid_response("userinfo response has no email"))
    }

    async fn post_token(&self, params: &[(&str, &str)], what: &str) -> ProviderResult<TokenGrant> {
        debug!(url = %self.token_url, "{} request", what);
        let response = self
            .http_client
            .post(&self.token_url)
            .form(params)
            .send()
            .await?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::network(format!("failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(ProviderError::authentication(format!(
                "{} failed ({}): {}",
                what,
                status,
                error_summary(&body)
            )));
        }

        serde_json::from_str(&body).map_err(|e| {
            ProviderError::invalid_response(format!("invalid token response: {}", e))
        })
    }
}

/// Extracts `error` / `error_description` from an OAuth error body.
fn error_summary(body: &str) -> String {
    #[derive(Deserialize)]
    struct OAuthErrorBody {
        error: String,
        error_description: Option<String>,
    }

    match serde_json::from_str::<OAuthErrorBody>(body) {
        Ok(OAuthErrorBody {
            error,
            error_description: Some(description),
        }) => format!("{}: {}", error, description),
        Ok(OAuthErrorBody { error, .. }) => error,
        Err(_) => body.chars().take(200).collect(),
    }
}
