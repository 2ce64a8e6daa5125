//! Google OAuth and Calendar API configuration.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{ProviderError, ProviderResult};

/// OAuth 2.0 client credentials.
///
/// Users register their own desktop client in the Google Cloud Console.
#[derive(Clone)]
pub struct OAuthCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl std::fmt::Debug for OAuthCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// Structure of Google's OAuth credentials JSON file.
///
/// Supports the Cloud Console download (`installed` or `web` section) and a
/// flat `{client_id, client_secret}` object.
#[derive(Debug, Deserialize)]
struct GoogleCredentialsFile {
    installed: Option<NestedCredentials>,
    web: Option<NestedCredentials>,
    client_id: Option<String>,
    client_secret: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NestedCredentials {
    client_id: String,
    client_secret: String,
}

impl OAuthCredentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    /// Loads credentials from a Google Cloud Console JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> ProviderResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ProviderError::configuration(format!(
                "failed to read credentials file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json(&content)
    }

    /// Parses credentials from JSON.
    pub fn from_json(json: &str) -> ProviderResult<Self> {
        let file: GoogleCredentialsFile = serde_json::from_str(json).map_err(|e| {
            ProviderError::configuration(format!("failed to parse credentials JSON: {}", e))
        })?;

        if let Some(creds) = file.installed.or(file.web) {
            return Ok(Self::new(creds.client_id, creds.client_secret));
        }

        if let (Some(client_id), Some(client_secret)) = (file.client_id, file.client_secret) {
            return Ok(Self::new(client_id, client_secret));
        }

        Err(ProviderError::configuration(
            "credentials file must contain an 'installed'/'web' section or 'client_id'/'client_secret' at root level",
        ))
    }

    /// Checks that the credentials look like a Google desktop client.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.client_id.is_empty() {
            return Err("client_id is required");
        }
        if !self.client_id.ends_with(".apps.googleusercontent.com") {
            return Err("client_id should end with .apps.googleusercontent.com");
        }
        if self.client_secret.is_empty() {
            return Err("client_secret is required");
        }
        Ok(())
    }
}

/// Configuration for the Google session manager and calendar fetcher.
#[derive(Debug, Clone)]
pub struct GoogleConfig {
    pub credentials: OAuthCredentials,
    /// Authorization endpoint opened in the browser.
    pub auth_url: String,
    /// Token endpoint for code exchange and refresh.
    pub token_url: String,
    /// Profile endpoint used to look up the account email.
    pub userinfo_url: String,
    /// Base URL of the Calendar API v3.
    pub calendar_api_base: String,
    /// Loopback port for the OAuth redirect. `0` picks a free port.
    pub callback_port: u16,
    pub callback_path: String,
    pub scopes: Vec<String>,
    /// HTTP request timeout.
    pub timeout: Duration,
    /// How long sign-in waits for the browser redirect.
    pub callback_timeout: Duration,
    pub calendar_id: String,
    pub max_results: u32,
    pub user_agent: String,
}

impl GoogleConfig {
    pub const DEFAULT_AUTH_URL: &'static str = "https://accounts.google.com/o/oauth2/v2/auth";
    pub const DEFAULT_TOKEN_URL: &'static str = "https://oauth2.googleapis.com/token";
    pub const DEFAULT_USERINFO_URL: &'static str = "https://www.googleapis.com/oauth2/v2/userinfo";
    pub const DEFAULT_CALENDAR_API_BASE: &'static str = "https://www.googleapis.com/calendar/v3";
    pub const DEFAULT_CALLBACK_PORT: u16 = 51280;
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
    pub const DEFAULT_CALLBACK_TIMEOUT_SECS: u64 = 300;
    pub const CALENDAR_SCOPE: &'static str = "https://www.googleapis.com/auth/calendar.readonly";
    pub const EMAIL_SCOPE: &'static str = "https://www.googleapis.com/auth/userinfo.email";

    pub fn new(credentials: OAuthCredentials) -> Self {
        Self {
            credentials,
            auth_url: Self::DEFAULT_AUTH_URL.to_string(),
            token_url: Self::DEFAULT_TOKEN_URL.to_string(),
            userinfo_url: Self::DEFAULT_USERINFO_URL.to_string(),
            calendar_api_base: Self::DEFAULT_CALENDAR_API_BASE.to_string(),
            callback_port: Self::DEFAULT_CALLBACK_PORT,
            callback_path: "/callback".to_string(),
            scopes: Self::default_scopes(),
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
            callback_timeout: Duration::from_secs(Self::DEFAULT_CALLBACK_TIMEOUT_SECS),
            calendar_id: "primary".to_string(),
            max_results: 50,
            user_agent: format!("timedonut/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    pub fn default_scopes() -> Vec<String> {
        vec![Self::CALENDAR_SCOPE.to_string(), Self::EMAIL_SCOPE.to_string()]
    }

    /// Redirect URI registered for the loopback listener on `port`.
    pub fn redirect_uri(&self, port: u16) -> String {
        format!("http://localhost:{}{}", port, self.callback_path)
    }

    pub fn with_callback_port(mut self, port: u16) -> Self {
        self.callback_port = port;
        self
    }

    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_callback_timeout(mut self, timeout: Duration) -> Self {
        self.callback_timeout = timeout;
        self
    }

    pub fn with_calendar_id(mut self, calendar_id: impl Into<String>) -> Self {
        self.calendar_id = calendar_id.into();
        self
    }

    /// Points every endpoint at `base`, for tests against a local server.
    pub fn with_base_url(mut self, base: &str) -> Self {
        let base = base.trim_end_matches('/');
        self.auth_url = format!("{}/o/oauth2/v2/auth", base);
        self.token_url = format!("{}/token", base);
        self.userinfo_url = format!("{}/oauth2/v2/userinfo", base);
        self.calendar_api_base = format!("{}/calendar/v3", base);
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), String> {
        self.credentials.validate().map_err(String::from)?;
        if self.scopes.is_empty() {
            return Err("at least one OAuth scope is required".to_string());
        }
        if !self.callback_path.starts_with('/') {
            return Err("callback path must start with '/'".to_string());
        }
        if self.max_results == 0 {
            return Err("max_results must be positive".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds() -> OAuthCredentials {
        OAuthCredentials::new("123.apps.googleusercontent.com", "secret")
    }

    #[test]
    fn credentials_from_installed_json() {
        let json = r#"{"installed":{"client_id":"abc.apps.googleusercontent.com","client_secret":"s","project_id":"p"}}"#;
        let creds = OAuthCredentials::from_json(json).unwrap();
        assert_eq!(creds.client_id, "abc.apps.googleusercontent.com");
        assert_eq!(creds.client_secret, "s");
    }

    #[test]
    fn credentials_from_flat_json() {
        let json = r#"{"client_id":"abc.apps.googleusercontent.com","client_secret":"s"}"#;
        assert!(OAuthCredentials::from_json(json).is_ok());
    }

    #[test]
    fn credentials_missing_fields() {
        let err = OAuthCredentials::from_json(r#"{"client_id":"abc"}"#).unwrap_err();
        assert_eq!(err.code(), crate::ProviderErrorCode::ConfigurationError);
    }

    #[test]
    fn credentials_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.json");
        std::fs::write(
            &path,
            r#"{"web":{"client_id":"w.apps.googleusercontent.com","client_secret":"ws"}}"#,
        )
        .unwrap();
        assert_eq!(
            OAuthCredentials::from_file(&path).unwrap().client_secret,
            "ws"
        );
        assert!(OAuthCredentials::from_file(dir.path().join("missing.json")).is_err());
    }

    #[test]
    fn credentials_debug_redacts_secret() {
        let debug = format!("{:?}", creds());
        assert!(!debug.contains("\"secret\""));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn credential_validation() {
        assert!(creds().validate().is_ok());
        assert!(OAuthCredentials::new("", "s").validate().is_err());
        assert!(OAuthCredentials::new("bad-id", "s").validate().is_err());
        assert!(OAuthCredentials::new("a.apps.googleusercontent.com", "").validate().is_err());
    }

    #[test]
    fn defaults() {
        let config = GoogleConfig::new(creds());
        assert_eq!(config.callback_port, 51280);
        assert_eq!(config.redirect_uri(51280), "http://localhost:51280/callback");
        assert_eq!(config.callback_timeout, Duration::from_secs(300));
        assert_eq!(config.max_results, 50);
        assert_eq!(config.scopes.len(), 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn base_url_override() {
        let config = GoogleConfig::new(creds()).with_base_url("http://127.0.0.1:9999/");
        assert_eq!(config.token_url, "http://127.0.0.1:9999/token");
        assert_eq!(config.calendar_api_base, "http://127.0.0.1:9999/calendar/v3");
    }

    #[test]
    fn validation_rejects_empty_scopes() {
        let config = GoogleConfig::new(creds()).with_scopes(vec![]);
        assert!(config.validate().is_err());
    }
}
