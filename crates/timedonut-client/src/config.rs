//! Client configuration.
//!
//! All settings live in `~/.config/timedonut/config.toml` by default.
//!
//! Credential values (`client_id`, `client_secret`) support secret references:
//! - `pass::path/in/store`: resolved via `pass show`
//! - `env::VAR_NAME`: resolved from the environment
//! - plain text: used as-is

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use timedonut_core::DisplayOptions;
use timedonut_engine::EngineConfig;
use timedonut_providers::google::{GoogleConfig, OAuthCredentials};
use timedonut_providers::{FileTokenStore, MemoryTokenStore, TokenStore};

use crate::error::{ClientError, ClientResult};
use crate::secret;

// ---------------------------------------------------------------------------
// ClientConfig (config.toml)
// ---------------------------------------------------------------------------

/// Configuration for the timedonut client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Debug mode.
    pub debug: bool,

    /// Log format: `pretty`, `compact` or `json`.
    pub log_format: Option<String>,

    /// Google account settings.
    pub google: Option<GoogleSettings>,

    /// Where tokens are kept.
    pub store: StoreSettings,

    /// Status line settings.
    pub display: DisplayOptions,

    /// Timer periods.
    pub engine: EngineSettings,
}

impl ClientConfig {
    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read config {}: {}", path.display(), e))?;
        toml::from_str(&content).map_err(|e| format!("failed to parse config: {}", e))
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }

    /// Returns the default configuration directory.
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("timedonut")
    }

    /// Google settings, or the defaults when the section is missing.
    pub fn google_settings(&self) -> GoogleSettings {
        self.google.clone().unwrap_or_default()
    }

    /// Checks everything that can be checked without the network.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(ref format) = self.log_format {
            format.parse::<timedonut_core::TracingOutputFormat>()?;
        }
        self.engine.to_engine_config(&self.display).validate().map_err(|e| e.to_string())?;
        if let Some(ref google) = self.google
            && (google.client_id.is_some() || google.client_secret.is_some())
        {
            google.to_provider_config()?;
        }
        Ok(())
    }

    /// Writes Google credentials into the `[google]` table of the file at
    /// `path`, keeping every other key and comment.
    pub fn save_google_credentials(
        path: &Path,
        client_id: &str,
        client_secret: &str,
    ) -> Result<(), String> {
        let content = if path.exists() {
            std::fs::read_to_string(path)
                .map_err(|e| format!("failed to read {}: {}", path.display(), e))?
        } else {
            String::new()
        };

        let mut doc = content
            .parse::<toml_edit::DocumentMut>()
            .map_err(|e| format!("could not parse {} for writing: {}", path.display(), e))?;

        if !doc.contains_key("google") {
            doc["google"] = toml_edit::Item::Table(toml_edit::Table::new());
        }
        let google = doc["google"]
            .as_table_mut()
            .ok_or_else(|| "[google] in config.toml is not a table".to_string())?;
        google["client_id"] = toml_edit::value(client_id);
        google["client_secret"] = toml_edit::value(client_secret);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("could not create {}: {}", parent.display(), e))?;
        }
        std::fs::write(path, doc.to_string())
            .map_err(|e| format!("could not write {}: {}", path.display(), e))
    }
}

// ---------------------------------------------------------------------------
// GoogleSettings
// ---------------------------------------------------------------------------

/// Google OAuth and Calendar settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleSettings {
    /// OAuth client ID (supports `pass::` and `env::` prefixes).
    pub client_id: Option<String>,

    /// OAuth client secret (supports `pass::` and `env::` prefixes).
    pub client_secret: Option<String>,

    /// Loopback port registered as the redirect URI.
    pub callback_port: u16,

    pub scopes: Vec<String>,

    pub calendar_id: String,

    /// HTTP timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for GoogleSettings {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            callback_port: GoogleConfig::DEFAULT_CALLBACK_PORT,
            scopes: GoogleConfig::default_scopes(),
            calendar_id: "primary".to_string(),
            timeout_secs: GoogleConfig::DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl GoogleSettings {
    /// Resolves credentials and builds the provider configuration.
    pub fn to_provider_config(&self) -> Result<GoogleConfig, String> {
        let credentials = self.resolve_credentials()?;
        self.provider_config(credentials)
    }

    /// Builds the provider configuration around already-resolved credentials.
    pub fn provider_config(&self, credentials: OAuthCredentials) -> Result<GoogleConfig, String> {
        let mut config = GoogleConfig::new(credentials)
            .with_callback_port(self.callback_port)
            .with_calendar_id(self.calendar_id.clone())
            .with_timeout(Duration::from_secs(self.timeout_secs));
        if !self.scopes.is_empty() {
            config = config.with_scopes(self.scopes.clone());
        }
        config.validate()?;
        Ok(config)
    }

    /// Resolves OAuth credentials from the inline fields.
    pub fn resolve_credentials(&self) -> Result<OAuthCredentials, String> {
        let raw_id = self.client_id.as_deref().ok_or_else(|| {
            format!(
                "Google credentials not found. Add to {}:\n  \
                 [google]\n  \
                 client_id = \"YOUR_ID.apps.googleusercontent.com\"\n  \
                 client_secret = \"YOUR_SECRET\"\n\n  \
                 Or run: timedonut auth --credentials-file <path>",
                ClientConfig::default_path().display()
            )
        })?;
        let raw_secret = self
            .client_secret
            .as_deref()
            .ok_or_else(|| "client_secret is missing from [google] in config.toml".to_string())?;

        let client_id =
            secret::resolve(raw_id).map_err(|e| format!("failed to resolve client_id: {}", e))?;
        let client_secret = secret::resolve(raw_secret)
            .map_err(|e| format!("failed to resolve client_secret: {}", e))?;
        Ok(OAuthCredentials::new(client_id, client_secret))
    }
}

// ---------------------------------------------------------------------------
// StoreSettings
// ---------------------------------------------------------------------------

/// Token store backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// OS keychain.
    #[default]
    Keyring,
    /// JSON file with owner-only permissions.
    File,
    /// Process memory; nothing survives exit.
    Memory,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub backend: StoreBackend,
    /// Token file for the `file` backend. `~/` is expanded.
    pub path: Option<PathBuf>,
}

impl StoreSettings {
    /// Opens the configured backend.
    pub fn open(&self) -> ClientResult<Arc<dyn TokenStore>> {
        match self.backend {
            #[cfg(feature = "keychain")]
            StoreBackend::Keyring => Ok(Arc::new(timedonut_providers::KeyringTokenStore::default())),
            #[cfg(not(feature = "keychain"))]
            StoreBackend::Keyring => Err(ClientError::config(
                "this build has no keychain support; set [store] backend = \"file\"",
            )),
            StoreBackend::File => {
                let path = self
                    .path
                    .as_deref()
                    .map(expand_home)
                    .unwrap_or_else(FileTokenStore::default_path);
                Ok(Arc::new(FileTokenStore::open(path)?))
            }
            StoreBackend::Memory => Ok(Arc::new(MemoryTokenStore::new())),
        }
    }
}

/// Expands a leading `~/` to the home directory.
pub fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}

// ---------------------------------------------------------------------------
// EngineSettings
// ---------------------------------------------------------------------------

/// Timer periods for the `watch` command.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub countdown_interval_ms: u64,
    pub refresh_interval_secs: u64,
    pub marquee_interval_ms: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            countdown_interval_ms: 1000,
            refresh_interval_secs: 300,
            marquee_interval_ms: 500,
        }
    }
}

impl EngineSettings {
    pub fn to_engine_config(&self, display: &DisplayOptions) -> EngineConfig {
        EngineConfig::default()
            .with_countdown_interval(Duration::from_millis(self.countdown_interval_ms))
            .with_refresh_interval(Duration::from_secs(self.refresh_interval_secs))
            .with_marquee_interval(Duration::from_millis(self.marquee_interval_ms))
            .with_display(display.clone())
    }
}
