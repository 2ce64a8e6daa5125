//! Configuration commands.

use std::path::Path;

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::secret::SecretRef;

/// Dumps the effective configuration with plain-text secrets masked.
pub fn dump(config: &ClientConfig, path: &Path) -> ClientResult<()> {
    let toml_str = toml::to_string_pretty(&redacted(config))
        .map_err(|e| ClientError::config(format!("failed to serialize config: {}", e)))?;
    println!("# config.toml ({})", path.display());
    println!("{}", toml_str);
    Ok(())
}

/// Validates the configuration.
pub fn validate(config: &ClientConfig) -> ClientResult<()> {
    config.validate().map_err(ClientError::Config)?;
    if config.google.is_some() {
        println!("Google settings are valid.");
    }
    println!("Configuration is valid.");
    Ok(())
}

/// Shows the configuration file path.
pub fn path(path: &Path) -> ClientResult<()> {
    println!("config: {}", path.display());
    Ok(())
}

fn redacted(config: &ClientConfig) -> ClientConfig {
    let mut config = config.clone();
    if let Some(ref mut google) = config.google
        && let Some(ref mut secret) = google.client_secret
        && !SecretRef::parse(secret).is_reference()
    {
        *secret = "********".to_string();
    }
    config
}
