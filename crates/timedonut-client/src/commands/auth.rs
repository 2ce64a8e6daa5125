//! Sign-in and sign-out commands.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use timedonut_providers::google::OAuthCredentials;

use crate::app::App;
use crate::config::{ClientConfig, GoogleSettings};
use crate::error::{ClientError, ClientResult};

/// Options of the `auth` command.
#[derive(Debug, Default)]
pub struct AuthOptions {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub credentials_file: Option<PathBuf>,
    pub callback_port: Option<u16>,
    pub force: bool,
}

/// Runs the browser sign-in.
///
/// Credentials given on the command line or through `--credentials-file` are
/// written to `config_path` once the sign-in succeeds, so later commands find
/// them.
pub async fn auth(
    options: AuthOptions,
    config: &ClientConfig,
    config_path: &Path,
    ephemeral: bool,
) -> ClientResult<()> {
    let (credentials, source) = resolve_google_credentials(
        options.client_id,
        options.client_secret,
        options.credentials_file,
        config.google.as_ref(),
    )?;
    credentials
        .validate()
        .map_err(|e| ClientError::config(format!("invalid Google credentials: {}", e)))?;

    let mut settings = config.google_settings();
    if let Some(port) = options.callback_port {
        settings.callback_port = port;
    }
    let google = settings
        .provider_config(credentials.clone())
        .map_err(ClientError::Config)?;
    let app = App::with_google_config(config.clone(), google, ephemeral)?;

    if !options.force && app.session().restore_session().await? {
        save_credentials(config_path, &credentials, &source);
        let state = app.session().auth_state();
        println!(
            "Already signed in as {}.",
            state.email.as_deref().unwrap_or("an unknown account")
        );
        println!("Use --force to sign in again.");
        return Ok(());
    }

    println!("Starting Google Calendar sign-in...");
    println!();
    println!("A browser window will open for you to authorize read-only access.");
    println!("If the browser doesn't open, check the log output for the URL.");
    println!();

    let state = app.session().sign_in().await?;
    save_credentials(config_path, &credentials, &source);

    info!(email = state.email.as_deref().unwrap_or("-"), "signed in");
    println!(
        "Signed in as {}.",
        state.email.as_deref().unwrap_or("an unknown account")
    );
    if ephemeral {
        println!("Tokens were kept in memory only and are gone now.");
    }
    Ok(())
}

/// Deletes every stored token.
pub fn signout(config: &ClientConfig) -> ClientResult<()> {
    config.store.open()?.delete_all()?;
    info!("signed out");
    println!("Signed out.");
    Ok(())
}

/// Where the credentials were resolved from.
#[derive(Debug, PartialEq)]
enum CredentialSource {
    /// `--client-id`/`--client-secret` or `--credentials-file`
    Cli,
    /// `config.toml`, already persisted
    Config,
}

fn save_credentials(path: &Path, credentials: &OAuthCredentials, source: &CredentialSource) {
    if *source == CredentialSource::Config {
        return;
    }
    match ClientConfig::save_google_credentials(
        path,
        &credentials.client_id,
        &credentials.client_secret,
    ) {
        Ok(()) => {
            info!(path = %path.display(), "saved Google credentials");
            println!("Credentials saved to {}", path.display());
        }
        Err(e) => warn!("could not save credentials: {}", e),
    }
}

/// Resolves Google credentials from multiple sources.
///
/// Priority (highest to lowest):
/// 1. CLI `--client-id` + `--client-secret`
/// 2. CLI `--credentials-file` (Google Cloud Console JSON)
/// 3. `config.toml` `[google]` section, with secret references resolved
fn resolve_google_credentials(
    cli_client_id: Option<String>,
    cli_client_secret: Option<String>,
    cli_credentials_file: Option<PathBuf>,
    config_google: Option<&GoogleSettings>,
) -> ClientResult<(OAuthCredentials, CredentialSource)> {
    if let (Some(id), Some(secret)) = (&cli_client_id, &cli_client_secret) {
        return Ok((OAuthCredentials::new(id, secret), CredentialSource::Cli));
    }

    if let Some(ref path) = cli_credentials_file {
        let credentials = OAuthCredentials::from_file(path).map_err(|e| {
            ClientError::config(format!(
                "failed to load credentials from {}: {}",
                path.display(),
                e
            ))
        })?;
        return Ok((credentials, CredentialSource::Cli));
    }

    if let Some(google) = config_google
        && google.client_id.is_some()
        && google.client_secret.is_some()
    {
        let credentials = google.resolve_credentials().map_err(|e| {
            ClientError::config(format!(
                "failed to resolve Google credentials from config: {}",
                e
            ))
        })?;
        return Ok((credentials, CredentialSource::Config));
    }

    if cli_client_id.is_some() || cli_client_secret.is_some() {
        return Err(ClientError::config(
            "both --client-id and --client-secret are required when providing credentials directly",
        ));
    }

    Err(ClientError::config(format!(
        "Google credentials are required. Provide via:\n  \
         - client_id + client_secret in {}\n  \
         - --client-id and --client-secret flags\n  \
         - --credentials-file <path to Google Cloud Console JSON>",
        ClientConfig::default_path().display()
    )))
}
