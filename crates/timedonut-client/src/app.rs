//! Wiring shared by the commands: configuration, token store and session.

use std::sync::Arc;

use tracing::debug;

use timedonut_providers::google::{CalendarService, GoogleConfig, SessionManager};
use timedonut_providers::{MemoryTokenStore, TokenStore};

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};

pub struct App {
    config: ClientConfig,
    session: Arc<SessionManager>,
    ephemeral: bool,
}

impl App {
    /// Builds the app from `config.toml`. Fails when Google credentials are
    /// missing or invalid.
    pub fn new(config: ClientConfig, ephemeral: bool) -> ClientResult<Self> {
        let google = config
            .google_settings()
            .to_provider_config()
            .map_err(ClientError::Config)?;
        Self::with_google_config(config, google, ephemeral)
    }

    /// Builds the app around an explicit provider configuration.
    ///
    /// An ephemeral app keeps tokens in memory and never opens the
    /// configured store.
    pub fn with_google_config(
        config: ClientConfig,
        google: GoogleConfig,
        ephemeral: bool,
    ) -> ClientResult<Self> {
        let store: Arc<dyn TokenStore> = if ephemeral {
            debug!("using in-memory token store");
            Arc::new(MemoryTokenStore::new())
        } else {
            config.store.open()?
        };
        let session = Arc::new(SessionManager::new(google, store)?);
        Ok(Self {
            config,
            session,
            ephemeral,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    pub fn is_ephemeral(&self) -> bool {
        self.ephemeral
    }

    /// Restores the stored session, or signs in interactively for an
    /// ephemeral run.
    pub async fn signed_in(&self) -> ClientResult<()> {
        if self.session.restore_session().await? {
            return Ok(());
        }
        if self.ephemeral {
            self.session.sign_in().await?;
            return Ok(());
        }
        Err(ClientError::AuthRequired(
            "no stored session, run `timedonut auth` to sign in".to_string(),
        ))
    }

    pub fn calendar_service(&self) -> ClientResult<CalendarService> {
        Ok(CalendarService::new(Arc::clone(&self.session))?)
    }
}
