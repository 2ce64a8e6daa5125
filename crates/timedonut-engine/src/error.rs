//! Engine error types.

use thiserror::Error;
use timedonut_providers::ProviderError;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur in the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Invalid timer or display settings.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// `run` was called on an engine that is already running.
    #[error("Engine is already running")]
    AlreadyRunning,

    /// The engine loop has exited; commands can no longer be delivered.
    #[error("Engine has stopped")]
    Stopped,

    /// Fetching events failed.
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl EngineError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}
