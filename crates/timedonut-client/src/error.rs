//! Client error types.

use thiserror::Error;

use timedonut_engine::EngineError;
use timedonut_providers::{ProviderError, StoreError};

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur in the client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Calendar, OAuth or token store failure.
    #[error("{0}")]
    Provider(#[from] ProviderError),

    /// Token store failure outside of a session operation.
    #[error("token store: {0}")]
    Store(#[from] StoreError),

    /// The status line engine failed.
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    /// Logging could not be set up.
    #[error("{0}")]
    Tracing(#[from] timedonut_core::TracingError),

    /// JSON output could not be produced.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The engine task panicked or was cancelled.
    #[error("engine task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// No stored session; the user has to sign in first.
    #[error("authentication required: {0}")]
    AuthRequired(String),
}

impl ClientError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}
