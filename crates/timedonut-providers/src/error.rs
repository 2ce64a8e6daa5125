//! Error types for authentication, token storage and calendar fetches.

use std::fmt;
use thiserror::Error;

/// The category of a provider error.
///
/// Callers branch on the code (sign out, show inline, retry later) rather
/// than on the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderErrorCode {
    /// No session, callback failure or timeout, or the token endpoint
    /// rejected the grant.
    AuthenticationFailed,
    /// Transport failure: connect, timeout, DNS.
    NetworkError,
    /// The server answered with a body we could not parse.
    InvalidResponse,
    /// The events endpoint answered with a non-2xx status.
    CalendarApi,
    /// The token store could not be read or written.
    StorageError,
    /// Missing or invalid configuration.
    ConfigurationError,
    /// Unexpected internal state.
    InternalError,
}

impl ProviderErrorCode {
    /// Returns true if this error is transient and the operation may be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NetworkError)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthenticationFailed => "authentication_failed",
            Self::NetworkError => "network_error",
            Self::InvalidResponse => "invalid_response",
            Self::CalendarApi => "calendar_api_error",
            Self::StorageError => "storage_error",
            Self::ConfigurationError => "configuration_error",
            Self::InternalError => "internal_error",
        }
    }
}

impl fmt::Display for ProviderErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An error raised by the session manager, the token store or the fetcher.
#[derive(Debug, Error)]
pub struct ProviderError {
    code: ProviderErrorCode,
    message: String,
    /// HTTP status for calendar API errors.
    status: Option<u16>,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ProviderError {
    pub fn new(code: ProviderErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            status: None,
            source: None,
        }
    }

    /// Creates an authentication error.
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::AuthenticationFailed, message)
    }

    /// Creates a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::NetworkError, message)
    }

    /// Creates an invalid response error.
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::InvalidResponse, message)
    }

    /// Creates a calendar API error carrying the HTTP status.
    pub fn calendar_api(status: u16, message: impl Into<String>) -> Self {
        let mut err = Self::new(ProviderErrorCode::CalendarApi, message);
        err.status = Some(status);
        err
    }

    /// Creates a storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::StorageError, message)
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::ConfigurationError, message)
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorCode::InternalError, message)
    }

    /// Sets the source error for this error.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    pub fn code(&self) -> ProviderErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// HTTP status, set on calendar API errors.
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn is_authentication(&self) -> bool {
        self.code == ProviderErrorCode::AuthenticationFailed
    }

    /// Returns true if this error is transient and may be retried.
    ///
    /// Calendar API errors are retryable for 429 and 5xx.
    pub fn is_retryable(&self) -> bool {
        match (self.code, self.status) {
            (ProviderErrorCode::CalendarApi, Some(status)) => status == 429 || status >= 500,
            (code, _) => code.is_retryable(),
        }
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)?;
        if let Some(status) = self.status {
            write!(f, " (HTTP {})", status)?;
        }
        Ok(())
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        let message = if e.is_timeout() {
            "request timeout".to_string()
        } else if e.is_connect() {
            format!("connection failed: {}", e)
        } else {
            format!("request failed: {}", e)
        };
        Self::network(message).with_source(e)
    }
}

/// A specialized Result type for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;
