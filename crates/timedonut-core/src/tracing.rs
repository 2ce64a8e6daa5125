//! Log subscriber for the timedonut binary.
//!
//! Libraries only emit `tracing` events; `init_tracing` is called once by
//! the CLI. Output always goes to stderr because stdout carries the status
//! line and command output.
//!
//! ```ignore
//! use timedonut_core::{init_tracing, TracingConfig};
//!
//! init_tracing(TracingConfig::watch())?;
//! ```

use thiserror::Error;
use tracing::{Level, Subscriber};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    prelude::*,
    registry::LookupSpan,
};

#[derive(Debug, Error)]
pub enum TracingError {
    #[error("failed to set global tracing subscriber: {0}")]
    SetGlobalSubscriber(#[from] tracing::subscriber::SetGlobalDefaultError),

    #[error("invalid log filter: {0}")]
    EnvFilter(#[from] tracing_subscriber::filter::ParseError),
}

/// How log lines are laid out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TracingOutputFormat {
    /// Multi-line, for reading by eye.
    #[default]
    Pretty,
    Compact,
    /// One JSON object per line.
    Json,
}

impl std::str::FromStr for TracingOutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format: {}", other)),
        }
    }
}

/// Subscriber settings. Start from a preset and adjust with the `with_*`
/// methods.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Applied to the `timedonut` crates when neither `filter` nor
    /// `RUST_LOG` is set.
    pub level: Level,
    pub format: TracingOutputFormat,
    /// Source file and line on every event.
    pub source_location: bool,
    pub timestamps: bool,
    /// Also log span open and close.
    pub spans: bool,
    /// Explicit directive, wins over `RUST_LOG`.
    pub filter: Option<String>,
}

impl Default for TracingConfig {
    /// Warnings only, one line each.
    fn default() -> Self {
        Self {
            level: Level::WARN,
            format: TracingOutputFormat::Compact,
            source_location: false,
            timestamps: true,
            spans: false,
            filter: None,
        }
    }
}

impl TracingConfig {
    /// `--debug`: everything from timedonut, with source locations and no
    /// timestamps.
    #[must_use]
    pub fn cli_debug() -> Self {
        Self {
            level: Level::DEBUG,
            source_location: true,
            timestamps: false,
            ..Self::default()
        }
    }

    /// The `watch` loop: JSON lines with spans, so a long run can be grepped
    /// or shipped elsewhere.
    #[must_use]
    pub fn watch() -> Self {
        Self {
            level: Level::INFO,
            format: TracingOutputFormat::Json,
            source_location: true,
            spans: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    #[must_use]
    pub fn with_format(mut self, format: TracingOutputFormat) -> Self {
        self.format = format;
        self
    }

    #[must_use]
    pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Directive used when nothing else selects a filter.
    pub fn default_directive(&self) -> String {
        format!("timedonut={}", self.level)
    }

    fn env_filter(&self) -> Result<EnvFilter, TracingError> {
        match self.filter {
            Some(ref filter) => Ok(EnvFilter::try_new(filter)?),
            None => Ok(EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(self.default_directive()))),
        }
    }

    fn fmt_layer<S>(&self) -> Box<dyn Layer<S> + Send + Sync>
    where
        S: Subscriber + for<'a> LookupSpan<'a>,
    {
        let spans = if self.spans {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };
        let layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_file(self.source_location)
            .with_line_number(self.source_location)
            .with_span_events(spans);

        match (self.format, self.timestamps) {
            (TracingOutputFormat::Pretty, _) => layer.pretty().boxed(),
            (TracingOutputFormat::Compact, true) => layer.compact().boxed(),
            (TracingOutputFormat::Compact, false) => layer.compact().without_time().boxed(),
            (TracingOutputFormat::Json, _) => layer.json().boxed(),
        }
    }
}

/// Installs the global subscriber described by `config`.
///
/// # Errors
///
/// Fails when a subscriber is already installed or the filter directive
/// does not parse.
pub fn init_tracing(config: TracingConfig) -> Result<(), TracingError> {
    let subscriber = tracing_subscriber::registry()
        .with(config.env_filter()?)
        .with(config.fmt_layer());
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
