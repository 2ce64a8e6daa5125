//! Engine configuration.

use std::time::Duration;

use timedonut_core::DisplayOptions;

use crate::error::{EngineError, EngineResult};

/// Timer periods and display settings.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How often the countdown prefix is recomputed.
    pub countdown_interval: Duration,
    /// How often events are fetched.
    pub refresh_interval: Duration,
    /// How often the marquee advances one frame.
    pub marquee_interval: Duration,
    pub display: DisplayOptions,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            countdown_interval: Duration::from_secs(1),
            refresh_interval: Duration::from_secs(300), // 5 minutes
            marquee_interval: Duration::from_millis(500),
            display: DisplayOptions::default(),
        }
    }
}

impl EngineConfig {
    /// Builder: set countdown interval.
    pub fn with_countdown_interval(mut self, interval: Duration) -> Self {
        self.countdown_interval = interval;
        self
    }

    /// Builder: set refresh interval.
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    /// Builder: set marquee interval.
    pub fn with_marquee_interval(mut self, interval: Duration) -> Self {
        self.marquee_interval = interval;
        self
    }

    /// Builder: set display options.
    pub fn with_display(mut self, display: DisplayOptions) -> Self {
        self.display = display;
        self
    }

    /// Rejects zero periods and a zero-width title window.
    pub fn validate(&self) -> EngineResult<()> {
        for (name, interval) in [
            ("countdown_interval", self.countdown_interval),
            ("refresh_interval", self.refresh_interval),
            ("marquee_interval", self.marquee_interval),
        ] {
            if interval.is_zero() {
                return Err(EngineError::config(format!("{} must be positive", name)));
            }
        }
        if self.display.title_width == 0 {
            return Err(EngineError::config("title_width must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.countdown_interval, Duration::from_secs(1));
        assert_eq!(config.refresh_interval, Duration::from_secs(300));
        assert_eq!(config.marquee_interval, Duration::from_millis(500));
        assert_eq!(config.display.title_width, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_zero_intervals() {
        let config = EngineConfig::default().with_marquee_interval(Duration::ZERO);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("marquee_interval"));
    }

    #[test]
    fn rejects_zero_width() {
        let display = DisplayOptions {
            title_width: 0,
            ..Default::default()
        };
        assert!(EngineConfig::default().with_display(display).validate().is_err());
    }
}
