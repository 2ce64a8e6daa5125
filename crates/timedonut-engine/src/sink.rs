//! Display surfaces fed by the engine.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tracing::debug;

/// One published state of the status line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayFrame {
    /// Prefix followed by the current marquee frame, or the placeholder.
    pub text: String,
    /// Message of the last failed fetch, cleared by the next success.
    pub error: Option<String>,
    pub published_at: DateTime<Utc>,
}

impl Default for DisplayFrame {
    fn default() -> Self {
        Self {
            text: String::new(),
            error: None,
            published_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }
}

/// Somewhere to show the status line: a terminal, a tray title, a test.
pub trait DisplaySink: Send + Sync {
    fn show(&self, frame: &DisplayFrame);
}

/// Forwards every published frame to `sink` until the engine goes away.
pub async fn forward_frames(mut frames: watch::Receiver<DisplayFrame>, sink: &dyn DisplaySink) {
    loop {
        let frame = frames.borrow_and_update().clone();
        sink.show(&frame);
        if frames.changed().await.is_err() {
            debug!("display channel closed");
            break;
        }
    }
}
