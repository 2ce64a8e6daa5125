//! Countdown and marquee engine.
//!
//! [`EventsEngine`] pulls events from an
//! [`EventSource`](timedonut_providers::EventSource) and publishes the status
//! line (`prefix + title frame`) on a `watch` channel. A [`DisplaySink`]
//! turns those frames into something visible.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use timedonut_engine::{EngineConfig, EventsEngine};
//! use timedonut_providers::StaticSource;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let source = Arc::new(StaticSource::new(vec![]));
//!     let mut engine = EventsEngine::new(EngineConfig::default(), source)?;
//!     let handle = engine.handle();
//!
//!     tokio::spawn(async move { engine.run().await });
//!     println!("{}", handle.current().text);
//!     handle.stop().await?;
//!     Ok(())
//! }
//! ```

mod config;
mod engine;
mod error;
mod sink;

pub use config::EngineConfig;
pub use engine::{EngineCommand, EngineHandle, EngineSnapshot, EventsEngine};
pub use error::{EngineError, EngineResult};
pub use sink::{DisplayFrame, DisplaySink, forward_frames};
