//! `watch` command: the live status line.

use std::sync::Arc;

use tracing::{debug, info};

use timedonut_engine::{EventsEngine, forward_frames};

use crate::app::App;
use crate::config::ClientConfig;
use crate::display::TerminalSink;
use crate::error::ClientResult;

/// Runs the engine and redraws the status line until Ctrl-C.
pub async fn watch(
    config: &ClientConfig,
    title_width: Option<usize>,
    no_full_width: bool,
    ephemeral: bool,
) -> ClientResult<()> {
    let mut display = config.display.clone();
    if let Some(width) = title_width {
        display.title_width = width;
    }
    if no_full_width {
        display.full_width = false;
    }
    let engine_config = config.engine.to_engine_config(&display);
    engine_config.validate()?;

    let app = App::new(config.clone(), ephemeral)?;
    app.signed_in().await?;
    let service = Arc::new(app.calendar_service()?);

    let mut engine = EventsEngine::new(engine_config, service)?;
    let handle = engine.handle();
    let frames = engine.subscribe();
    let runner = tokio::spawn(async move { engine.run().await });

    let sink = TerminalSink::new();
    tokio::select! {
        _ = forward_frames(frames, &sink) => debug!("engine stopped publishing"),
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("interrupted");
        }
    }
    sink.finish();

    // Already stopped when the engine ended on its own.
    let _ = handle.stop().await;
    runner.await??;
    Ok(())
}
