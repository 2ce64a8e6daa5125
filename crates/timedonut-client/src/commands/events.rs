//! `events` and `dial` commands.

use chrono::{Local, Utc};
use serde::Serialize;

use timedonut_core::{CalendarEvent, Dial, DialSegment, DisplayState};

use crate::app::App;
use crate::config::ClientConfig;
use crate::display::{dial_lines, event_line};
use crate::error::ClientResult;

/// Lists today's and tomorrow's events under the current status line.
pub async fn events(config: &ClientConfig, json: bool, ephemeral: bool) -> ClientResult<()> {
    let events = fetch_today(config, ephemeral).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&events)?);
        return Ok(());
    }

    let now = Utc::now();
    let mut state = DisplayState::new(config.display.clone());
    state.update(&events, now);
    println!("{}", state.render());
    println!();
    for event in &events {
        println!("{}", event_line(event, now, &Local));
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct DialOutput {
    top_hour: u32,
    hand_angle: f64,
    center_label: String,
    segments: Vec<DialSegment>,
}

/// Prints the dial geometry for the current moment.
pub async fn dial(
    config: &ClientConfig,
    top_hour: u32,
    json: bool,
    ephemeral: bool,
) -> ClientResult<()> {
    let events = fetch_today(config, ephemeral).await?;
    let dial = Dial::new(top_hour);
    let now = Utc::now();

    if json {
        let output = DialOutput {
            top_hour: dial.top_hour(),
            hand_angle: dial.hand_angle(now, &Local),
            center_label: dial.center_label(&events, now),
            segments: dial.segments(&events, now, &Local),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        for line in dial_lines(&dial, &events, now, &Local) {
            println!("{}", line);
        }
    }
    Ok(())
}

async fn fetch_today(config: &ClientConfig, ephemeral: bool) -> ClientResult<Vec<CalendarEvent>> {
    let app = App::new(config.clone(), ephemeral)?;
    app.signed_in().await?;
    Ok(app.calendar_service()?.fetch_today().await?)
}
