//! Terminal rendering for events, the dial and the live status line.

use std::io::{IsTerminal, Write};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, TimeZone, Utc};

use timedonut_core::{CalendarEvent, Countdown, Dial, EventPhase};
use timedonut_engine::{DisplayFrame, DisplaySink};
use timedonut_providers::google::AuthState;

/// Writes the status line to stdout.
///
/// On a terminal the line is redrawn in place. Otherwise each distinct
/// line is printed once.
pub struct TerminalSink {
    inline: bool,
    last: Mutex<String>,
}

impl TerminalSink {
    pub fn new() -> Self {
        Self {
            inline: std::io::stdout().is_terminal(),
            last: Mutex::new(String::new()),
        }
    }

    /// Finishes the in-place line so the shell prompt starts on a new one.
    pub fn finish(&self) {
        if self.inline {
            println!();
        }
    }
}

impl Default for TerminalSink {
    fn default() -> Self {
        Self::new()
    }
}

impl DisplaySink for TerminalSink {
    fn show(&self, frame: &DisplayFrame) {
        let line = match frame.error {
            Some(ref error) => format!("{}  [{}]", frame.text, error),
            None => frame.text.clone(),
        };

        let mut out = std::io::stdout().lock();
        if self.inline {
            let _ = write!(out, "\r\x1b[2K{}", line);
        } else {
            let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);
            if *last == line {
                return;
            }
            let _ = writeln!(out, "{}", line);
            *last = line;
        }
        let _ = out.flush();
    }
}

/// One row of the `events` listing: time range, length, countdown, title.
pub fn event_line<Tz: TimeZone>(event: &CalendarEvent, now: DateTime<Utc>, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let when = if event.all_day {
        "all day".to_string()
    } else {
        format!(
            "{}-{}",
            event.start.with_timezone(tz).format("%H:%M"),
            event.end.with_timezone(tz).format("%H:%M")
        )
    };
    let state = match event.phase(now) {
        EventPhase::Ongoing => "now".to_string(),
        EventPhase::Past => "done".to_string(),
        EventPhase::Upcoming => Countdown::for_event(Some(event), now)
            .clock_label()
            .unwrap_or_default(),
    };
    format!(
        "{:<11}  {:>5}  {:>5}  {}",
        when,
        event.duration_label(),
        state,
        event.title
    )
}

/// The dial as text: a header with the hand and centre label, then one row
/// per arc.
pub fn dial_lines<Tz: TimeZone>(
    dial: &Dial,
    events: &[CalendarEvent],
    now: DateTime<Utc>,
    tz: &Tz,
) -> Vec<String> {
    let mut lines = vec![format!(
        "top {:02}:00  hand {:>6.1}°  next {}",
        dial.top_hour(),
        dial.hand_angle(now, tz),
        dial.center_label(events, now)
    )];
    lines.extend(dial.segments(events, now, tz).into_iter().map(|segment| {
        format!(
            "{:>6.1}° {:>6.1}°  {}  {}",
            segment.start_angle,
            segment.end_angle,
            segment.color.hex(),
            segment.title
        )
    }));
    lines
}

/// Human-readable account status.
pub fn status_lines<Tz: TimeZone>(state: &AuthState, now: DateTime<Utc>, tz: &Tz) -> Vec<String>
where
    Tz::Offset: std::fmt::Display,
{
    if !state.is_authenticated {
        return vec!["not signed in (run `timedonut auth`)".to_string()];
    }

    let mut lines = vec![format!(
        "signed in as {}",
        state.email.as_deref().unwrap_or("an unknown account")
    )];
    if let Some(expires_at) = state.token_expires_at {
        let remaining = if state.is_token_expired(now) {
            "expired".to_string()
        } else {
            format!("in {}", minutes_label((expires_at - now).num_minutes()))
        };
        lines.push(format!(
            "token expires {} ({})",
            expires_at.with_timezone(tz).format("%Y-%m-%d %H:%M"),
            remaining
        ));
    }
    lines
}

fn minutes_label(minutes: i64) -> String {
    match (minutes / 60, minutes % 60) {
        (0, m) => format!("{}m", m),
        (h, 0) => format!("{}h", h),
        (h, m) => format!("{}h{}m", h, m),
    }
}
