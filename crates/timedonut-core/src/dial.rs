//! 24-hour dial geometry.
//!
//! Angles are in degrees, measured clockwise from 3 o'clock as drawing
//! libraries expect, so the hour at the top of the dial sits at -90°.

use chrono::{DateTime, TimeZone, Timelike, Utc};
use serde::Serialize;

use crate::countdown::{Countdown, next_upcoming_event};
use crate::event::{CalendarEvent, EventColor};

/// Arc covered by one event on the dial.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DialSegment {
    pub event_id: String,
    pub title: String,
    pub start_angle: f64,
    pub end_angle: f64,
    pub color: EventColor,
}

/// A 24-hour clock face with a configurable hour at the top.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Dial {
    top_hour: u32,
}

impl Dial {
    /// Creates a dial with `top_hour` (taken modulo 24) at 12 o'clock.
    pub fn new(top_hour: u32) -> Self {
        Self {
            top_hour: top_hour % 24,
        }
    }

    pub fn top_hour(&self) -> u32 {
        self.top_hour
    }

    /// Angle of a fractional hour of the day.
    fn angle_for_hours(&self, hours: f64) -> f64 {
        let adjusted = (hours - f64::from(self.top_hour) + 24.0).rem_euclid(24.0);
        adjusted * 15.0 - 90.0
    }

    /// Angle of the local wall-clock time of `instant`, minute precision.
    pub fn angle_for_time<Tz: TimeZone>(&self, instant: DateTime<Utc>, tz: &Tz) -> f64 {
        let local = instant.with_timezone(tz);
        self.angle_for_hours(f64::from(local.hour()) + f64::from(local.minute()) / 60.0)
    }

    /// Angle of the label for a whole hour.
    pub fn hour_marker_angle(&self, hour: u32) -> f64 {
        self.angle_for_hours(f64::from(hour % 24))
    }

    /// Segments for every event that has not ended yet.
    pub fn segments<Tz: TimeZone>(
        &self,
        events: &[CalendarEvent],
        now: DateTime<Utc>,
        tz: &Tz,
    ) -> Vec<DialSegment> {
        events
            .iter()
            .filter(|e| !e.is_past(now))
            .map(|e| DialSegment {
                event_id: e.id.clone(),
                title: e.title.clone(),
                start_angle: self.angle_for_time(e.start, tz),
                end_angle: self.angle_for_time(e.end, tz),
                color: e.color(),
            })
            .collect()
    }

    /// Angle of the current-time hand.
    pub fn hand_angle<Tz: TimeZone>(&self, now: DateTime<Utc>, tz: &Tz) -> f64 {
        self.angle_for_time(now, tz)
    }

    /// Centre text: time left until the next event that has not started,
    /// or `--:--`.
    pub fn center_label(&self, events: &[CalendarEvent], now: DateTime<Utc>) -> String {
        Countdown::for_event(next_upcoming_event(events, now), now)
            .clock_label()
            .unwrap_or_else(|| "--:--".to_string())
    }
}
