//! Calendar event model.
//!
//! A [`CalendarEvent`] is immutable for one fetch cycle. Everything that
//! depends on the current instant (ongoing, past, countdown) is computed on
//! read against an explicit `now`, so callers and tests control the clock.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Event status as reported by the calendar provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    #[default]
    Confirmed,
    Tentative,
    Cancelled,
}

impl EventStatus {
    /// Parses the provider's status string; unknown or missing values are
    /// treated as confirmed.
    pub fn from_api(status: Option<&str>) -> Self {
        match status {
            Some("tentative") => Self::Tentative,
            Some("cancelled") => Self::Cancelled,
            _ => Self::Confirmed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Confirmed => "confirmed",
            Self::Tentative => "tentative",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Where an event sits relative to a given instant.
///
/// Exactly one phase holds for any well-formed event (`start <= end`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventPhase {
    /// `now < start`
    Upcoming,
    /// `start <= now < end`
    Ongoing,
    /// `now >= end`
    Past,
}

/// Google Calendar event palette, keyed by `colorId`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventColor {
    Lavender,
    Sage,
    Grape,
    Flamingo,
    Banana,
    Tangerine,
    Peacock,
    Graphite,
    Blueberry,
    Basil,
    Tomato,
    /// Calendar default, used when the event carries no color id.
    #[default]
    Default,
}

impl EventColor {
    /// Maps a provider `colorId` ("1".."11") to a palette entry.
    pub fn from_color_id(color_id: Option<&str>) -> Self {
        match color_id {
            Some("1") => Self::Lavender,
            Some("2") => Self::Sage,
            Some("3") => Self::Grape,
            Some("4") => Self::Flamingo,
            Some("5") => Self::Banana,
            Some("6") => Self::Tangerine,
            Some("7") => Self::Peacock,
            Some("8") => Self::Graphite,
            Some("9") => Self::Blueberry,
            Some("10") => Self::Basil,
            Some("11") => Self::Tomato,
            _ => Self::Default,
        }
    }

    /// RGB components in `0.0..=1.0`.
    pub fn rgb(&self) -> (f64, f64, f64) {
        match self {
            Self::Lavender => (0.64, 0.76, 0.96),
            Self::Sage => (0.60, 0.87, 0.68),
            Self::Grape => (0.78, 0.63, 0.89),
            Self::Flamingo => (1.00, 0.74, 0.67),
            Self::Banana => (1.00, 0.92, 0.60),
            Self::Tangerine => (1.00, 0.69, 0.39),
            Self::Peacock => (0.52, 0.81, 0.92),
            Self::Graphite => (0.62, 0.62, 0.62),
            Self::Blueberry => (0.42, 0.66, 0.98),
            Self::Basil => (0.33, 0.83, 0.46),
            Self::Tomato => (0.89, 0.25, 0.21),
            Self::Default => (0.0, 0.48, 1.0),
        }
    }

    /// Returns the color as `#rrggbb`.
    pub fn hex(&self) -> String {
        let (r, g, b) = self.rgb();
        let channel = |v: f64| (v * 255.0).round().clamp(0.0, 255.0) as u8;
        format!("#{:02x}{:02x}{:02x}", channel(r), channel(g), channel(b))
    }
}

/// A calendar event in the internal model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    /// Provider event identifier.
    pub id: String,
    /// Event title.
    pub title: String,
    /// Start instant.
    pub start: DateTime<Utc>,
    /// End instant.
    pub end: DateTime<Utc>,
    /// Whether this is an all-day event (resolved to local midnights).
    pub all_day: bool,
    /// Provider status.
    pub status: EventStatus,
    /// Provider color id, if any.
    pub color_id: Option<String>,
    /// Calendar the event came from.
    pub calendar_id: String,
    /// Event location.
    pub location: Option<String>,
    /// Event description.
    pub description: Option<String>,
}

impl CalendarEvent {
    /// Creates a confirmed, timed event on the primary calendar.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            start,
            end,
            all_day: false,
            status: EventStatus::Confirmed,
            color_id: None,
            calendar_id: "primary".to_string(),
            location: None,
            description: None,
        }
    }

    pub fn with_all_day(mut self, all_day: bool) -> Self {
        self.all_day = all_day;
        self
    }

    pub fn with_status(mut self, status: EventStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_color_id(mut self, color_id: impl Into<String>) -> Self {
        self.color_id = Some(color_id.into());
        self
    }

    pub fn with_calendar_id(mut self, calendar_id: impl Into<String>) -> Self {
        self.calendar_id = calendar_id.into();
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Length of the event.
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Short duration label such as `1h30m`, `2h` or `45m`.
    pub fn duration_label(&self) -> String {
        let minutes = self.duration().num_minutes().max(0);
        let (hours, minutes) = (minutes / 60, minutes % 60);
        match (hours, minutes) {
            (0, m) => format!("{}m", m),
            (h, 0) => format!("{}h", h),
            (h, m) => format!("{}h{}m", h, m),
        }
    }

    /// True when `start <= now < end`.
    pub fn is_ongoing(&self, now: DateTime<Utc>) -> bool {
        now >= self.start && now < self.end
    }

    /// True when `now >= end`.
    pub fn is_past(&self, now: DateTime<Utc>) -> bool {
        now >= self.end
    }

    /// Classifies the event relative to `now`.
    pub fn phase(&self, now: DateTime<Utc>) -> EventPhase {
        if self.is_past(now) {
            EventPhase::Past
        } else if self.is_ongoing(now) {
            EventPhase::Ongoing
        } else {
            EventPhase::Upcoming
        }
    }

    /// Time remaining until the event starts.
    ///
    /// `None` when the event is ongoing or past.
    pub fn time_until_start(&self, now: DateTime<Utc>) -> Option<Duration> {
        match self.phase(now) {
            EventPhase::Upcoming => Some(self.start - now),
            EventPhase::Ongoing | EventPhase::Past => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == EventStatus::Cancelled
    }

    /// Palette entry for this event.
    pub fn color(&self) -> EventColor {
        EventColor::from_color_id(self.color_id.as_deref())
    }
}
