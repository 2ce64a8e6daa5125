//! Next-event selection and countdown arithmetic.

use chrono::{DateTime, Utc};

use crate::event::{CalendarEvent, EventPhase};

/// Returns the event the countdown should track: the earliest-starting event
/// that has not ended yet (ongoing or upcoming).
///
/// Ties on start time resolve to the event that comes first in `events`.
pub fn next_relevant_event(events: &[CalendarEvent], now: DateTime<Utc>) -> Option<&CalendarEvent> {
    events
        .iter()
        .filter(|e| !e.is_past(now))
        .min_by_key(|e| e.start)
}

/// Returns the earliest event that has not started yet.
pub fn next_upcoming_event(events: &[CalendarEvent], now: DateTime<Utc>) -> Option<&CalendarEvent> {
    events
        .iter()
        .filter(|e| e.phase(now) == EventPhase::Upcoming)
        .min_by_key(|e| e.start)
}

/// Countdown towards an event, floored to the minute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Countdown {
    /// The tracked event is in progress.
    Ongoing,
    /// Time left before the tracked event starts.
    Until { hours: i64, minutes: i64 },
    /// Nothing left to track.
    NoEvent,
}

impl Countdown {
    /// Computes the countdown for `event` at `now`.
    pub fn for_event(event: Option<&CalendarEvent>, now: DateTime<Utc>) -> Self {
        let Some(event) = event else {
            return Self::NoEvent;
        };
        match event.phase(now) {
            EventPhase::Ongoing => Self::Ongoing,
            EventPhase::Past => Self::NoEvent,
            EventPhase::Upcoming => {
                let total_minutes = (event.start - now).num_seconds().max(0) / 60;
                Self::Until {
                    hours: total_minutes / 60,
                    minutes: total_minutes % 60,
                }
            }
        }
    }

    /// Countdown for the next relevant event in `events`.
    pub fn next(events: &[CalendarEvent], now: DateTime<Utc>) -> Self {
        Self::for_event(next_relevant_event(events, now), now)
    }

    /// `HH:MM` for a pending countdown, `None` otherwise.
    pub fn clock_label(&self) -> Option<String> {
        match self {
            Self::Until { hours, minutes } => Some(format!("{:02}:{:02}", hours, minutes)),
            Self::Ongoing | Self::NoEvent => None,
        }
    }

    /// Display prefix: `"HH:MM "`, `"<marker> "` or empty.
    pub fn prefix(&self, ongoing_marker: &str) -> String {
        match self {
            Self::Until { .. } => self
                .clock_label()
                .map(|label| format!("{} ", label))
                .unwrap_or_default(),
            Self::Ongoing => format!("{} ", ongoing_marker),
            Self::NoEvent => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 26, 9, 0, 0).unwrap()
    }

    fn event(id: &str, start_min: i64, end_min: i64) -> CalendarEvent {
        CalendarEvent::new(
            id,
            id,
            now() + Duration::minutes(start_min),
            now() + Duration::minutes(end_min),
        )
    }

    #[test]
    fn relevant_event_skips_past_and_prefers_earliest() {
        let events = vec![
            event("later", 60, 90),
            event("done", -60, -30),
            event("soon", 10, 40),
        ];
        assert_eq!(next_relevant_event(&events, now()).unwrap().id, "soon");
    }

    #[test]
    fn relevant_event_includes_ongoing() {
        let events = vec![event("upcoming", 10, 40), event("running", -5, 25)];
        assert_eq!(next_relevant_event(&events, now()).unwrap().id, "running");
        assert_eq!(next_upcoming_event(&events, now()).unwrap().id, "upcoming");
    }

    #[test]
    fn relevant_event_ties_keep_input_order() {
        let events = vec![event("first", 10, 40), event("second", 10, 20)];
        assert_eq!(next_relevant_event(&events, now()).unwrap().id, "first");
    }

    #[test]
    fn no_events_left() {
        let events = vec![event("done", -60, -30)];
        assert!(next_relevant_event(&events, now()).is_none());
        assert_eq!(Countdown::next(&events, now()), Countdown::NoEvent);
        assert_eq!(Countdown::next(&[], now()), Countdown::NoEvent);
    }

    #[test]
    fn standup_ten_minutes_out() {
        let events = vec![event("Standup", 10, 40)];
        let countdown = Countdown::next(&events, now());
        assert_eq!(countdown, Countdown::Until { hours: 0, minutes: 10 });
        assert_eq!(countdown.prefix("ongoing"), "00:10 ");
    }

    #[test]
    fn countdown_floors_to_minute() {
        let e = CalendarEvent::new(
            "e",
            "e",
            now() + Duration::seconds(2 * 3600 + 5 * 60 + 59),
            now() + Duration::hours(3),
        );
        assert_eq!(
            Countdown::for_event(Some(&e), now()).clock_label().as_deref(),
            Some("02:05")
        );

        let e = CalendarEvent::new("e", "e", now() + Duration::seconds(59), now() + Duration::hours(1));
        assert_eq!(Countdown::for_event(Some(&e), now()).prefix("x"), "00:00 ");
    }

    #[test]
    fn ongoing_prefix_uses_marker() {
        let events = vec![event("Review", -1, 30)];
        let countdown = Countdown::next(&events, now());
        assert_eq!(countdown, Countdown::Ongoing);
        assert_eq!(countdown.prefix("開催中"), "開催中 ");
        assert_eq!(countdown.clock_label(), None);
    }
}
