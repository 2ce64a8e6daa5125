//! Time windows and local-date helpers.
//!
//! Calendar queries use a half-open [`TimeWindow`] in UTC. The default
//! window covers the local day that contains `now` plus the following day,
//! which is what the countdown and the dial need to look ahead past midnight.

use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Returns the UTC instant of local midnight on `date` in `tz`.
///
/// Ambiguous midnights (clock moved back) resolve to the earliest instant.
/// Zones that skip midnight on a DST switch resolve to the first valid
/// local hour after it.
pub fn start_of_day<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> DateTime<Utc> {
    let midnight = date.and_time(NaiveTime::MIN);
    match tz.from_local_datetime(&midnight) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
        LocalResult::None => (1..=3)
            .find_map(|h| {
                tz.from_local_datetime(&(midnight + Duration::hours(h)))
                    .earliest()
            })
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|| midnight.and_utc()),
    }
}

/// A time window for querying calendar events.
///
/// Represents a half-open interval `[start, end)` in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Start of the window (inclusive).
    pub start: DateTime<Utc>,
    /// End of the window (exclusive).
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Creates a new time window.
    ///
    /// # Panics
    ///
    /// Panics if `start` is after `end`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        assert!(start <= end, "TimeWindow start must be <= end");
        Self { start, end }
    }

    /// Creates a time window from a start time and duration.
    pub fn from_duration(start: DateTime<Utc>, duration: Duration) -> Self {
        Self::new(start, start + duration)
    }

    /// Creates a window covering `days` whole local days, starting at local
    /// midnight of the day containing `now`.
    pub fn local_days<Tz: TimeZone>(now: DateTime<Utc>, tz: &Tz, days: u32) -> Self {
        let today = now.with_timezone(tz).date_naive();
        let start = start_of_day(today, tz);
        let last = today
            .checked_add_days(chrono::Days::new(u64::from(days)))
            .unwrap_or(today);
        let end = start_of_day(last, tz).max(start);
        Self { start, end }
    }

    /// Today and tomorrow in the given timezone: the default fetch window.
    pub fn today_and_tomorrow<Tz: TimeZone>(now: DateTime<Utc>, tz: &Tz) -> Self {
        Self::local_days(now, tz, 2)
    }

    /// Returns true if `instant` falls within `[start, end)`.
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant < self.end
    }

    /// Returns the length of the window.
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn start_of_day_in_utc() {
        let date = NaiveDate::from_ymd_opt(2025, 10, 26).unwrap();
        assert_eq!(start_of_day(date, &Utc), utc(2025, 10, 26, 0, 0));
    }

    #[test]
    fn start_of_day_in_tokyo() {
        let tokyo = FixedOffset::east_opt(9 * 3600).unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 10, 26).unwrap();
        // Midnight JST is 15:00 UTC on the previous day.
        assert_eq!(start_of_day(date, &tokyo), utc(2025, 10, 25, 15, 0));
    }

    #[test]
    fn today_and_tomorrow_spans_two_local_days() {
        let tokyo = FixedOffset::east_opt(9 * 3600).unwrap();
        // 2025-10-26 08:30 JST
        let now = utc(2025, 10, 25, 23, 30);
        let window = TimeWindow::today_and_tomorrow(now, &tokyo);

        assert_eq!(window.start, utc(2025, 10, 25, 15, 0));
        assert_eq!(window.end, utc(2025, 10, 27, 15, 0));
        assert_eq!(window.duration(), Duration::hours(48));
        assert!(window.contains(now));
    }

    #[test]
    fn window_is_half_open() {
        let window = TimeWindow::from_duration(utc(2025, 1, 1, 0, 0), Duration::hours(1));
        assert!(window.contains(utc(2025, 1, 1, 0, 0)));
        assert!(window.contains(utc(2025, 1, 1, 0, 59)));
        assert!(!window.contains(utc(2025, 1, 1, 1, 0)));
    }

    #[test]
    #[should_panic(expected = "start must be <= end")]
    fn window_rejects_inverted_bounds() {
        TimeWindow::new(utc(2025, 1, 2, 0, 0), utc(2025, 1, 1, 0, 0));
    }

    #[test]
    fn window_serde() {
        let window = TimeWindow::from_duration(utc(2025, 1, 1, 0, 0), Duration::hours(2));
        let json = serde_json::to_string(&window).unwrap();
        let parsed: TimeWindow = serde_json::from_str(&json).unwrap();
        assert_eq!(window, parsed);
    }
}
