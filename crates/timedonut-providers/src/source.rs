//! The seam between calendar fetching and the display engine.

use std::future::Future;
use std::pin::Pin;

use timedonut_core::CalendarEvent;

use crate::error::ProviderResult;

/// A boxed future for async trait methods.
///
/// Boxed futures keep the trait object-safe so the engine can hold an
/// `Arc<dyn EventSource>`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Something that can produce the current list of events to display.
///
/// Implementations decide the window, authentication and caching; the
/// engine only asks for "today's events" on its refresh tick.
pub trait EventSource: Send + Sync {
    /// Fetches events, sorted by start time, cancelled entries removed.
    fn fetch_events(&self) -> BoxFuture<'_, ProviderResult<Vec<CalendarEvent>>>;
}

/// An event source returning a fixed list. Used for demos and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    events: Vec<CalendarEvent>,
}

impl StaticSource {
    pub fn new(mut events: Vec<CalendarEvent>) -> Self {
        events.retain(|e| !e.is_cancelled());
        events.sort_by_key(|e| e.start);
        Self { events }
    }
}

impl EventSource for StaticSource {
    fn fetch_events(&self) -> BoxFuture<'_, ProviderResult<Vec<CalendarEvent>>> {
        Box::pin(async move { Ok(self.events.clone()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use timedonut_core::EventStatus;

    #[tokio::test]
    async fn static_source_sorts_and_filters() {
        let base = Utc.with_ymd_and_hms(2025, 10, 26, 9, 0, 0).unwrap();
        let source = StaticSource::new(vec![
            CalendarEvent::new("b", "Later", base + Duration::hours(2), base + Duration::hours(3)),
            CalendarEvent::new("x", "Dropped", base, base + Duration::hours(1))
                .with_status(EventStatus::Cancelled),
            CalendarEvent::new("a", "Sooner", base, base + Duration::hours(1)),
        ]);

        let events = source.fetch_events().await.unwrap();
        let ids: Vec<_> = events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
    }
}
