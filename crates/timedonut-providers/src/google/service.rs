//! Today's events for the signed-in account, with a last-result cache.

use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Local, Utc};
use tracing::{debug, warn};

use timedonut_core::{CalendarEvent, TimeWindow};

use crate::error::ProviderResult;
use crate::source::{BoxFuture, EventSource};

use super::client::CalendarFetcher;
use super::session::SessionManager;

#[derive(Debug, Clone)]
struct FetchCache {
    events: Vec<CalendarEvent>,
    fetched_at: DateTime<Utc>,
}

/// Combines the session and the fetcher into an [`EventSource`].
#[derive(Debug)]
pub struct CalendarService {
    session: Arc<SessionManager>,
    fetcher: CalendarFetcher,
    cache: RwLock<Option<FetchCache>>,
}

impl CalendarService {
    pub fn new(session: Arc<SessionManager>) -> ProviderResult<Self> {
        let fetcher = CalendarFetcher::new(session.config())?;
        Ok(Self {
            session,
            fetcher,
            cache: RwLock::new(None),
        })
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    /// Fetches local today and tomorrow.
    pub async fn fetch_today(&self) -> ProviderResult<Vec<CalendarEvent>> {
        self.fetch_window(TimeWindow::today_and_tomorrow(Utc::now(), &Local))
            .await
    }

    /// Fetches `window` with a fresh token, drops cancelled events and
    /// sorts by start. The cache keeps the previous result on failure.
    pub async fn fetch_window(&self, window: TimeWindow) -> ProviderResult<Vec<CalendarEvent>> {
        let token = self.session.valid_access_token().await?;
        let mut events = match self
            .fetcher
            .fetch_events(&token, window.start, window.end)
            .await
        {
            Ok(events) => events,
            Err(e) => {
                warn!(error = %e, "calendar fetch failed");
                return Err(e);
            }
        };

        events.retain(|e| !e.is_cancelled());
        events.sort_by_key(|e| e.start);
        debug!(count = events.len(), start = %window.start, end = %window.end, "events updated");

        *self.cache.write().unwrap_or_else(PoisonError::into_inner) = Some(FetchCache {
            events: events.clone(),
            fetched_at: Utc::now(),
        });
        Ok(events)
    }

    /// Events from the last successful fetch.
    pub fn cached_events(&self) -> Vec<CalendarEvent> {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|c| c.events.clone())
            .unwrap_or_default()
    }

    pub fn last_fetch(&self) -> Option<DateTime<Utc>> {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|c| c.fetched_at)
    }

    pub fn clear_cache(&self) {
        *self.cache.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl EventSource for CalendarService {
    fn fetch_events(&self) -> BoxFuture<'_, ProviderResult<Vec<CalendarEvent>>> {
        Box::pin(self.fetch_today())
    }
}
