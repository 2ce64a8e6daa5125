//! Google Calendar API v3 events client.

use chrono::{DateTime, Duration, Local, NaiveDate, TimeZone, Utc};
use serde::Deserialize;
use tracing::{debug, warn};

use timedonut_core::{CalendarEvent, EventStatus, start_of_day};

use crate::error::{ProviderError, ProviderResult};

use super::config::GoogleConfig;

/// Length assumed for events that come without an end.
const DEFAULT_EVENT_LENGTH: Duration = Duration::hours(1);

/// Fetches one calendar's events for a time window.
#[derive(Debug)]
pub struct CalendarFetcher {
    http_client: reqwest::Client,
    api_base: String,
    calendar_id: String,
    max_results: u32,
}

impl CalendarFetcher {
    pub fn new(config: &GoogleConfig) -> ProviderResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| ProviderError::internal("failed to create HTTP client").with_source(e))?;

        Ok(Self {
            http_client,
            api_base: config.calendar_api_base.trim_end_matches('/').to_string(),
            calendar_id: config.calendar_id.clone(),
            max_results: config.max_results,
        })
    }

    /// Lists events overlapping `[window_start, window_end)`.
    ///
    /// Recurring events are expanded server-side and come back ordered by
    /// start time. Entries without a title are dropped. A 401 is reported
    /// as-is; refreshing the token is the caller's decision.
    pub async fn fetch_events(
        &self,
        access_token: &str,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> ProviderResult<Vec<CalendarEvent>> {
        let url = format!(
            "{}/calendars/{}/events",
            self.api_base,
            urlencoding::encode(&self.calendar_id)
        );

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(access_token)
            .query(&[
                ("timeMin", window_start.to_rfc3339()),
                ("timeMax", window_end.to_rfc3339()),
                ("singleEvents", "true".to_string()),
                ("orderBy", "startTime".to_string()),
                ("maxResults", self.max_results.to_string()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok());
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status.as_u16(), retry_after, &body));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::network(format!("failed to read response: {}", e)))?;

        let list: EventListResponse = serde_json::from_str(&body).map_err(|e| {
            ProviderError::invalid_response(format!("failed to parse events response: {}", e))
        })?;

        let received = list.items.len();
        let events: Vec<CalendarEvent> = list
            .items
            .into_iter()
            .filter_map(|item| convert_event(item, &self.calendar_id, &Local))
            .collect();

        debug!(
            received,
            kept = events.len(),
            calendar = %self.calendar_id,
            "fetched events"
        );
        Ok(events)
    }
}

fn status_error(status: u16, retry_after: Option<u64>, body: &str) -> ProviderError {
    match status {
        401 => ProviderError::calendar_api(status, "access token expired or invalid"),
        403 => ProviderError::calendar_api(status, "access denied to calendar"),
        429 => ProviderError::calendar_api(
            status,
            format!(
                "rate limit exceeded{}",
                retry_after
                    .map(|s| format!(", retry after {} seconds", s))
                    .unwrap_or_default()
            ),
        ),
        500..=599 => ProviderError::calendar_api(status, "calendar service unavailable"),
        _ => {
            let excerpt: String = body.chars().take(200).collect();
            ProviderError::calendar_api(status, format!("API error: {}", excerpt))
        }
    }
}

/// Maps one API item into the internal model.
///
/// All-day dates are anchored at local midnight in `tz`.
fn convert_event<Tz: TimeZone>(item: ApiEvent, calendar_id: &str, tz: &Tz) -> Option<CalendarEvent> {
    let Some(id) = item.id else {
        warn!("skipping event without id");
        return None;
    };
    let Some(title) = item.summary else {
        debug!(%id, "skipping untitled event");
        return None;
    };

    let Some(start_time) = item.start else {
        warn!(%id, "event has no start");
        return None;
    };
    let (start, all_day) = match parse_time(&start_time, tz) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!(%id, error = %e, "failed to parse event start");
            return None;
        }
    };

    let end = match item.end.as_ref().map(|end| parse_time(end, tz)) {
        Some(Ok((end, _))) => end,
        Some(Err(e)) => {
            warn!(%id, error = %e, "failed to parse event end, assuming one hour");
            start + DEFAULT_EVENT_LENGTH
        }
        None => start + DEFAULT_EVENT_LENGTH,
    };
    // Guard against inverted ranges from the API.
    let end = end.max(start);

    let mut event = CalendarEvent::new(id, title, start, end)
        .with_all_day(all_day)
        .with_status(EventStatus::from_api(item.status.as_deref()))
        .with_calendar_id(calendar_id);
    event.color_id = item.color_id;
    event.location = item.location;
    event.description = item.description;
    Some(event)
}

/// Parses an API time: `dateTime` wins over `date`.
fn parse_time<Tz: TimeZone>(time: &ApiEventTime, tz: &Tz) -> Result<(DateTime<Utc>, bool), String> {
    if let Some(ref date_time) = time.date_time {
        let parsed = DateTime::parse_from_rfc3339(date_time)
            .map_err(|e| format!("invalid dateTime {:?}: {}", date_time, e))?;
        return Ok((parsed.with_timezone(&Utc), false));
    }
    if let Some(ref date) = time.date {
        let parsed = NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .map_err(|e| format!("invalid date {:?}: {}", date, e))?;
        return Ok((start_of_day(parsed, tz), true));
    }
    Err("neither dateTime nor date is set".to_string())
}

/// Response from the events.list endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventListResponse {
    #[serde(default)]
    items: Vec<ApiEvent>,
}

/// A single event from the Google Calendar API.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiEvent {
    id: Option<String>,
    summary: Option<String>,
    description: Option<String>,
    location: Option<String>,
    start: Option<ApiEventTime>,
    end: Option<ApiEventTime>,
    status: Option<String>,
    color_id: Option<String>,
}

/// Event time from the API.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiEventTime {
    date: Option<String>,
    date_time: Option<String>,
}
