//! The events engine: three timers over one shared display state.
//!
//! - refresh (5 min): fetch events from the [`EventSource`]
//! - countdown (1 s): recompute the prefix, publish only on change
//! - marquee (0.5 s): publish the next title frame
//!
//! Each timer runs as its own task. They share one state behind a lock and
//! publish through a single `watch` channel.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, RwLock, mpsc, watch};
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use timedonut_core::{CalendarEvent, Countdown, DisplayState};
use timedonut_providers::EventSource;

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::sink::DisplayFrame;

/// Commands that can be sent to a running engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineCommand {
    /// Fetch events now.
    Refresh,
    /// Move the marquee back to its first frame.
    ResetScroll,
    /// Stop every timer and return from `run`.
    Stop,
}

/// Mutable state shared by the timers.
#[derive(Debug)]
struct EngineState {
    events: Vec<CalendarEvent>,
    display: DisplayState,
    last_fetch: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

/// A point-in-time copy of the engine state.
#[derive(Debug, Clone, Serialize)]
pub struct EngineSnapshot {
    pub events: Vec<CalendarEvent>,
    pub text: String,
    pub prefix: String,
    pub title: Option<String>,
    pub cursor: usize,
    #[serde(skip)]
    pub countdown: Countdown,
    pub last_fetch: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

struct Inner {
    config: EngineConfig,
    source: Arc<dyn EventSource>,
    state: RwLock<EngineState>,
    frames: watch::Sender<DisplayFrame>,
    refresh_guard: Mutex<()>,
}

impl Inner {
    fn publish(&self, state: &EngineState, text: String) {
        self.frames.send_replace(DisplayFrame {
            text,
            error: state.last_error.clone(),
            published_at: Utc::now(),
        });
    }

    async fn refresh(&self, now: DateTime<Utc>) -> EngineResult<usize> {
        let _guard = self.refresh_guard.lock().await;
        debug!("fetching events");
        match self.source.fetch_events().await {
            Ok(events) => Ok(self.apply_events(events, now).await),
            Err(e) => {
                warn!(error = %e, "refresh failed, keeping previous events");
                let mut state = self.state.write().await;
                state.last_error = Some(e.to_string());
                let text = state.display.render();
                self.publish(&state, text);
                Err(e.into())
            }
        }
    }

    async fn apply_events(&self, events: Vec<CalendarEvent>, now: DateTime<Utc>) -> usize {
        let mut state = self.state.write().await;
        let count = events.len();
        state.events = events;
        state.last_fetch = Some(now);
        state.last_error = None;

        let EngineState {
            events, display, ..
        } = &mut *state;
        display.update(events, now);
        display.reset_scroll();

        let text = state.display.render();
        self.publish(&state, text);
        info!(count, "events updated");
        count
    }

    async fn tick_countdown(&self, now: DateTime<Utc>) -> bool {
        let mut state = self.state.write().await;
        let EngineState {
            events, display, ..
        } = &mut *state;
        if !display.update(events, now) {
            return false;
        }
        let text = state.display.render();
        debug!(%text, "countdown changed");
        self.publish(&state, text);
        true
    }

    async fn tick_marquee(&self) -> String {
        let mut state = self.state.write().await;
        let text = state.display.advance();
        self.publish(&state, text.clone());
        text
    }

    async fn reset_scroll(&self) {
        let mut state = self.state.write().await;
        state.display.reset_scroll();
        let text = state.display.render();
        self.publish(&state, text);
    }

    async fn snapshot(&self) -> EngineSnapshot {
        let state = self.state.read().await;
        EngineSnapshot {
            events: state.events.clone(),
            text: state.display.render(),
            prefix: state.display.prefix().to_string(),
            title: state.display.title().map(str::to_string),
            cursor: state.display.cursor(),
            countdown: state.display.countdown(),
            last_fetch: state.last_fetch,
            last_error: state.last_error.clone(),
        }
    }
}

/// Drives the status line from an [`EventSource`].
pub struct EventsEngine {
    inner: Arc<Inner>,
    command_tx: mpsc::Sender<EngineCommand>,
    command_rx: Option<mpsc::Receiver<EngineCommand>>,
}

impl EventsEngine {
    pub fn new(config: EngineConfig, source: Arc<dyn EventSource>) -> EngineResult<Self> {
        config.validate()?;
        let display = DisplayState::new(config.display.clone());
        let (frames, _) = watch::channel(DisplayFrame {
            text: display.render(),
            ..Default::default()
        });
        let (command_tx, command_rx) = mpsc::channel(16);

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                source,
                state: RwLock::new(EngineState {
                    events: Vec::new(),
                    display,
                    last_fetch: None,
                    last_error: None,
                }),
                frames,
                refresh_guard: Mutex::new(()),
            }),
            command_tx,
            command_rx: Some(command_rx),
        })
    }

    /// Returns a handle for controlling the engine and reading its output.
    pub fn handle(&self) -> EngineHandle {
        EngineHandle {
            command_tx: self.command_tx.clone(),
            frames: self.inner.frames.subscribe(),
            inner: self.inner.clone(),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<DisplayFrame> {
        self.inner.frames.subscribe()
    }

    /// Fetches from the source and applies the result at `now`.
    ///
    /// On failure the previous events stay on screen and the error is
    /// attached to the published frame.
    pub async fn refresh_now(&self, now: DateTime<Utc>) -> EngineResult<usize> {
        self.inner.refresh(now).await
    }

    /// Replaces the event list, resets the scroll and publishes.
    pub async fn apply_events(&self, events: Vec<CalendarEvent>, now: DateTime<Utc>) -> usize {
        self.inner.apply_events(events, now).await
    }

    /// Recomputes the countdown at `now`; publishes and returns true only
    /// when the prefix or title changed.
    pub async fn tick_countdown(&self, now: DateTime<Utc>) -> bool {
        self.inner.tick_countdown(now).await
    }

    /// Publishes the current marquee frame and advances the cursor.
    pub async fn tick_marquee(&self) -> String {
        self.inner.tick_marquee().await
    }

    pub async fn snapshot(&self) -> EngineSnapshot {
        self.inner.snapshot().await
    }

    /// Runs the timers until [`EngineCommand::Stop`].
    ///
    /// The first tick of each timer fires immediately, so the first fetch
    /// happens on start.
    pub async fn run(&mut self) -> EngineResult<()> {
        let mut command_rx = self.command_rx.take().ok_or(EngineError::AlreadyRunning)?;
        let config = &self.inner.config;
        info!(
            refresh_secs = config.refresh_interval.as_secs(),
            countdown_ms = config.countdown_interval.as_millis() as u64,
            marquee_ms = config.marquee_interval.as_millis() as u64,
            "engine started"
        );

        let mut timers = JoinSet::new();

        let inner = self.inner.clone();
        timers.spawn(async move {
            let mut interval = tokio::time::interval(inner.config.refresh_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                // Failures are recorded in the state and shown inline.
                let _ = inner.refresh(Utc::now()).await;
            }
        });

        let inner = self.inner.clone();
        timers.spawn(async move {
            let mut interval = tokio::time::interval(inner.config.countdown_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                inner.tick_countdown(Utc::now()).await;
            }
        });

        let inner = self.inner.clone();
        timers.spawn(async move {
            let mut interval = tokio::time::interval(inner.config.marquee_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                inner.tick_marquee().await;
            }
        });

        loop {
            match command_rx.recv().await {
                Some(EngineCommand::Refresh) => {
                    debug!("manual refresh");
                    let _ = self.inner.refresh(Utc::now()).await;
                }
                Some(EngineCommand::ResetScroll) => {
                    debug!("scroll reset");
                    self.inner.reset_scroll().await;
                }
                Some(EngineCommand::Stop) | None => {
                    info!("engine stopping");
                    break;
                }
            }
        }

        timers.shutdown().await;
        self.command_rx = Some(command_rx);
        Ok(())
    }
}

/// Handle for controlling a running engine.
#[derive(Clone)]
pub struct EngineHandle {
    command_tx: mpsc::Sender<EngineCommand>,
    frames: watch::Receiver<DisplayFrame>,
    inner: Arc<Inner>,
}

impl EngineHandle {
    /// Requests an immediate fetch.
    pub async fn refresh(&self) -> EngineResult<()> {
        self.send(EngineCommand::Refresh).await
    }

    /// Requests the marquee to restart from the first frame.
    pub async fn reset_scroll(&self) -> EngineResult<()> {
        self.send(EngineCommand::ResetScroll).await
    }

    /// Stops the engine.
    pub async fn stop(&self) -> EngineResult<()> {
        self.send(EngineCommand::Stop).await
    }

    /// The most recently published frame.
    pub fn current(&self) -> DisplayFrame {
        self.frames.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<DisplayFrame> {
        self.frames.clone()
    }

    pub async fn snapshot(&self) -> EngineSnapshot {
        self.inner.snapshot().await
    }

    async fn send(&self, command: EngineCommand) -> EngineResult<()> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| EngineError::Stopped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration as StdDuration;
    use timedonut_providers::{BoxFuture, ProviderError, ProviderResult, StaticSource};

    fn event(id: &str, title: &str, now: DateTime<Utc>, starts_in: i64, minutes: i64) -> CalendarEvent {
        let start = now + Duration::minutes(starts_in);
        CalendarEvent::new(id, title, start, start + Duration::minutes(minutes))
    }

    fn engine(events: Vec<CalendarEvent>) -> EventsEngine {
        EventsEngine::new(
            EngineConfig::default(),
            Arc::new(StaticSource::new(events)),
        )
        .unwrap()
    }

    /// Counts fetches and fails after the first one.
    #[derive(Default)]
    struct FlakySource {
        calls: AtomicU32,
    }

    impl EventSource for FlakySource {
        fn fetch_events(&self) -> BoxFuture<'_, ProviderResult<Vec<CalendarEvent>>> {
            Box::pin(async move {
                let call = self.calls.fetch_add(1, Ordering::SeqCst);
                if call == 0 {
                    let now = Utc::now();
                    Ok(vec![event("a", "Sync", now, 10, 30)])
                } else {
                    Err(ProviderError::calendar_api(503, "calendar service unavailable"))
                }
            })
        }
    }

    #[tokio::test]
    async fn starts_with_placeholder() {
        let engine = engine(vec![]);
        assert_eq!(engine.subscribe().borrow().text, "no events");
    }

    #[tokio::test]
    async fn apply_events_publishes_prefix_and_frame() {
        let now = Utc::now();
        let engine = engine(vec![]);
        let rx = engine.subscribe();

        engine.apply_events(vec![event("a", "Sync", now, 10, 30)], now).await;
        assert_eq!(rx.borrow().text, "00:10 Ｓｙｎｃ\u{3000}");

        let snapshot = engine.snapshot().await;
        assert_eq!(snapshot.prefix, "00:10 ");
        assert_eq!(snapshot.title.as_deref(), Some("Sync"));
        assert_eq!(snapshot.last_fetch, Some(now));
    }

    #[tokio::test]
    async fn countdown_publishes_only_on_change() {
        let now = Utc::now();
        let engine = engine(vec![]);
        engine.apply_events(vec![event("a", "Sync", now, 10, 30)], now).await;

        assert!(!engine.tick_countdown(now + Duration::milliseconds(500)).await);
        assert!(engine.tick_countdown(now + Duration::seconds(61)).await);
        assert_eq!(engine.subscribe().borrow().text, "00:08 Ｓｙｎｃ\u{3000}");

        assert!(engine.tick_countdown(now + Duration::minutes(10)).await);
        assert_eq!(engine.snapshot().await.countdown, Countdown::Ongoing);
        assert!(engine.tick_countdown(now + Duration::minutes(40)).await);
        assert_eq!(engine.subscribe().borrow().text, "no events");
    }

    #[tokio::test]
    async fn marquee_scrolls_long_titles() {
        let now = Utc::now();
        let engine = engine(vec![]);
        engine
            .apply_events(vec![event("a", "Planning", now, 90, 30)], now)
            .await;

        let mut frames = Vec::new();
        for _ in 0..10 {
            frames.push(engine.tick_marquee().await);
        }
        assert_eq!(frames[0], "01:30 Ｐｌａｎｎ");
        assert_eq!(frames[1], "01:30 ｌａｎｎｉ");
        assert_eq!(frames[8], "01:30 \u{3000}\u{3000}\u{3000}\u{3000}\u{3000}");
        assert_eq!(frames[9], frames[0]);
    }

    #[tokio::test]
    async fn refetch_resets_scroll() {
        let now = Utc::now();
        let events = vec![event("a", "Planning", now, 90, 30)];
        let engine = engine(events.clone());
        engine.apply_events(events, now).await;
        engine.tick_marquee().await;
        engine.tick_marquee().await;
        assert_eq!(engine.snapshot().await.cursor, 2);

        engine.refresh_now(now).await.unwrap();
        assert_eq!(engine.snapshot().await.cursor, 0);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_events_and_shows_error() {
        let now = Utc::now();
        let engine = EventsEngine::new(EngineConfig::default(), Arc::new(FlakySource::default()))
            .unwrap();

        assert_eq!(engine.refresh_now(now).await.unwrap(), 1);
        let err = engine.refresh_now(now).await.unwrap_err();
        assert!(matches!(err, EngineError::Provider(_)));

        let frame = engine.subscribe().borrow().clone();
        assert!(frame.text.starts_with("00:"));
        assert!(frame.error.unwrap().contains("503"));
        assert_eq!(engine.snapshot().await.events.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn run_fetches_on_start_and_on_interval() {
        let source = Arc::new(FlakySource::default());
        let mut engine = EventsEngine::new(EngineConfig::default(), source.clone()).unwrap();
        let handle = engine.handle();
        let task = tokio::spawn(async move { engine.run().await });

        tokio::time::sleep(StdDuration::from_secs(1)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert!(handle.current().text.contains("Ｓｙｎｃ"));

        tokio::time::sleep(StdDuration::from_secs(300)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
        assert!(handle.current().error.is_some());

        handle.refresh().await.unwrap();
        tokio::time::sleep(StdDuration::from_millis(10)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);

        handle.stop().await.unwrap();
        task.await.unwrap().unwrap();
        assert!(matches!(handle.refresh().await, Err(EngineError::Stopped)));
    }

    #[tokio::test(start_paused = true)]
    async fn reset_scroll_command() {
        let now = Utc::now();
        let mut engine = engine(vec![event("a", "Planning", now, 90, 30)]);
        let handle = engine.handle();
        let task = tokio::spawn(async move { engine.run().await });

        tokio::time::sleep(StdDuration::from_millis(1600)).await;
        assert!(handle.snapshot().await.cursor > 0);

        handle.reset_scroll().await.unwrap();
        tokio::time::sleep(StdDuration::from_millis(1)).await;
        assert_eq!(handle.snapshot().await.cursor, 0);

        handle.stop().await.unwrap();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn run_can_restart_after_stop() {
        let mut engine = engine(vec![]);
        let handle = engine.handle();
        handle.stop().await.unwrap();
        engine.run().await.unwrap();

        // The receiver is returned after a clean stop.
        handle.stop().await.unwrap();
        engine.run().await.unwrap();
    }
}
