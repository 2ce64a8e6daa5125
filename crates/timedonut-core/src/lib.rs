//! Core types: events, time windows, countdown, marquee, dial geometry

pub mod countdown;
pub mod dial;
pub mod event;
pub mod marquee;
pub mod time;
pub mod tracing;

pub use countdown::{Countdown, next_relevant_event, next_upcoming_event};
pub use dial::{Dial, DialSegment};
pub use event::{CalendarEvent, EventColor, EventPhase, EventStatus};
pub use marquee::{DisplayOptions, DisplayState, FULL_WIDTH_SPACE, Marquee, to_full_width};
pub use time::{TimeWindow, start_of_day};
pub use tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
