//! Fixed-width marquee rendering for event titles.
//!
//! A title that fits in the window is shown once, padded with blanks. A
//! longer title scrolls one character per tick: frame `i` shows up to
//! `width` characters starting at offset `i`, and frame `len` is entirely
//! blank so the loop pauses before starting over. The cycle therefore has
//! exactly `len + 1` frames.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::mem;

use crate::countdown::{Countdown, next_relevant_event};
use crate::event::CalendarEvent;

/// Ideographic space (U+3000), the same visual width as a full-width glyph.
pub const FULL_WIDTH_SPACE: char = '\u{3000}';

/// Maps printable ASCII (`!`..=`~`) to the full-width forms block.
///
/// Everything else, including the ASCII space, is left untouched.
pub fn to_full_width(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\u{21}'..='\u{7e}' => char::from_u32(c as u32 - 0x21 + 0xFF01).unwrap_or(c),
            _ => c,
        })
        .collect()
}

/// Frame generator for a fixed window width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Marquee {
    width: usize,
    blank: char,
}

impl Marquee {
    /// Creates a marquee padded with [`FULL_WIDTH_SPACE`].
    pub fn new(width: usize) -> Self {
        Self {
            width: width.max(1),
            blank: FULL_WIDTH_SPACE,
        }
    }

    /// Uses a different padding character.
    #[must_use]
    pub fn with_blank(mut self, blank: char) -> Self {
        self.blank = blank;
        self
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of distinct frames for a title of `len` characters.
    pub fn cycle_len(&self, len: usize) -> usize {
        if len <= self.width { 1 } else { len + 1 }
    }

    /// Renders the frame shown at `tick`.
    pub fn frame(&self, chars: &[char], tick: usize) -> String {
        let len = chars.len();
        let offset = if len <= self.width {
            0
        } else {
            tick % (len + 1)
        };
        let shown = self.width.min(len.saturating_sub(offset));

        let mut out = String::with_capacity(self.width * 3);
        out.extend(&chars[offset..offset + shown]);
        out.extend(std::iter::repeat_n(self.blank, self.width - shown));
        out
    }

    /// Every frame of one full cycle, in order.
    pub fn frames(&self, title: &str) -> Vec<String> {
        let chars: Vec<char> = title.chars().collect();
        (0..self.cycle_len(chars.len()))
            .map(|tick| self.frame(&chars, tick))
            .collect()
    }
}

/// Presentation settings for the composed display string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayOptions {
    /// Title window width, in characters.
    pub title_width: usize,
    /// Prefix shown while the tracked event is in progress.
    pub ongoing_marker: String,
    /// Placeholder shown when nothing is left today.
    pub no_events_text: String,
    /// Convert ASCII titles to full-width glyphs.
    pub full_width: bool,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self {
            title_width: 5,
            ongoing_marker: "ongoing".to_string(),
            no_events_text: "no events".to_string(),
            full_width: true,
        }
    }
}

/// Scrolling state for the status line.
///
/// Holds the current prefix and title and the marquee cursor. The cursor
/// returns to 0 whenever the title or the kind of prefix changes; a minute
/// ticking over in the countdown keeps the scroll position.
#[derive(Debug, Clone)]
pub struct DisplayState {
    options: DisplayOptions,
    marquee: Marquee,
    countdown: Countdown,
    prefix: String,
    name: Option<String>,
    chars: Vec<char>,
    cursor: usize,
}

impl DisplayState {
    pub fn new(options: DisplayOptions) -> Self {
        let marquee = Marquee::new(options.title_width);
        Self {
            options,
            marquee,
            countdown: Countdown::NoEvent,
            prefix: String::new(),
            name: None,
            chars: Vec::new(),
            cursor: 0,
        }
    }

    pub fn options(&self) -> &DisplayOptions {
        &self.options
    }

    /// Recomputes prefix and title from `events` at `now`.
    ///
    /// Returns true when the prefix or the title changed.
    pub fn update(&mut self, events: &[CalendarEvent], now: DateTime<Utc>) -> bool {
        let event = next_relevant_event(events, now);
        let countdown = Countdown::for_event(event, now);
        let name = event.map(|e| e.title.clone());
        let prefix = countdown.prefix(&self.options.ongoing_marker);

        let kind_changed = mem::discriminant(&countdown) != mem::discriminant(&self.countdown);
        let name_changed = name != self.name;
        let prefix_changed = prefix != self.prefix;

        if name_changed {
            self.chars = match &name {
                Some(title) if self.options.full_width => to_full_width(title).chars().collect(),
                Some(title) => title.chars().collect(),
                None => Vec::new(),
            };
        }
        if name_changed || kind_changed {
            self.cursor = 0;
        }

        self.countdown = countdown;
        self.prefix = prefix;
        self.name = name;

        name_changed || prefix_changed
    }

    /// Composes the current frame without moving the cursor.
    pub fn render(&self) -> String {
        match self.name {
            None => self.options.no_events_text.clone(),
            Some(_) => format!("{}{}", self.prefix, self.marquee.frame(&self.chars, self.cursor)),
        }
    }

    /// Renders the current frame, then moves the cursor to the next one.
    pub fn advance(&mut self) -> String {
        let text = self.render();
        if self.name.is_some() {
            self.cursor = (self.cursor + 1) % self.marquee.cycle_len(self.chars.len());
        }
        text
    }

    pub fn reset_scroll(&mut self) {
        self.cursor = 0;
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn countdown(&self) -> Countdown {
        self.countdown
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Title being displayed, `None` when showing the placeholder.
    pub fn title(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

impl Default for DisplayState {
    fn default() -> Self {
        Self::new(DisplayOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn bracketed(frames: &[String]) -> String {
        frames
            .iter()
            .map(|f| format!("[{}]", f))
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn full_width_conversion() {
        assert_eq!(to_full_width("AB 1!~"), "ＡＢ １！～");
        assert_eq!(to_full_width("会議"), "会議");
    }

    #[test]
    fn short_title_is_static_and_padded() {
        let marquee = Marquee::new(5);
        let frames = marquee.frames("会議");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0], "会議\u{3000}\u{3000}\u{3000}");
        let chars: Vec<char> = "会議".chars().collect();
        assert_eq!(marquee.frame(&chars, 7), frames[0]);
    }

    #[test]
    fn exact_width_title_is_static() {
        let marquee = Marquee::new(3).with_blank(' ');
        assert_eq!(marquee.frames("abc"), vec!["abc".to_string()]);
    }

    #[test]
    fn long_title_cycle() {
        let marquee = Marquee::new(3).with_blank(' ');
        let frames = marquee.frames("AAAAAAAA");
        assert_eq!(frames.len(), 9);
        insta::assert_snapshot!(
            bracketed(&frames),
            @"[AAA] [AAA] [AAA] [AAA] [AAA] [AAA] [AA ] [A  ] [   ]"
        );

        let chars: Vec<char> = "AAAAAAAA".chars().collect();
        assert_eq!(marquee.frame(&chars, 9), frames[0]);
        assert_eq!(marquee.frame(&chars, 17), frames[8]);
    }

    #[test]
    fn scrolling_shows_successive_offsets() {
        let marquee = Marquee::new(3).with_blank('.');
        insta::assert_snapshot!(
            bracketed(&marquee.frames("abcde")),
            @"[abc] [bcd] [cde] [de.] [e..] [...]"
        );
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 26, 9, 0, 0).unwrap()
    }

    fn ascii_options() -> DisplayOptions {
        DisplayOptions {
            title_width: 3,
            full_width: false,
            ..Default::default()
        }
    }

    fn event(title: &str, start_min: i64, end_min: i64) -> CalendarEvent {
        CalendarEvent::new(
            title,
            title,
            now() + Duration::minutes(start_min),
            now() + Duration::minutes(end_min),
        )
    }

    #[test]
    fn placeholder_when_nothing_left() {
        let mut state = DisplayState::new(ascii_options());
        state.update(&[], now());
        assert_eq!(state.advance(), "no events");
        assert_eq!(state.advance(), "no events");
        assert_eq!(state.cursor(), 0);
    }

    #[test]
    fn standup_renders_static_with_prefix() {
        let options = DisplayOptions {
            title_width: 10,
            full_width: false,
            ..Default::default()
        };
        let mut state = DisplayState::new(options);
        assert!(state.update(&[event("Standup", 10, 40)], now()));
        assert_eq!(state.prefix(), "00:10 ");
        assert_eq!(state.advance(), "00:10 Standup\u{3000}\u{3000}\u{3000}");
        assert_eq!(state.cursor(), 0);
    }

    #[test]
    fn full_width_title_in_display() {
        let mut state = DisplayState::default();
        state.update(&[event("Sync", 10, 40)], now());
        assert_eq!(state.render(), "00:10 Ｓｙｎｃ\u{3000}");
    }

    #[test]
    fn cursor_advances_and_wraps() {
        let mut state = DisplayState::new(ascii_options());
        state.update(&[event("abcd", 30, 60)], now());
        let rendered: Vec<String> = (0..6).map(|_| state.advance()).collect();
        assert_eq!(rendered[0], "00:30 abc");
        assert_eq!(rendered[1], "00:30 bcd");
        assert_eq!(rendered[5], rendered[0]);
    }

    #[test]
    fn minute_tick_keeps_scroll_position() {
        let mut state = DisplayState::new(ascii_options());
        let events = [event("abcdef", 30, 60)];
        state.update(&events, now());
        state.advance();
        state.advance();
        assert_eq!(state.cursor(), 2);

        assert!(state.update(&events, now() + Duration::seconds(30)));
        assert_eq!(state.prefix(), "00:29 ");
        assert_eq!(state.cursor(), 2);

        assert!(!state.update(&events, now() + Duration::seconds(60)));
        assert_eq!(state.prefix(), "00:29 ");
    }

    #[test]
    fn title_change_resets_scroll() {
        let mut state = DisplayState::new(ascii_options());
        state.update(&[event("abcdef", 30, 60)], now());
        state.advance();
        state.advance();

        state.update(&[event("ghijkl", 30, 60)], now());
        assert_eq!(state.cursor(), 0);
        assert_eq!(state.render(), "00:30 ghi");
    }

    #[test]
    fn event_starting_resets_scroll() {
        let mut state = DisplayState::new(ascii_options());
        let events = [event("abcdef", 1, 60)];
        state.update(&events, now());
        state.advance();
        assert_eq!(state.cursor(), 1);

        state.update(&events, now() + Duration::minutes(1));
        assert_eq!(state.countdown(), Countdown::Ongoing);
        assert_eq!(state.cursor(), 0);
        assert_eq!(state.render(), "ongoing abc");
    }

    #[test]
    fn explicit_reset() {
        let mut state = DisplayState::new(ascii_options());
        state.update(&[event("abcdef", 30, 60)], now());
        state.advance();
        state.reset_scroll();
        assert_eq!(state.cursor(), 0);
    }
}
