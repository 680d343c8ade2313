//! Standby window evaluation.
//!
//! A window is a daily `HH:MM`..`HH:MM` range. When the end is earlier than
//! the start the window wraps past midnight (e.g. 22:00..06:00).

use chrono::{NaiveDateTime, NaiveTime};

pub const DEFAULT_START: NaiveTime = match NaiveTime::from_hms_opt(22, 0, 0) {
    Some(t) => t,
    None => NaiveTime::MIN,
};
pub const DEFAULT_END: NaiveTime = match NaiveTime::from_hms_opt(6, 0, 0) {
    Some(t) => t,
    None => NaiveTime::MIN,
};

/// Parse `HH:MM` (trailing `:SS` tolerated, seconds ignored).
pub fn parse_hhmm(raw: &str) -> Option<NaiveTime> {
    let mut parts = raw.trim().split(':');
    let hour = parts.next()?.trim().parse::<u32>().ok()?;
    let minute = parts.next()?.trim().parse::<u32>().ok()?;
    NaiveTime::from_hms_opt(hour, minute, 0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StandbyWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl StandbyWindow {
    /// Build a window from raw strings. Each malformed bound falls back to
    /// its default on its own.
    pub fn parse(start: &str, end: &str) -> Self {
        let parsed_start = parse_hhmm(start);
        let parsed_end = parse_hhmm(end);
        if parsed_start.is_none() || parsed_end.is_none() {
            tracing::debug!(start, end, "Malformed standby bound, using default");
        }
        Self {
            start: parsed_start.unwrap_or(DEFAULT_START),
            end: parsed_end.unwrap_or(DEFAULT_END),
        }
    }

    pub fn crosses_midnight(&self) -> bool {
        self.end < self.start
    }

    pub fn contains(&self, at: NaiveTime) -> bool {
        if self.crosses_midnight() {
            at >= self.start || at <= self.end
        } else {
            at >= self.start && at <= self.end
        }
    }
}

impl Default for StandbyWindow {
    fn default() -> Self {
        Self {
            start: DEFAULT_START,
            end: DEFAULT_END,
        }
    }
}

/// Whether a display should be in standby at `now`.
pub fn evaluate(now: NaiveDateTime, start: &str, end: &str, enabled: bool) -> bool {
    enabled && StandbyWindow::parse(start, end).contains(now.time())
}
