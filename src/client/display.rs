//! Consumer application state fed by the connection manager.

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::db::models::{Settings, Snapshot};
use crate::standby;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StandbyState {
    /// Standby feature enabled in settings
    pub standby: bool,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    /// Currently inside the window
    pub is_standby: bool,
}

impl StandbyState {
    pub fn from_settings(settings: &Settings, now: NaiveDateTime) -> Self {
        Self {
            standby: settings.standby,
            start_time: Some(settings.standby_start_time.clone()),
            end_time: Some(settings.standby_end_time.clone()),
            is_standby: standby::evaluate(
                now,
                &settings.standby_start_time,
                &settings.standby_end_time,
                settings.standby,
            ),
        }
    }
}

/// What changed in one `apply`, for logging transitions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisplayChange {
    pub mode_changed: bool,
    pub standby_changed: bool,
}

#[derive(Debug, Clone, Default)]
pub struct DisplayState {
    snapshot: Option<Snapshot>,
    standby: StandbyState,
}

impl DisplayState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Option<&Snapshot> {
        self.snapshot.as_ref()
    }

    pub fn standby(&self) -> &StandbyState {
        &self.standby
    }

    pub fn mode_name(&self) -> Option<&str> {
        self.snapshot.as_ref().map(|s| s.mode.name.as_str())
    }

    /// Take a new snapshot and recompute standby against `now`.
    pub fn apply(&mut self, snapshot: Snapshot, now: NaiveDateTime) -> DisplayChange {
        let previous_mode = self.mode_name().map(str::to_owned);
        let previous_standby = self.standby.is_standby;

        self.standby = StandbyState::from_settings(&snapshot.settings, now);
        let change = DisplayChange {
            mode_changed: previous_mode.as_deref() != Some(snapshot.mode.name.as_str()),
            standby_changed: previous_standby != self.standby.is_standby,
        };
        self.snapshot = Some(snapshot);
        change
    }

    /// Fail open: without current settings the display stays active.
    pub fn clear_standby(&mut self) {
        self.standby = StandbyState::default();
    }
}
