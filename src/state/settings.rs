//! User settings persisted alongside the timer snapshot

use serde::{Deserialize, Serialize};

use super::Mode;

/// User-configurable settings stored in the same document as the timer state
///
/// Unknown keys in the document are ignored; missing keys take defaults, so a
/// settings block written by a newer build still loads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Work session length in minutes
    pub work_duration_minutes: i64,
    /// Rest-your-eyes session length in minutes
    pub rest_eyes_duration_minutes: i64,
    /// Long-rest session length in minutes
    pub long_rest_duration_minutes: i64,
    pub notifications_enabled: bool,
    pub sound_enabled: bool,
    /// Advance to the next mode automatically when a session completes
    pub auto_transition_enabled: bool,
    /// Snapshots older than this are not resumable
    pub max_snapshot_age_days: i64,
}

impl Settings {
    /// Configured duration for a mode, in minutes
    pub fn duration_minutes(&self, mode: Mode) -> i64 {
        match mode {
            Mode::Work => self.work_duration_minutes,
            Mode::RestEyes => self.rest_eyes_duration_minutes,
            Mode::LongRest => self.long_rest_duration_minutes,
        }
    }

    /// Configured duration for a mode, in seconds
    pub fn duration_seconds(&self, mode: Mode) -> i64 {
        self.duration_minutes(mode) * 60
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            work_duration_minutes: 25,
            rest_eyes_duration_minutes: 5,
            long_rest_duration_minutes: 15,
            notifications_enabled: true,
            sound_enabled: true,
            auto_transition_enabled: true,
            max_snapshot_age_days: 7,
        }
    }
}
