//! Timer snapshot value type and validation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

/// Clock-skew tolerance when checking a snapshot's persist timestamp
pub const CLOCK_SKEW_TOLERANCE_SECS: i64 = 60;

/// The three preset countdown modes
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Work,
    RestEyes,
    LongRest,
}

impl Mode {
    /// Human-readable mode name for logs and notifications
    pub fn display_name(&self) -> &'static str {
        match self {
            Mode::Work => "Work",
            Mode::RestEyes => "Rest Your Eyes",
            Mode::LongRest => "Long Rest",
        }
    }
}

/// One countdown session's complete state, as persisted and recovered
///
/// Collaborators only ever receive clones of this snapshot; the authoritative
/// copy lives inside the engine's mutex.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimerState {
    pub mode: Mode,
    pub remaining_seconds: i64,
    pub total_duration_seconds: i64,
    pub is_running: bool,
    pub is_paused: bool,
    /// Unique per session, used to detect stale or foreign snapshots
    pub session_id: String,
    /// When the session was started or last resumed; elapsed math baseline
    pub started_at: Option<DateTime<Utc>>,
    /// When this snapshot last reached disk; staleness checks only
    pub last_persisted_at: Option<DateTime<Utc>>,
    /// Set when a save was triggered by a system-suspend signal
    pub survived_sleep: bool,
}

impl TimerState {
    /// Create a fresh running session starting now
    pub fn new_session(mode: Mode, duration_seconds: i64, now: DateTime<Utc>) -> Self {
        Self {
            mode,
            remaining_seconds: duration_seconds,
            total_duration_seconds: duration_seconds,
            is_running: true,
            is_paused: false,
            session_id: Uuid::new_v4().to_string(),
            started_at: Some(now),
            last_persisted_at: None,
            survived_sleep: false,
        }
    }

    /// Validate the snapshot's internal consistency
    pub fn validate(&self, now: DateTime<Utc>) -> Result<(), ValidationError> {
        if self.total_duration_seconds <= 0 {
            return Err(ValidationError::NonPositiveDuration(
                self.total_duration_seconds,
            ));
        }
        if self.remaining_seconds < 0 || self.remaining_seconds > self.total_duration_seconds {
            return Err(ValidationError::RemainingOutOfRange {
                remaining: self.remaining_seconds,
                total: self.total_duration_seconds,
            });
        }
        if self.is_running && self.is_paused {
            return Err(ValidationError::RunningAndPaused);
        }
        if self.session_id.trim().is_empty() {
            return Err(ValidationError::EmptySessionId);
        }
        if let Some(persisted) = self.last_persisted_at {
            let ahead = (persisted - now).num_seconds();
            if ahead > CLOCK_SKEW_TOLERANCE_SECS {
                return Err(ValidationError::PersistedInFuture(ahead));
            }
        }
        Ok(())
    }

    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.validate(now).is_ok()
    }

    /// Session ran to zero and is neither running nor paused
    pub fn is_completed(&self) -> bool {
        self.remaining_seconds == 0 && !self.is_running && !self.is_paused
    }

    /// Session still claims user attention (running or paused)
    pub fn is_active(&self) -> bool {
        self.is_running || self.is_paused
    }

    /// Project the snapshot down to what the UI shell needs
    pub fn display(&self) -> DisplayState {
        DisplayState {
            mode: Some(self.mode),
            remaining_seconds: self.remaining_seconds,
            total_duration_seconds: self.total_duration_seconds,
            is_running: self.is_running,
            is_paused: self.is_paused,
        }
    }
}

/// Read-only projection of the current countdown for the UI shell
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DisplayState {
    pub mode: Option<Mode>,
    pub remaining_seconds: i64,
    pub total_duration_seconds: i64,
    pub is_running: bool,
    pub is_paused: bool,
}

impl DisplayState {
    /// Display state when no session exists
    pub fn idle() -> Self {
        Self {
            mode: None,
            remaining_seconds: 0,
            total_duration_seconds: 0,
            is_running: false,
            is_paused: false,
        }
    }

    /// Menu-bar style MM:SS rendition of the remaining time
    pub fn clock_text(&self) -> String {
        let remaining = self.remaining_seconds.max(0);
        format!("{:02}:{:02}", remaining / 60, remaining % 60)
    }
}

impl Default for DisplayState {
    fn default() -> Self {
        Self::idle()
    }
}
