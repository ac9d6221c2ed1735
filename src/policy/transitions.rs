//! Automatic mode transition policy

use chrono::{DateTime, Utc};

use crate::state::{Mode, Settings, TimerState};

/// The mode that follows a completed one
///
/// Work alternates with the short eye rest; a long rest always returns to
/// work.
pub fn next_mode(completed: Mode) -> Mode {
    match completed {
        Mode::Work => Mode::RestEyes,
        Mode::RestEyes => Mode::Work,
        Mode::LongRest => Mode::Work,
    }
}

/// Build the successor session for a completed one
///
/// The successor starts paused at its full configured duration with a fresh
/// session id; one user action resumes it.
pub fn transition_state(completed: Mode, settings: &Settings, now: DateTime<Utc>) -> TimerState {
    let mode = next_mode(completed);
    let mut state = TimerState::new_session(mode, settings.duration_seconds(mode), now);
    state.is_running = false;
    state.is_paused = true;
    state.started_at = None;
    state
}
