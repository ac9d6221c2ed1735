//! Quit confirmation policy

use serde::{Deserialize, Serialize};

use crate::state::TimerState;

/// The user's choice when quitting with an active timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum QuitAction {
    /// Stop the timer, clear the stored session, then exit
    StopAndQuit,
    /// Save the current session and exit; next launch resumes it
    PreserveAndQuit,
    /// Keep running, abort the quit
    Cancel,
}

/// What the shell should do after the quit policy ran
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuitOutcome {
    /// The process may exit
    Exit,
    /// The quit was cancelled; keep running
    Continue,
}

/// Whether quitting needs a user decision
///
/// Only a running or paused session is worth a dialog; with the timer
/// stopped the quit proceeds unconditionally.
pub fn dialog_needed(state: Option<&TimerState>) -> bool {
    state.map(TimerState::is_active).unwrap_or(false)
}
