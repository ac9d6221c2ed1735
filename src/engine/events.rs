//! Events published to the UI shell

use crate::state::{DisplayState, Mode};

/// Discrete notifications the shell consumes on its own schedule
///
/// Continuous per-second display updates travel on the watch channel
/// instead, so a slow shell never backs up the tick stream.
#[derive(Debug, Clone, PartialEq)]
pub enum TimerEvent {
    /// A session ran to zero; fired exactly once per session
    Completed { mode: Mode, total_minutes: i64 },
    /// An automatic mode transition installed a new paused session
    AutoTransition { mode: Mode, display: DisplayState },
    /// A previous session was restored at startup
    SessionRecovered { display: DisplayState },
    /// A save failed; the countdown is unaffected but disk is behind
    PersistenceWarning { message: String },
}
