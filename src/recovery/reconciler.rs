//! Startup recovery: decide what timer state, if any, to reinstate
//!
//! Runs once at process start, before the tick stream begins. Reads the
//! canonical document, falls back through backups when it is corrupt or
//! invalid, applies the staleness policy, then reconciles the snapshot
//! against the wall-clock time that passed while the process was down.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::persistence::StateStore;
use crate::policy::transitions;
use crate::state::{Mode, Settings, TimerState};

/// What recovery decided to hand the engine
#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryOutcome {
    /// Nothing resumable; the app starts fresh
    NoSession,
    /// Install this state as the current session
    Resumed(TimerState),
    /// A running session ran out while the process was down: signal
    /// completion now, then install the successor if auto-transition is on
    CompletedOffline {
        completed: TimerState,
        next: Option<TimerState>,
    },
    /// The process died between persisting a completed session and its
    /// successor; the transition is re-derived and installed
    TransitionReplayed { from: Mode, next: TimerState },
}

/// Decide the startup state from whatever the store holds
pub fn recover(store: &StateStore, settings: &Settings, now: DateTime<Utc>) -> RecoveryOutcome {
    let Some(state) = load_valid_snapshot(store, now) else {
        return RecoveryOutcome::NoSession;
    };

    // Staleness: a session last saved too long ago is not worth resuming
    let Some(persisted_at) = state.last_persisted_at else {
        info!("Snapshot has no persist timestamp, not resuming");
        return RecoveryOutcome::NoSession;
    };
    let age = now - persisted_at;
    if age > chrono::Duration::days(settings.max_snapshot_age_days) {
        info!(
            "Snapshot is {} days old (limit {}), not resuming",
            age.num_days(),
            settings.max_snapshot_age_days
        );
        return RecoveryOutcome::NoSession;
    }

    if state.is_completed() {
        // Terminal snapshot with no successor on disk: the save of the
        // transitioned state never happened. Replay it.
        if settings.auto_transition_enabled {
            let next = transitions::transition_state(state.mode, settings, now);
            info!(
                "Replaying interrupted transition {} -> {}",
                state.mode.display_name(),
                next.mode.display_name()
            );
            return RecoveryOutcome::TransitionReplayed {
                from: state.mode,
                next,
            };
        }
        return RecoveryOutcome::NoSession;
    }

    if state.is_paused {
        // Paused time does not elapse; restore exactly as saved
        info!(
            "Resuming paused {} session, {}s remaining",
            state.mode.display_name(),
            state.remaining_seconds
        );
        return RecoveryOutcome::Resumed(state);
    }

    // Running snapshot: the countdown kept conceptually running while the
    // process was down, so charge the downtime against it.
    let downtime = (now - persisted_at).num_seconds().max(0);
    let adjusted = state.remaining_seconds - downtime;

    if adjusted <= 0 {
        let mut completed = state;
        completed.remaining_seconds = 0;
        completed.is_running = false;
        completed.is_paused = false;
        info!(
            "{} session finished while the app was not running",
            completed.mode.display_name()
        );
        let next = settings
            .auto_transition_enabled
            .then(|| transitions::transition_state(completed.mode, settings, now));
        return RecoveryOutcome::CompletedOffline { completed, next };
    }

    let mut resumed = state;
    resumed.remaining_seconds = adjusted;
    resumed.started_at = Some(now);
    info!(
        "Resuming running {} session, {}s remaining after {}s of downtime",
        resumed.mode.display_name(),
        resumed.remaining_seconds,
        downtime
    );
    RecoveryOutcome::Resumed(resumed)
}

/// The canonical snapshot if valid, else the newest valid backup snapshot
fn load_valid_snapshot(store: &StateStore, now: DateTime<Utc>) -> Option<TimerState> {
    match store.load() {
        Ok(Some(doc)) => {
            if let Some(state) = doc.timer_state {
                match state.validate(now) {
                    Ok(()) => return Some(state),
                    Err(e) => warn!("Canonical snapshot invalid ({}), trying backups", e),
                }
            } else {
                return None;
            }
        }
        Ok(None) => return None,
        Err(e) => warn!("Canonical document unreadable ({}), trying backups", e),
    }

    let backups = match store.list_backups() {
        Ok(backups) => backups,
        Err(e) => {
            warn!("Cannot list backups: {}", e);
            return None;
        }
    };

    for path in backups.iter().rev() {
        match store.load_backup(path) {
            Ok(doc) => {
                if let Some(state) = doc.timer_state {
                    if state.is_valid(now) {
                        info!("Recovered snapshot from backup {}", path.display());
                        return Some(state);
                    }
                }
            }
            Err(e) => warn!("Backup {} unreadable: {}", path.display(), e),
        }
    }

    info!("No valid snapshot in canonical document or backups");
    None
}
