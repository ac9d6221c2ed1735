//! The authoritative countdown state machine
//!
//! One mutex guards read-or-mutate of the current session; every
//! collaborator gets snapshot clones, never a reference into the lock.
//! Remaining time is always recomputed from absolute wall-clock elapsed
//! against the last (re)start point, never decremented per tick, so a missed
//! tick or a sleeping host self-corrects on the next tick.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, watch};
use tracing::{debug, info};

use crate::engine::events::TimerEvent;
use crate::error::TimerError;
use crate::state::{DisplayState, Mode, TimerState};

/// Result of one tick of the countdown
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Nothing to do: no session, paused, or already completed
    Idle,
    /// Countdown advanced and is still running
    Running(TimerState),
    /// Countdown reached zero on this tick; completion fired
    Completed(TimerState),
}

/// Current session plus the baseline the elapsed math runs against
#[derive(Debug)]
struct Session {
    state: TimerState,
    /// Remaining seconds at the instant `started_at` was last set
    baseline_remaining: i64,
}

/// Owns the one authoritative countdown
#[derive(Debug)]
pub struct TimerEngine {
    session: Mutex<Option<Session>>,
    /// Continuous display stream for the UI shell
    display_tx: watch::Sender<DisplayState>,
    /// Keep the receiver alive to prevent channel closure
    _display_rx: watch::Receiver<DisplayState>,
    /// Discrete event stream (completion, transitions, warnings)
    event_tx: broadcast::Sender<TimerEvent>,
}

impl TimerEngine {
    pub fn new() -> Self {
        let (display_tx, display_rx) = watch::channel(DisplayState::idle());
        let (event_tx, _) = broadcast::channel(64);

        Self {
            session: Mutex::new(None),
            display_tx,
            _display_rx: display_rx,
            event_tx,
        }
    }

    /// Subscribe to discrete timer events
    pub fn subscribe_events(&self) -> broadcast::Receiver<TimerEvent> {
        self.event_tx.subscribe()
    }

    /// Subscribe to the per-second display stream
    pub fn subscribe_display(&self) -> watch::Receiver<DisplayState> {
        self.display_tx.subscribe()
    }

    /// Snapshot of the current session, if any
    pub fn current(&self) -> Result<Option<TimerState>, TimerError> {
        self.session
            .lock()
            .map(|guard| guard.as_ref().map(|session| session.state.clone()))
            .map_err(|e| TimerError::LockPoisoned(e.to_string()))
    }

    /// Display projection of the current session (idle when none)
    pub fn display_state(&self) -> DisplayState {
        self.session
            .lock()
            .ok()
            .and_then(|guard| guard.as_ref().map(|session| session.state.display()))
            .unwrap_or_default()
    }

    /// Start a fresh session
    ///
    /// Allowed from Stopped (no session) or Completed; an active session
    /// must be stopped first. Rejects non-positive durations.
    pub fn start(
        &self,
        mode: Mode,
        duration_seconds: i64,
        now: DateTime<Utc>,
    ) -> Result<TimerState, TimerError> {
        if duration_seconds <= 0 {
            return Err(TimerError::InvalidDuration(duration_seconds));
        }

        let mut guard = self
            .session
            .lock()
            .map_err(|e| TimerError::LockPoisoned(e.to_string()))?;

        if let Some(session) = guard.as_ref() {
            if session.state.is_running {
                return Err(TimerError::SessionActive("running"));
            }
            if session.state.is_paused {
                return Err(TimerError::SessionActive("paused"));
            }
        }

        let state = TimerState::new_session(mode, duration_seconds, now);
        info!(
            "Starting {} session ({}s), session {}",
            mode.display_name(),
            duration_seconds,
            state.session_id
        );

        *guard = Some(Session {
            state: state.clone(),
            baseline_remaining: duration_seconds,
        });
        drop(guard);

        self.publish_display();
        Ok(state)
    }

    /// Pause a running session; no-op (`Ok(None)`) if not running
    pub fn pause(&self, now: DateTime<Utc>) -> Result<Option<TimerState>, TimerError> {
        let mut guard = self
            .session
            .lock()
            .map_err(|e| TimerError::LockPoisoned(e.to_string()))?;

        let Some(session) = guard.as_mut() else {
            return Ok(None);
        };
        if !session.state.is_running {
            return Ok(None);
        }

        // Settle the countdown to this instant before freezing it
        session.state.remaining_seconds = session.remaining_at(now);
        session.state.is_running = false;
        session.state.is_paused = true;
        let state = session.state.clone();
        drop(guard);

        info!("Paused with {}s remaining", state.remaining_seconds);
        self.publish_display();
        Ok(Some(state))
    }

    /// Resume a paused session; no-op (`Ok(None)`) if not paused
    ///
    /// Resets the elapsed baseline: paused time never counts against the
    /// countdown.
    pub fn resume(&self, now: DateTime<Utc>) -> Result<Option<TimerState>, TimerError> {
        let mut guard = self
            .session
            .lock()
            .map_err(|e| TimerError::LockPoisoned(e.to_string()))?;

        let Some(session) = guard.as_mut() else {
            return Ok(None);
        };
        if !session.state.is_paused {
            return Ok(None);
        }

        session.state.is_running = true;
        session.state.is_paused = false;
        session.state.started_at = Some(now);
        session.baseline_remaining = session.state.remaining_seconds;
        let state = session.state.clone();
        drop(guard);

        info!("Resumed with {}s remaining", state.remaining_seconds);
        self.publish_display();
        Ok(Some(state))
    }

    /// Stop from any state; the session is discarded
    ///
    /// Returns the final snapshot (remaining reset to the full duration)
    /// for callers that still want to inspect it.
    pub fn stop(&self) -> Result<Option<TimerState>, TimerError> {
        let mut guard = self
            .session
            .lock()
            .map_err(|e| TimerError::LockPoisoned(e.to_string()))?;

        let stopped = guard.take().map(|session| {
            let mut state = session.state;
            state.remaining_seconds = state.total_duration_seconds;
            state.is_running = false;
            state.is_paused = false;
            state.started_at = None;
            state
        });
        drop(guard);

        if stopped.is_some() {
            info!("Timer stopped");
            self.publish_display();
        }
        Ok(stopped)
    }

    /// Advance the countdown; called once per second while running
    ///
    /// A tick while not running is a no-op. Completion is signaled exactly
    /// once: the transition to Completed happens on the tick that reaches
    /// zero, and later ticks see a non-running session.
    pub fn tick(&self, now: DateTime<Utc>) -> Result<TickOutcome, TimerError> {
        let mut guard = self
            .session
            .lock()
            .map_err(|e| TimerError::LockPoisoned(e.to_string()))?;

        let Some(session) = guard.as_mut() else {
            return Ok(TickOutcome::Idle);
        };
        if !session.state.is_running {
            return Ok(TickOutcome::Idle);
        }

        session.state.remaining_seconds = session.remaining_at(now);

        let outcome = if session.state.remaining_seconds == 0 {
            session.state.is_running = false;
            session.state.is_paused = false;
            TickOutcome::Completed(session.state.clone())
        } else {
            TickOutcome::Running(session.state.clone())
        };
        drop(guard);

        self.publish_display();

        if let TickOutcome::Completed(state) = &outcome {
            info!("{} session completed", state.mode.display_name());
            self.publish(TimerEvent::Completed {
                mode: state.mode,
                total_minutes: state.total_duration_seconds / 60,
            });
        }
        Ok(outcome)
    }

    /// Install a recovered or transitioned state directly
    ///
    /// Bypasses the fresh-session semantics of `start()`: the session id and
    /// flags come in as-is, and the elapsed baseline is the state's own
    /// remaining time.
    pub fn install(&self, state: TimerState) -> Result<TimerState, TimerError> {
        let mut guard = self
            .session
            .lock()
            .map_err(|e| TimerError::LockPoisoned(e.to_string()))?;

        debug!(
            "Installing session {} ({}s remaining, running={}, paused={})",
            state.session_id, state.remaining_seconds, state.is_running, state.is_paused
        );
        *guard = Some(Session {
            baseline_remaining: state.remaining_seconds,
            state: state.clone(),
        });
        drop(guard);

        self.publish_display();
        Ok(state)
    }

    /// Copy persistence stamps back onto the live session after a save
    ///
    /// No-op if the session changed between snapshot and save.
    pub fn mark_persisted(&self, persisted: &TimerState) {
        let Ok(mut guard) = self.session.lock() else {
            return;
        };
        if let Some(session) = guard.as_mut() {
            if session.state.session_id == persisted.session_id {
                session.state.last_persisted_at = persisted.last_persisted_at;
                session.state.survived_sleep = persisted.survived_sleep;
            }
        }
    }

    /// Publish a discrete event to all shell subscribers
    pub fn publish(&self, event: TimerEvent) {
        // No subscribers yet is normal (e.g. before the shell attaches)
        if let Err(e) = self.event_tx.send(event) {
            debug!("No event subscribers: {}", e);
        }
    }

    fn publish_display(&self) {
        let display = self.display_state();
        if let Err(e) = self.display_tx.send(display) {
            debug!("Display channel closed: {}", e);
        }
    }
}

impl Default for TimerEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// Remaining seconds at `now`, derived from the absolute baseline
    fn remaining_at(&self, now: DateTime<Utc>) -> i64 {
        let Some(started_at) = self.state.started_at else {
            return self.state.remaining_seconds;
        };
        let elapsed = (now - started_at).num_seconds().max(0);
        (self.baseline_remaining - elapsed).max(0)
    }
}
