//! The timer core bundle
//!
//! `TimerCore` owns the engine, the persistence coordinator, and the
//! recovery policy, and exposes the operations the UI shell calls. It is
//! constructed once by the process entry point and shared behind an `Arc`;
//! nothing in the crate reaches for global state.

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, watch};
use tracing::{info, warn};

use crate::engine::{TickOutcome, TimerEngine, TimerEvent};
use crate::error::TimerError;
use crate::persistence::{PersistenceCoordinator, StateStore};
use crate::policy::{self, QuitAction, QuitOutcome};
use crate::recovery::{self, RecoveryOutcome};
use crate::state::{DisplayState, Mode, Settings};

/// Engine + persistence + policies, wired together
#[derive(Debug)]
pub struct TimerCore {
    engine: TimerEngine,
    persistence: PersistenceCoordinator,
}

impl TimerCore {
    pub fn new(store: StateStore) -> Self {
        Self {
            engine: TimerEngine::new(),
            persistence: PersistenceCoordinator::new(store),
        }
    }

    /// Load settings, reconcile any stored session, install the result
    ///
    /// Must run before the tick stream starts.
    pub fn recover_on_startup(&self, now: DateTime<Utc>) -> Result<DisplayState, TimerError> {
        match self.persistence.store().load() {
            Ok(Some(doc)) => self.persistence.set_settings(doc.settings),
            Ok(None) => info!("No stored document, starting with default settings"),
            Err(e) => warn!("Stored document unreadable, using default settings: {}", e),
        }
        let settings = self.persistence.settings();

        match recovery::recover(self.persistence.store(), &settings, now) {
            RecoveryOutcome::NoSession => {}
            RecoveryOutcome::Resumed(state) => {
                let state = self.engine.install(state)?;
                self.persist_change(&state, now);
                self.engine.publish(TimerEvent::SessionRecovered {
                    display: state.display(),
                });
            }
            RecoveryOutcome::CompletedOffline { completed, next } => {
                // Terminal state first, successor second, so a crash in
                // between is replayable on the next launch
                self.persist_change(&completed, now);
                self.engine.publish(TimerEvent::Completed {
                    mode: completed.mode,
                    total_minutes: completed.total_duration_seconds / 60,
                });
                match next {
                    Some(next) => {
                        let mode = next.mode;
                        let next = self.engine.install(next)?;
                        self.persist_change(&next, now);
                        self.engine.publish(TimerEvent::AutoTransition {
                            mode,
                            display: next.display(),
                        });
                    }
                    None => {
                        self.persistence.clear(now);
                    }
                }
            }
            RecoveryOutcome::TransitionReplayed { from, next } => {
                let next = self.engine.install(next)?;
                self.persist_change(&next, now);
                self.engine.publish(TimerEvent::AutoTransition {
                    mode: next.mode,
                    display: next.display(),
                });
                info!(
                    "Installed replayed transition {} -> {}",
                    from.display_name(),
                    next.mode.display_name()
                );
            }
        }

        Ok(self.engine.display_state())
    }

    /// Start a session in `mode` at its configured duration
    pub fn start_timer(&self, mode: Mode, now: DateTime<Utc>) -> Result<DisplayState, TimerError> {
        let duration = self.persistence.settings().duration_seconds(mode);
        let state = self.engine.start(mode, duration, now)?;
        self.persist_change(&state, now);
        Ok(state.display())
    }

    pub fn pause_timer(&self, now: DateTime<Utc>) -> Result<DisplayState, TimerError> {
        if let Some(state) = self.engine.pause(now)? {
            self.persist_change(&state, now);
        }
        Ok(self.engine.display_state())
    }

    pub fn resume_timer(&self, now: DateTime<Utc>) -> Result<DisplayState, TimerError> {
        if let Some(state) = self.engine.resume(now)? {
            self.persist_change(&state, now);
        }
        Ok(self.engine.display_state())
    }

    /// Stop and clear: the session is discarded in memory and on disk
    pub fn stop_timer(&self, now: DateTime<Utc>) -> Result<DisplayState, TimerError> {
        if self.engine.stop()?.is_some() {
            self.persistence.clear(now);
        }
        Ok(self.engine.display_state())
    }

    /// One tick of the countdown; drives completion and auto-transition
    pub fn tick(&self, now: DateTime<Utc>) -> Result<(), TimerError> {
        let TickOutcome::Completed(completed) = self.engine.tick(now)? else {
            return Ok(());
        };

        self.persist_change(&completed, now);

        let settings = self.persistence.settings();
        if settings.auto_transition_enabled {
            let next = policy::transition_state(completed.mode, &settings, now);
            let mode = next.mode;
            let next = self.engine.install(next)?;
            self.persist_change(&next, now);
            self.engine.publish(TimerEvent::AutoTransition {
                mode,
                display: next.display(),
            });
        }
        Ok(())
    }

    /// Periodic save with backup rotation; no-op without an active session
    pub fn autosave(&self, now: DateTime<Utc>) -> Result<(), TimerError> {
        if let Some(state) = self.engine.current()? {
            if state.is_active() {
                match self.persistence.periodic_autosave(&state, now) {
                    Some(stamped) => self.engine.mark_persisted(&stamped),
                    None => self.publish_persistence_warning(),
                }
            }
        }
        Ok(())
    }

    /// Force an immediate snapshot ahead of system sleep
    pub fn on_suspend_requested(&self, now: DateTime<Utc>) -> Result<(), TimerError> {
        if let Some(state) = self.engine.current()? {
            if state.is_active() {
                match self.persistence.on_suspend_requested(&state, now) {
                    Some(stamped) => self.engine.mark_persisted(&stamped),
                    None => self.publish_persistence_warning(),
                }
            }
        }
        Ok(())
    }

    /// The display to show in a quit dialog, or `None` to quit silently
    pub fn quit_prompt_needed(&self) -> Result<Option<DisplayState>, TimerError> {
        let current = self.engine.current()?;
        Ok(policy::dialog_needed(current.as_ref()).then(|| self.engine.display_state()))
    }

    /// Execute the user's quit decision
    pub fn apply_quit(
        &self,
        action: QuitAction,
        now: DateTime<Utc>,
    ) -> Result<QuitOutcome, TimerError> {
        match action {
            QuitAction::StopAndQuit => {
                info!("Quit: stopping timer and clearing stored session");
                self.engine.stop()?;
                self.persistence.clear(now);
                Ok(QuitOutcome::Exit)
            }
            QuitAction::PreserveAndQuit => {
                if let Some(state) = self.engine.current()? {
                    info!(
                        "Quit: preserving {} session for next launch",
                        state.mode.display_name()
                    );
                    match self.persistence.on_state_changed(&state, now) {
                        Some(stamped) => self.engine.mark_persisted(&stamped),
                        None => self.publish_persistence_warning(),
                    }
                }
                Ok(QuitOutcome::Exit)
            }
            QuitAction::Cancel => Ok(QuitOutcome::Continue),
        }
    }

    pub fn current_display_state(&self) -> DisplayState {
        self.engine.display_state()
    }

    pub fn settings(&self) -> Settings {
        self.persistence.settings()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<TimerEvent> {
        self.engine.subscribe_events()
    }

    pub fn subscribe_display(&self) -> watch::Receiver<DisplayState> {
        self.engine.subscribe_display()
    }

    /// Most recent save failure, for the shell to surface
    pub fn last_persistence_error(&self) -> Option<String> {
        self.persistence.last_error()
    }

    fn persist_change(&self, state: &crate::state::TimerState, now: DateTime<Utc>) {
        match self.persistence.on_state_changed(state, now) {
            Some(stamped) => self.engine.mark_persisted(&stamped),
            None => self.publish_persistence_warning(),
        }
    }

    fn publish_persistence_warning(&self) {
        if let Some(message) = self.persistence.last_error() {
            self.engine.publish(TimerEvent::PersistenceWarning { message });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fixed_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    fn t0() -> DateTime<Utc> {
        fixed_time("2026-02-16T09:00:00Z")
    }

    fn core_in(dir: &TempDir) -> TimerCore {
        TimerCore::new(StateStore::open(dir.path()).expect("open store"))
    }

    #[test]
    fn completion_auto_transitions_and_persists_rest_eyes() {
        let dir = TempDir::new().expect("temp dir");
        let core = core_in(&dir);
        core.recover_on_startup(t0()).expect("recover");
        let mut events = core.subscribe_events();

        core.start_timer(Mode::Work, t0()).expect("start");
        core.tick(t0() + chrono::Duration::seconds(1500))
            .expect("tick to completion");

        // Completion fires once, then the auto-transition event
        assert_eq!(
            events.try_recv().expect("completed event"),
            TimerEvent::Completed {
                mode: Mode::Work,
                total_minutes: 25
            }
        );
        match events.try_recv().expect("transition event") {
            TimerEvent::AutoTransition { mode, display } => {
                assert_eq!(mode, Mode::RestEyes);
                assert!(display.is_paused);
            }
            other => panic!("expected auto-transition, got {other:?}"),
        }

        // The persisted document reflects the successor session
        let doc = StateStore::open(dir.path())
            .expect("reopen store")
            .load()
            .expect("load")
            .expect("document present");
        let state = doc.timer_state.expect("timer state");
        assert_eq!(state.mode, Mode::RestEyes);
        assert!(state.is_paused);
        assert_eq!(state.remaining_seconds, 300);

        let raw = std::fs::read_to_string(dir.path().join("settings.json")).expect("read doc");
        assert!(raw.contains("\"rest_eyes\""));
    }

    #[test]
    fn quit_preserve_roundtrip_resumes_same_session() {
        let dir = TempDir::new().expect("temp dir");
        let core = core_in(&dir);
        core.recover_on_startup(t0()).expect("recover");

        core.start_timer(Mode::Work, t0()).expect("start");
        core.tick(t0() + chrono::Duration::seconds(100))
            .expect("tick");
        let before_quit = core.current_display_state();
        assert_eq!(before_quit.remaining_seconds, 1400);

        let quit_at = t0() + chrono::Duration::seconds(100);
        assert_eq!(
            core.apply_quit(QuitAction::PreserveAndQuit, quit_at)
                .expect("quit"),
            QuitOutcome::Exit
        );
        let saved_session = StateStore::open(dir.path())
            .expect("reopen")
            .load()
            .expect("load")
            .expect("doc")
            .timer_state
            .expect("state")
            .session_id;

        // Fresh process 60s later: same session, downtime charged
        let relaunched = core_in(&dir);
        let display = relaunched
            .recover_on_startup(quit_at + chrono::Duration::seconds(60))
            .expect("recover");
        assert_eq!(display.mode, Some(Mode::Work));
        assert_eq!(display.remaining_seconds, 1340);

        let resumed = relaunched
            .persistence
            .store()
            .load()
            .expect("load")
            .expect("doc")
            .timer_state
            .expect("state");
        assert_eq!(resumed.session_id, saved_session);
    }

    #[test]
    fn stop_and_quit_clears_stored_session() {
        let dir = TempDir::new().expect("temp dir");
        let core = core_in(&dir);
        core.recover_on_startup(t0()).expect("recover");
        core.start_timer(Mode::Work, t0()).expect("start");

        assert_eq!(
            core.apply_quit(QuitAction::StopAndQuit, t0())
                .expect("quit"),
            QuitOutcome::Exit
        );

        let relaunched = core_in(&dir);
        let display = relaunched.recover_on_startup(t0()).expect("recover");
        assert_eq!(display, DisplayState::idle());
    }

    #[test]
    fn cancel_quit_changes_nothing() {
        let dir = TempDir::new().expect("temp dir");
        let core = core_in(&dir);
        core.recover_on_startup(t0()).expect("recover");
        core.start_timer(Mode::Work, t0()).expect("start");

        assert!(core.quit_prompt_needed().expect("prompt").is_some());
        assert_eq!(
            core.apply_quit(QuitAction::Cancel, t0()).expect("quit"),
            QuitOutcome::Continue
        );
        assert!(core.current_display_state().is_running);
    }

    #[test]
    fn quit_without_session_needs_no_prompt() {
        let dir = TempDir::new().expect("temp dir");
        let core = core_in(&dir);
        core.recover_on_startup(t0()).expect("recover");
        assert!(core.quit_prompt_needed().expect("prompt").is_none());
    }

    #[test]
    fn stop_timer_clears_store() {
        let dir = TempDir::new().expect("temp dir");
        let core = core_in(&dir);
        core.recover_on_startup(t0()).expect("recover");
        core.start_timer(Mode::LongRest, t0()).expect("start");
        core.stop_timer(t0() + chrono::Duration::seconds(5))
            .expect("stop");

        let doc = core
            .persistence
            .store()
            .load()
            .expect("load")
            .expect("doc");
        assert!(doc.timer_state.is_none());
        assert_eq!(core.current_display_state(), DisplayState::idle());
    }

    #[test]
    fn settings_from_document_drive_start_duration() {
        let dir = TempDir::new().expect("temp dir");
        {
            let store = StateStore::open(dir.path()).expect("open");
            let mut doc = crate::persistence::StoredDocument::default();
            doc.settings.work_duration_minutes = 50;
            doc.touch(t0(), 0);
            store.save(&doc).expect("save settings doc");
        }

        let core = core_in(&dir);
        core.recover_on_startup(t0()).expect("recover");
        let display = core.start_timer(Mode::Work, t0()).expect("start");
        assert_eq!(display.total_duration_seconds, 3000);
    }

    #[test]
    fn offline_completion_emits_events_on_startup() {
        let dir = TempDir::new().expect("temp dir");
        {
            let core = core_in(&dir);
            core.recover_on_startup(t0()).expect("recover");
            core.start_timer(Mode::Work, t0()).expect("start");
            // Last save has the full 1500s remaining; process "dies" here
        }

        let relaunched = core_in(&dir);
        let mut events = relaunched.subscribe_events();
        let display = relaunched
            .recover_on_startup(t0() + chrono::Duration::seconds(2000))
            .expect("recover");

        assert_eq!(
            events.try_recv().expect("completed event"),
            TimerEvent::Completed {
                mode: Mode::Work,
                total_minutes: 25
            }
        );
        assert!(matches!(
            events.try_recv().expect("transition event"),
            TimerEvent::AutoTransition {
                mode: Mode::RestEyes,
                ..
            }
        ));
        assert_eq!(display.mode, Some(Mode::RestEyes));
        assert!(display.is_paused);
    }
}
