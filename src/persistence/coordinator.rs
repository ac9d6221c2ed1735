//! Keeps the durable store consistent with the in-memory timer
//!
//! All writes funnel through one internal mutex, so a racing autosave and
//! state-change save cannot interleave, and a freshness guard drops any save
//! whose snapshot is older than the last one written. Failures never
//! propagate to the countdown: they are logged, recorded for the shell to
//! query, and the timer keeps running in memory until the next save lands.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::persistence::document::StoredDocument;
use crate::persistence::store::StateStore;
use crate::state::{Settings, TimerState};

/// Number of rotating backups retained
pub const BACKUP_LIMIT: usize = 5;

/// Identity of the last snapshot successfully written
#[derive(Debug)]
struct WriteMark {
    session_id: String,
    remaining_seconds: i64,
}

/// Single-writer persistence front for the timer core
#[derive(Debug)]
pub struct PersistenceCoordinator {
    store: StateStore,
    /// Serializes all saves; holds the freshness guard state
    write_mark: Mutex<Option<WriteMark>>,
    /// Settings block composed into every saved document
    settings: Mutex<Settings>,
    /// Most recent save failure, queryable by the shell
    last_error: Mutex<Option<String>>,
}

impl PersistenceCoordinator {
    pub fn new(store: StateStore) -> Self {
        Self {
            store,
            write_mark: Mutex::new(None),
            settings: Mutex::new(Settings::default()),
            last_error: Mutex::new(None),
        }
    }

    /// Read access to the underlying store (startup recovery only)
    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// Replace the cached settings block written with every document
    pub fn set_settings(&self, settings: Settings) {
        if let Ok(mut guard) = self.settings.lock() {
            *guard = settings;
        }
    }

    pub fn settings(&self) -> Settings {
        self.settings
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    /// Save after a state-machine mutation (start/pause/resume/completion)
    ///
    /// Returns the snapshot as persisted (with `last_persisted_at` stamped),
    /// or `None` if the save failed or was dropped as stale.
    pub fn on_state_changed(&self, state: &TimerState, now: DateTime<Utc>) -> Option<TimerState> {
        self.save_snapshot(state, now, false, false)
    }

    /// 30-second cadence save; also writes and rotates a backup
    pub fn periodic_autosave(&self, state: &TimerState, now: DateTime<Utc>) -> Option<TimerState> {
        self.save_snapshot(state, now, true, false)
    }

    /// Immediate save on an imminent-system-sleep signal
    pub fn on_suspend_requested(
        &self,
        state: &TimerState,
        now: DateTime<Utc>,
    ) -> Option<TimerState> {
        info!("Suspend requested, forcing snapshot save");
        self.save_snapshot(state, now, false, true)
    }

    /// Remove the timer-state block from the document (explicit stop)
    pub fn clear(&self, now: DateTime<Utc>) -> bool {
        let Ok(mut mark) = self.write_mark.lock() else {
            return false;
        };

        let mut doc = StoredDocument {
            timer_state: None,
            settings: self.settings(),
            ..StoredDocument::default()
        };
        doc.touch(now, self.backup_count());

        match self.store.save(&doc) {
            Ok(()) => {
                *mark = None;
                self.record_success();
                info!("Timer state cleared from store");
                true
            }
            Err(e) => {
                self.record_failure(&e.to_string());
                false
            }
        }
    }

    /// Most recent persistence failure, if the latest save did not succeed
    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().ok().and_then(|guard| guard.clone())
    }

    fn save_snapshot(
        &self,
        state: &TimerState,
        now: DateTime<Utc>,
        make_backup: bool,
        mark_suspend: bool,
    ) -> Option<TimerState> {
        let Ok(mut mark) = self.write_mark.lock() else {
            self.record_failure("persistence write lock poisoned");
            return None;
        };

        // An in-flight save carrying an older snapshot of the same session
        // must not overwrite a newer one; remaining time only decreases.
        if let Some(written) = mark.as_ref() {
            if written.session_id == state.session_id
                && state.remaining_seconds > written.remaining_seconds
            {
                debug!(
                    "Skipping stale save ({}s remaining vs {}s already written)",
                    state.remaining_seconds, written.remaining_seconds
                );
                return None;
            }
        }

        let mut stamped = state.clone();
        stamped.last_persisted_at = Some(now);
        if mark_suspend {
            stamped.survived_sleep = true;
        }

        let mut doc = StoredDocument {
            timer_state: Some(stamped.clone()),
            settings: self.settings(),
            ..StoredDocument::default()
        };
        doc.touch(now, self.backup_count());

        if let Err(e) = self.store.save(&doc) {
            self.record_failure(&e.to_string());
            return None;
        }

        *mark = Some(WriteMark {
            session_id: stamped.session_id.clone(),
            remaining_seconds: stamped.remaining_seconds,
        });
        self.record_success();

        if make_backup {
            self.rotate_backups(&doc, now);
        }

        Some(stamped)
    }

    fn rotate_backups(&self, doc: &StoredDocument, now: DateTime<Utc>) {
        if let Err(e) = self.store.write_backup(doc, now) {
            warn!("Backup write failed: {}", e);
            return;
        }
        match self.store.prune_backups(BACKUP_LIMIT) {
            Ok(0) => {}
            Ok(n) => debug!("Pruned {} old backups", n),
            Err(e) => warn!("Backup pruning failed: {}", e),
        }
    }

    fn backup_count(&self) -> usize {
        self.store
            .list_backups()
            .map(|backups| backups.len())
            .unwrap_or(0)
    }

    fn record_failure(&self, message: &str) {
        warn!("Persistence failure (timer continues in memory): {}", message);
        if let Ok(mut guard) = self.last_error.lock() {
            *guard = Some(message.to_string());
        }
    }

    fn record_success(&self) {
        if let Ok(mut guard) = self.last_error.lock() {
            *guard = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Mode;
    use tempfile::TempDir;

    fn fixed_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    fn coordinator_in(dir: &TempDir) -> PersistenceCoordinator {
        let store = StateStore::open(dir.path()).expect("open store");
        PersistenceCoordinator::new(store)
    }

    #[test]
    fn state_change_save_stamps_and_lands_on_disk() {
        let dir = TempDir::new().expect("temp dir");
        let coordinator = coordinator_in(&dir);
        let now = fixed_time("2026-02-16T09:00:00Z");
        let state = TimerState::new_session(Mode::Work, 1500, now);

        let stamped = coordinator
            .on_state_changed(&state, now)
            .expect("save succeeds");
        assert_eq!(stamped.last_persisted_at, Some(now));

        let doc = coordinator
            .store()
            .load()
            .expect("load")
            .expect("document present");
        assert_eq!(doc.timer_state, Some(stamped));
        assert_eq!(doc.metadata.last_saved, Some(now));
        assert!(coordinator.last_error().is_none());
    }

    #[test]
    fn stale_snapshot_does_not_overwrite_newer_one() {
        let dir = TempDir::new().expect("temp dir");
        let coordinator = coordinator_in(&dir);
        let now = fixed_time("2026-02-16T09:00:00Z");
        let mut state = TimerState::new_session(Mode::Work, 1500, now);

        state.remaining_seconds = 1400;
        assert!(coordinator.on_state_changed(&state, now).is_some());

        // A save racing in with an older (larger-remaining) snapshot loses
        state.remaining_seconds = 1450;
        assert!(coordinator
            .on_state_changed(&state, now + chrono::Duration::seconds(1))
            .is_none());

        let doc = coordinator.store().load().expect("load").expect("doc");
        assert_eq!(
            doc.timer_state.expect("timer state").remaining_seconds,
            1400
        );
    }

    #[test]
    fn autosave_rotates_backups_to_limit() {
        let dir = TempDir::new().expect("temp dir");
        let coordinator = coordinator_in(&dir);
        let base = fixed_time("2026-02-16T09:00:00Z");
        let mut state = TimerState::new_session(Mode::Work, 1500, base);

        for i in 0..10 {
            state.remaining_seconds = 1500 - 30 * i;
            let at = base + chrono::Duration::seconds(30 * i);
            assert!(coordinator.periodic_autosave(&state, at).is_some());
        }

        let backups = coordinator.store().list_backups().expect("list");
        assert_eq!(backups.len(), BACKUP_LIMIT);
    }

    #[test]
    fn suspend_save_sets_survived_sleep() {
        let dir = TempDir::new().expect("temp dir");
        let coordinator = coordinator_in(&dir);
        let now = fixed_time("2026-02-16T09:00:00Z");
        let state = TimerState::new_session(Mode::Work, 1500, now);

        let stamped = coordinator
            .on_suspend_requested(&state, now)
            .expect("suspend save");
        assert!(stamped.survived_sleep);

        let doc = coordinator.store().load().expect("load").expect("doc");
        assert!(doc.timer_state.expect("timer state").survived_sleep);
    }

    #[test]
    fn clear_removes_timer_block_but_keeps_settings() {
        let dir = TempDir::new().expect("temp dir");
        let coordinator = coordinator_in(&dir);
        let now = fixed_time("2026-02-16T09:00:00Z");

        let mut settings = Settings::default();
        settings.work_duration_minutes = 50;
        coordinator.set_settings(settings.clone());

        let state = TimerState::new_session(Mode::Work, 3000, now);
        assert!(coordinator.on_state_changed(&state, now).is_some());
        assert!(coordinator.clear(now + chrono::Duration::seconds(5)));

        let doc = coordinator.store().load().expect("load").expect("doc");
        assert!(doc.timer_state.is_none());
        assert_eq!(doc.settings, settings);
    }

    #[test]
    fn new_session_always_beats_old_write_mark() {
        let dir = TempDir::new().expect("temp dir");
        let coordinator = coordinator_in(&dir);
        let now = fixed_time("2026-02-16T09:00:00Z");

        let mut first = TimerState::new_session(Mode::Work, 1500, now);
        first.remaining_seconds = 100;
        assert!(coordinator.on_state_changed(&first, now).is_some());

        // A fresh session has a new id, so its full remaining time is not stale
        let second = TimerState::new_session(Mode::RestEyes, 300, now);
        assert!(coordinator.on_state_changed(&second, now).is_some());
    }
}
