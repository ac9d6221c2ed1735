//! Durable document store: atomic writes, rotating backups
//!
//! The canonical document lives at `<data_dir>/settings.json`; point-in-time
//! backups live under `<data_dir>/backups/` named by millisecond timestamp so
//! lexical order is chronological order.

use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::error::PersistenceError;
use crate::persistence::document::StoredDocument;

const DOCUMENT_FILENAME: &str = "settings.json";
const BACKUP_DIR: &str = "backups";
const BACKUP_PREFIX: &str = "backup_";

/// Atomic load/save of the canonical document plus backup rotation
#[derive(Debug)]
pub struct StateStore {
    document_path: PathBuf,
    backup_dir: PathBuf,
}

impl StateStore {
    /// Open (creating directories as needed) a store rooted at `data_dir`
    pub fn open(data_dir: &Path) -> Result<Self, PersistenceError> {
        let backup_dir = data_dir.join(BACKUP_DIR);
        fs::create_dir_all(&backup_dir)?;
        restrict_dir_permissions(data_dir)?;
        restrict_dir_permissions(&backup_dir)?;

        Ok(Self {
            document_path: data_dir.join(DOCUMENT_FILENAME),
            backup_dir,
        })
    }

    pub fn document_path(&self) -> &Path {
        &self.document_path
    }

    /// Load the canonical document
    ///
    /// `Ok(None)` means no document exists yet; `Err` means the file exists
    /// but could not be read or parsed (corrupt).
    pub fn load(&self) -> Result<Option<StoredDocument>, PersistenceError> {
        if !self.document_path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.document_path)?;
        let doc = serde_json::from_str(&raw)?;
        Ok(Some(doc))
    }

    /// Atomically replace the canonical document
    ///
    /// Writes to a temp sibling, fsyncs, re-reads it to verify it parses,
    /// then renames over the canonical path. On any failure the canonical
    /// file on disk is untouched.
    pub fn save(&self, doc: &StoredDocument) -> Result<(), PersistenceError> {
        let temp_path = self
            .document_path
            .with_file_name(format!("{DOCUMENT_FILENAME}.tmp.{}", std::process::id()));

        let result = self.write_and_swap(doc, &temp_path);
        if result.is_err() {
            // Leave the canonical file alone, just clean up the temp
            if temp_path.exists() {
                if let Err(e) = fs::remove_file(&temp_path) {
                    warn!("Failed to remove temp document {}: {}", temp_path.display(), e);
                }
            }
        }
        result
    }

    fn write_and_swap(
        &self,
        doc: &StoredDocument,
        temp_path: &Path,
    ) -> Result<(), PersistenceError> {
        let json = serde_json::to_string_pretty(doc)?;

        let mut file = fs::File::create(temp_path)?;
        restrict_file_permissions(&file)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
        drop(file);

        // Verify the bytes on disk round-trip before replacing anything
        let written = fs::read_to_string(temp_path)?;
        serde_json::from_str::<StoredDocument>(&written)
            .map_err(|e| PersistenceError::Verification(e.to_string()))?;

        fs::rename(temp_path, &self.document_path)?;
        debug!("Document saved to {}", self.document_path.display());
        Ok(())
    }

    /// Write a point-in-time backup copy of the document
    pub fn write_backup(
        &self,
        doc: &StoredDocument,
        now: DateTime<Utc>,
    ) -> Result<PathBuf, PersistenceError> {
        let name = format!("{BACKUP_PREFIX}{:013}.json", now.timestamp_millis());
        let path = self.backup_dir.join(name);
        let json = serde_json::to_string_pretty(doc)?;

        let mut file = fs::File::create(&path)?;
        restrict_file_permissions(&file)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;

        debug!("Backup written to {}", path.display());
        Ok(path)
    }

    /// All backup files, oldest first
    pub fn list_backups(&self) -> Result<Vec<PathBuf>, PersistenceError> {
        let mut backups: Vec<PathBuf> = fs::read_dir(&self.backup_dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| n.starts_with(BACKUP_PREFIX) && n.ends_with(".json"))
                    .unwrap_or(false)
            })
            .collect();
        backups.sort();
        Ok(backups)
    }

    /// Load one backup file as a document
    pub fn load_backup(&self, path: &Path) -> Result<StoredDocument, PersistenceError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Delete the oldest backups until at most `keep` remain
    ///
    /// Returns how many were deleted.
    pub fn prune_backups(&self, keep: usize) -> Result<usize, PersistenceError> {
        let backups = self.list_backups()?;
        if backups.len() <= keep {
            return Ok(0);
        }

        let mut deleted = 0;
        for old in &backups[..backups.len() - keep] {
            match fs::remove_file(old) {
                Ok(()) => deleted += 1,
                Err(e) => warn!("Failed to delete old backup {}: {}", old.display(), e),
            }
        }
        Ok(deleted)
    }
}

fn restrict_file_permissions(file: &fs::File) -> Result<(), PersistenceError> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(0o600))?;
    }
    #[cfg(not(unix))]
    let _ = file;
    Ok(())
}

fn restrict_dir_permissions(dir: &Path) -> Result<(), PersistenceError> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(dir, fs::Permissions::from_mode(0o700))?;
    }
    #[cfg(not(unix))]
    let _ = dir;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{Mode, TimerState};
    use tempfile::TempDir;

    fn fixed_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    fn sample_document(now: DateTime<Utc>) -> StoredDocument {
        let mut doc = StoredDocument::default();
        doc.timer_state = Some(TimerState::new_session(Mode::Work, 1500, now));
        doc.touch(now, 0);
        doc
    }

    #[test]
    fn load_on_empty_dir_returns_none() {
        let dir = TempDir::new().expect("temp dir");
        let store = StateStore::open(dir.path()).expect("open store");
        assert!(store.load().expect("load").is_none());
    }

    #[test]
    fn save_then_load_roundtrips() {
        let dir = TempDir::new().expect("temp dir");
        let store = StateStore::open(dir.path()).expect("open store");
        let now = fixed_time("2026-02-16T09:00:00Z");
        let doc = sample_document(now);

        store.save(&doc).expect("save");
        let loaded = store.load().expect("load").expect("document present");
        assert_eq!(loaded, doc);

        // No temp litter left behind
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .expect("read dir")
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.file_name()
                    .to_str()
                    .map(|n| n.contains(".tmp."))
                    .unwrap_or(false)
            })
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn corrupt_document_reports_error_not_panic() {
        let dir = TempDir::new().expect("temp dir");
        let store = StateStore::open(dir.path()).expect("open store");
        std::fs::write(store.document_path(), "{ not json").expect("write garbage");
        assert!(store.load().is_err());
    }

    #[test]
    fn interrupted_write_leaves_canonical_intact() {
        let dir = TempDir::new().expect("temp dir");
        let store = StateStore::open(dir.path()).expect("open store");
        let now = fixed_time("2026-02-16T09:00:00Z");
        let doc = sample_document(now);
        store.save(&doc).expect("save");

        // Simulate a crash after the temp write but before the rename: a
        // stray temp file exists, the canonical document must still load.
        let stray = dir.path().join(format!("{DOCUMENT_FILENAME}.tmp.99999"));
        std::fs::write(&stray, "{ partial garbage").expect("write stray temp");

        let loaded = store.load().expect("load").expect("document present");
        assert_eq!(loaded, doc);
    }

    #[test]
    fn backups_are_ordered_and_pruned_to_bound() {
        let dir = TempDir::new().expect("temp dir");
        let store = StateStore::open(dir.path()).expect("open store");
        let base = fixed_time("2026-02-16T09:00:00Z");
        let doc = sample_document(base);

        for i in 0..10 {
            store
                .write_backup(&doc, base + chrono::Duration::seconds(30 * i))
                .expect("write backup");
            store.prune_backups(5).expect("prune");
        }

        let backups = store.list_backups().expect("list backups");
        assert_eq!(backups.len(), 5);

        // The five survivors are the five most recent writes
        let names: Vec<String> = backups
            .iter()
            .filter_map(|p| p.file_name().and_then(|n| n.to_str()).map(String::from))
            .collect();
        for i in 5..10 {
            let stamp = (base + chrono::Duration::seconds(30 * i)).timestamp_millis();
            assert!(names.iter().any(|n| n.contains(&format!("{stamp:013}"))));
        }
    }

    #[test]
    fn load_backup_roundtrips() {
        let dir = TempDir::new().expect("temp dir");
        let store = StateStore::open(dir.path()).expect("open store");
        let now = fixed_time("2026-02-16T09:00:00Z");
        let doc = sample_document(now);

        let path = store.write_backup(&doc, now).expect("write backup");
        let loaded = store.load_backup(&path).expect("load backup");
        assert_eq!(loaded, doc);
    }
}
