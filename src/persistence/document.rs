//! On-disk document shape

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::state::{Settings, TimerState};

/// Current document schema version
pub const SCHEMA_VERSION: u32 = 1;

/// Bookkeeping block written on every save
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DocumentMetadata {
    pub schema_version: u32,
    pub last_saved: Option<DateTime<Utc>>,
    pub backup_count: usize,
}

impl Default for DocumentMetadata {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            last_saved: None,
            backup_count: 0,
        }
    }
}

/// The single canonical document: optional timer snapshot, metadata, settings
///
/// Every block defaults independently, so a document holding only settings
/// (no active session) or only a timer snapshot still deserializes. A bad
/// value inside one block fails that load as a whole rather than silently
/// dropping fields; callers fall back through backups.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoredDocument {
    pub timer_state: Option<TimerState>,
    pub metadata: DocumentMetadata,
    pub settings: Settings,
}

impl StoredDocument {
    /// Stamp the metadata block for a save happening now
    pub fn touch(&mut self, now: DateTime<Utc>, backup_count: usize) {
        self.metadata.schema_version = SCHEMA_VERSION;
        self.metadata.last_saved = Some(now);
        self.metadata.backup_count = backup_count;
    }
}
