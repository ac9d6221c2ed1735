//! Persistence module
//!
//! This module contains the on-disk document shape, the atomic document
//! store with rotating backups, and the coordinator that keeps disk
//! eventually consistent with the in-memory timer.

pub mod coordinator;
pub mod document;
pub mod store;

// Re-export main types
pub use coordinator::{PersistenceCoordinator, BACKUP_LIMIT};
pub use document::{DocumentMetadata, StoredDocument, SCHEMA_VERSION};
pub use store::StateStore;
