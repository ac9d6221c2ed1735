//! Sharp Timer - a persistent countdown timer core
//!
//! This library provides a three-mode countdown timer whose state survives
//! process restarts, system sleep, and crashes: an authoritative engine,
//! an atomic document store with rotating backups, and a startup
//! reconciler that restores or completes whatever a previous run left
//! behind.

pub mod config;
pub mod core;
pub mod engine;
pub mod error;
pub mod persistence;
pub mod policy;
pub mod recovery;
pub mod state;
pub mod tasks;
pub mod utils;

// Re-export commonly used types
pub use crate::core::TimerCore;
pub use config::Config;
pub use engine::{TickOutcome, TimerEngine, TimerEvent};
pub use error::{PersistenceError, TimerError, ValidationError};
pub use persistence::{PersistenceCoordinator, StateStore, StoredDocument};
pub use policy::{QuitAction, QuitOutcome};
pub use recovery::RecoveryOutcome;
pub use state::{DisplayState, Mode, Settings, TimerState};
pub use utils::quit_signal;
