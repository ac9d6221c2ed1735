//! Timer engine module
//!
//! This module contains the authoritative countdown state machine and the
//! event types it publishes to the UI shell.

pub mod events;
pub mod timer_engine;

// Re-export main types
pub use events::TimerEvent;
pub use timer_engine::{TickOutcome, TimerEngine};
