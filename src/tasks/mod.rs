//! Background tasks module
//!
//! This module contains the task loops that run alongside the UI shell:
//! the one-second tick stream, the periodic autosave, and sleep detection.

pub mod autosave;
pub mod sleep_watch;
pub mod tick;

// Re-export main functions
pub use autosave::autosave_task;
pub use sleep_watch::sleep_watch_task;
pub use tick::timer_tick_task;
