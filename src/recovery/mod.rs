//! Startup recovery module
//!
//! This module decides what timer state, if any, survives a process
//! restart, sleep/wake cycle, or crash.

pub mod reconciler;

// Re-export main types
pub use reconciler::{recover, RecoveryOutcome};
