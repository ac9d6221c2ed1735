//! Error types shared across the timer core

use thiserror::Error;

/// Errors from timer state-machine operations
#[derive(Debug, Error)]
pub enum TimerError {
    #[error("timer duration must be positive, got {0}s")]
    InvalidDuration(i64),
    #[error("cannot start a new session while the current one is {0}")]
    SessionActive(&'static str),
    #[error("timer state lock poisoned: {0}")]
    LockPoisoned(String),
}

/// Reasons a timer snapshot fails validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("total duration must be positive, got {0}s")]
    NonPositiveDuration(i64),
    #[error("remaining time {remaining}s outside [0, {total}]")]
    RemainingOutOfRange { remaining: i64, total: i64 },
    #[error("snapshot is both running and paused")]
    RunningAndPaused,
    #[error("snapshot has an empty session id")]
    EmptySessionId,
    #[error("snapshot persisted {0}s in the future")]
    PersistedInFuture(i64),
}

/// Errors from the durable store
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("saved document failed read-back verification: {0}")]
    Verification(String),
}
