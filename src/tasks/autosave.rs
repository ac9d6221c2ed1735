//! Periodic autosave background task

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::interval;
use tracing::{error, info};

use crate::core::TimerCore;

/// Autosave cadence while a session is active
pub const AUTOSAVE_INTERVAL_SECS: u64 = 30;

/// Background task persisting the active session every 30 seconds
///
/// Each autosave also writes a rotating backup, so disk never lags the
/// countdown by more than one interval and a corrupt canonical document
/// has recent fallbacks.
pub async fn autosave_task(core: Arc<TimerCore>) {
    info!(
        "Starting autosave task ({}s cadence)",
        AUTOSAVE_INTERVAL_SECS
    );

    let mut ticker = interval(Duration::from_secs(AUTOSAVE_INTERVAL_SECS));

    loop {
        ticker.tick().await;

        if let Err(e) = core.autosave(Utc::now()) {
            error!("Autosave failed: {}", e);
        }
    }
}
