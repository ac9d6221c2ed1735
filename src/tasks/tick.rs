//! Timer tick background task

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

use crate::core::TimerCore;

/// Background task driving the countdown once per second
///
/// The engine recomputes remaining time from absolute wall-clock elapsed,
/// so delayed or skipped intervals only defer the update, they never lose
/// time.
pub async fn timer_tick_task(core: Arc<TimerCore>) {
    info!("Starting timer tick task");

    let mut ticker = interval(Duration::from_secs(1));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;

        if let Err(e) = core.tick(Utc::now()) {
            error!("Tick failed: {}", e);
        }
    }
}
