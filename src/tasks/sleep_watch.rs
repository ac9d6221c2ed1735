//! Sleep detection background task

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::core::TimerCore;

/// Polling cadence for the wall-clock gap check
const CHECK_INTERVAL_SECS: u64 = 30;

/// A gap beyond the check interval by this much means the host slept
const GAP_THRESHOLD_SECS: i64 = 60;

/// Background task detecting system sleep from wall-clock gaps
///
/// Without a native suspend notification, a large jump in wall-clock time
/// between iterations is the tell: the process was frozen. The snapshot is
/// flagged and force-saved; the next engine tick self-corrects the
/// countdown from absolute time.
pub async fn sleep_watch_task(core: Arc<TimerCore>) {
    info!("Starting sleep watch task");

    let mut ticker = interval(Duration::from_secs(CHECK_INTERVAL_SECS));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_seen = Utc::now();

    loop {
        ticker.tick().await;

        let now = Utc::now();
        let gap = (now - last_seen).num_seconds();
        last_seen = now;

        if gap > CHECK_INTERVAL_SECS as i64 + GAP_THRESHOLD_SECS {
            warn!("Detected wall-clock gap of {}s, assuming sleep/wake", gap);
            if let Err(e) = core.on_suspend_requested(now) {
                error!("Post-sleep snapshot failed: {}", e);
            }
        }
    }
}
