//! Signal handling for the quit workflow

use futures::stream::StreamExt;
use signal_hook_tokio::Signals;
use tracing::info;

/// Wait for a quit request (SIGTERM, SIGINT)
///
/// Returning does not end the process: the shell runs the quit policy
/// first, and a configured Cancel keeps everything running.
pub async fn quit_signal() {
    let mut signals = Signals::new([
        signal_hook::consts::SIGTERM,
        signal_hook::consts::SIGINT,
    ])
    .expect("Failed to create signal handler");

    if let Some(signal) = signals.next().await {
        info!("Received quit signal: {}", signal);
    }
}
