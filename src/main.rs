//! Sharp Timer - a persistent countdown timer
//!
//! This is the console shell entry point: it wires the core together,
//! restores any previous session, spawns the background tasks, and turns
//! quit signals into the quit-confirmation workflow.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use sharp_timer::{
    config::Config,
    core::TimerCore,
    engine::TimerEvent,
    persistence::StateStore,
    policy::QuitOutcome,
    state::DisplayState,
    tasks::{autosave_task, sleep_watch_task, timer_tick_task},
    utils::quit_signal,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing with appropriate log level
    tracing_subscriber::fmt()
        .with_env_filter(format!("sharp_timer={}", config.log_level()))
        .init();

    info!("Starting sharp-timer v1.1.0");

    let data_dir = config.data_dir();
    info!("Data directory: {}", data_dir.display());
    let store = StateStore::open(&data_dir)?;
    let core = Arc::new(TimerCore::new(store));

    // Subscribe before recovery so startup events are not missed
    let events = core.subscribe_events();
    let display = core.subscribe_display();
    tokio::spawn(async move {
        shell_event_loop(events, display).await;
    });

    let restored = core.recover_on_startup(Utc::now())?;
    match restored.mode {
        Some(mode) => info!(
            "Restored {} session, {} remaining",
            mode.display_name(),
            restored.clock_text()
        ),
        None => {
            if let Some(mode) = config.start {
                let disp = core.start_timer(mode, Utc::now())?;
                info!(
                    "Started {} session ({})",
                    mode.display_name(),
                    disp.clock_text()
                );
            } else {
                info!("No session to restore; timer is idle");
            }
        }
    }

    // Start the background tasks
    tokio::spawn(timer_tick_task(Arc::clone(&core)));
    tokio::spawn(autosave_task(Arc::clone(&core)));
    tokio::spawn(sleep_watch_task(Arc::clone(&core)));

    // Quit workflow: a signal only ends the process once the quit policy
    // says so; a configured Cancel keeps the timer running.
    loop {
        quit_signal().await;

        match core.quit_prompt_needed()? {
            None => {
                info!("Timer is stopped, quitting");
                break;
            }
            Some(disp) => {
                info!(
                    "Timer is active ({} remaining), applying quit action {:?}",
                    disp.clock_text(),
                    config.on_quit
                );
                match core.apply_quit(config.on_quit, Utc::now())? {
                    QuitOutcome::Exit => break,
                    QuitOutcome::Continue => {
                        info!("Quit cancelled, timer continues");
                    }
                }
            }
        }
    }

    info!("Shutdown complete");
    Ok(())
}

/// Console rendition of the UI shell: consumes display updates and events
async fn shell_event_loop(
    mut events: broadcast::Receiver<TimerEvent>,
    mut display: watch::Receiver<DisplayState>,
) {
    loop {
        tokio::select! {
            changed = display.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = display.borrow_and_update().clone();
                if state.is_running {
                    debug!("{}", state.clock_text());
                }
            }
            event = events.recv() => match event {
                Ok(TimerEvent::Completed { mode, total_minutes }) => {
                    info!(
                        "{} session complete ({} minutes)",
                        mode.display_name(),
                        total_minutes
                    );
                }
                Ok(TimerEvent::AutoTransition { mode, display: disp }) => {
                    info!(
                        "Switched to {} ({}), paused and ready to resume",
                        mode.display_name(),
                        disp.clock_text()
                    );
                }
                Ok(TimerEvent::SessionRecovered { display: disp }) => {
                    info!(
                        "Recovered previous session with {} remaining",
                        disp.clock_text()
                    );
                }
                Ok(TimerEvent::PersistenceWarning { message }) => {
                    warn!("Timer state is not being saved: {}", message);
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Shell fell behind, skipped {} events", skipped);
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    }
}
