//! Configuration and CLI argument handling

use std::path::PathBuf;

use clap::Parser;

use crate::policy::QuitAction;
use crate::state::Mode;

/// CLI argument parsing structure
#[derive(Parser)]
#[command(name = "sharp-timer")]
#[command(about = "A persistent countdown timer with crash-safe state recovery")]
#[command(version = "1.1.0")]
pub struct Config {
    /// Directory holding the state document and backups
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Mode to start when no previous session is restored
    #[arg(short, long)]
    pub start: Option<Mode>,

    /// How to handle an active timer when a quit signal arrives
    #[arg(long, default_value = "preserve-and-quit")]
    pub on_quit: QuitAction,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Config {
    /// Parse configuration from command line arguments
    pub fn parse() -> Self {
        Parser::parse()
    }

    /// Resolve the data directory, defaulting to the platform data dir
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("sharp-timer")
        })
    }

    /// Get the appropriate log level based on verbose flag
    pub fn log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else {
            "info"
        }
    }
}
