//! Command implementations

pub mod parse;
pub mod program;
pub mod watch;

use std::path::PathBuf;

use fxbridge_core::status::{StatusEvent, StatusSink};

/// Errors surfaced by the CLI commands
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    /// Input file could not be read
    #[error("failed to read {path}: {source}")]
    ReadInput {
        /// File that failed
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },
    /// Trigger directory could not be scanned
    #[error("failed to scan {path}: {source}")]
    ScanDir {
        /// Directory that failed
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },
    /// Core library error
    #[error(transparent)]
    Core(#[from] fxbridge_core::Error),
    /// Backend selection failed
    #[error("{0}")]
    Backend(String),
}

/// Status sink for host use: renders indicator events into the log.
#[derive(Debug, Default)]
pub struct LogSink;

impl StatusSink for LogSink {
    fn event(&mut self, event: StatusEvent) {
        let pattern = event.pattern();
        log::debug!(
            "status: {:?} -> rgb({},{},{}) blinks={}",
            event,
            pattern.color.0,
            pattern.color.1,
            pattern.color.2,
            pattern.blinks
        );
    }
}

/// List supported programmers
pub fn list_programmers() {
    println!("Supported programmers:");
    for info in crate::programmers::PROGRAMMERS {
        println!("  {:<10} {}", info.name, info.description);
    }
}
