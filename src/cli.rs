//! CLI argument parsing

use crate::programmers;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Parse a flash location given as a single hex digit (0-F) or decimal
fn parse_location(s: &str) -> Result<u8, String> {
    u8::from_str_radix(s, 16)
        .map_err(|e| format!("invalid flash location: {}", e))
        .and_then(|loc| {
            if loc <= 15 {
                Ok(loc)
            } else {
                Err(format!("flash location must be 0-F, got {}", s))
            }
        })
}

/// Generate dynamic help text for the programmer argument
fn programmer_help() -> String {
    format!(
        "Programmer to use [available: {}]",
        programmers::programmer_names_short()
    )
}

#[derive(Parser)]
#[command(name = "fxbridge")]
#[command(author, version, about = "FXCore DSP programmer", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Inspect a hex file: region sizes, instruction count, checksums
    Parse {
        /// Hex file to inspect
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Upload a hex file to the target and run or store it
    Program {
        /// Programmer to use
        #[arg(short, long, help = programmer_help())]
        programmer: String,

        /// Hex file to upload
        #[arg(short, long)]
        input: PathBuf,

        /// Write to this flash location (hex digit 0-F) instead of
        /// executing from RAM
        #[arg(long, value_parser = parse_location)]
        flash: Option<u8>,
    },

    /// Watch a directory for trigger files (output.hex for RAM
    /// execution, 0.hex-F.hex for flash programming)
    Watch {
        /// Programmer to use
        #[arg(short, long, help = programmer_help())]
        programmer: String,

        /// Directory to poll
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,

        /// Poll interval in milliseconds
        #[arg(long, default_value_t = 250)]
        interval_ms: u64,
    },

    /// List supported programmers
    ListProgrammers,
}
