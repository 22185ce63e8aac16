//! fxbridge - FXCore DSP programmer
//!
//! Host-side front end for the fxbridge-core library: inspect hex build
//! products, push them into a target through a selected programmer
//! backend, or run the trigger-file watch loop that the deployed bridge
//! firmware uses.

mod cli;
mod commands;
mod programmers;

use clap::Parser;
use cli::{Cli, Commands};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    let result = match cli.command {
        Commands::Parse { input } => commands::parse::run(&input),
        Commands::Program {
            programmer,
            input,
            flash,
        } => commands::program::run(&programmer, &input, flash),
        Commands::Watch {
            programmer,
            dir,
            interval_ms,
        } => commands::watch::run(&programmer, &dir, interval_ms),
        Commands::ListProgrammers => {
            commands::list_programmers();
            Ok(())
        }
    };

    Ok(result?)
}
