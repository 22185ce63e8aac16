//! One-shot programming from a hex file

use std::fs;
use std::path::Path;

use fxbridge_core::hex;
use fxbridge_core::protocol::Target;
use fxbridge_core::sequence::{run_programming, ProgramAction};

use super::{CommandError, LogSink};
use crate::programmers;

/// Parse `input` and push it into the target through the named backend.
pub fn run(programmer: &str, input: &Path, flash: Option<u8>) -> Result<(), CommandError> {
    let content = fs::read_to_string(input).map_err(|source| CommandError::ReadInput {
        path: input.to_path_buf(),
        source,
    })?;
    let payload = hex::parse_payload(&content)?;
    log::info!(
        "{}: {} instructions",
        input.display(),
        payload.instructions.len()
    );

    let bus = programmers::create(programmer).map_err(CommandError::Backend)?;
    let mut target = Target::new(bus, LogSink);

    let action = match flash {
        Some(location) => ProgramAction::WriteFlash(location),
        None => ProgramAction::ExecuteFromRam,
    };
    run_programming(&mut target, &payload, action)?;

    match action {
        ProgramAction::ExecuteFromRam => println!("program is running from RAM"),
        ProgramAction::WriteFlash(location) => {
            println!("program written to flash location {:X}", location)
        }
    }
    Ok(())
}
