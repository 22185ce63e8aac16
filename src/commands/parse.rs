//! Offline hex file inspection

use std::fs;
use std::path::Path;

use fxbridge_core::hex;
use fxbridge_core::payload::Region;
use fxbridge_core::protocol::Command;

use super::CommandError;

/// Parse a hex file and print what a programming attempt would send.
pub fn run(input: &Path) -> Result<(), CommandError> {
    let content = fs::read_to_string(input).map_err(|source| CommandError::ReadInput {
        path: input.to_path_buf(),
        source,
    })?;
    let payload = hex::parse_payload(&content)?;

    println!("{}:", input.display());
    for region in [Region::Creg, Region::Mreg, Region::Sfr, Region::Program] {
        let wire = payload.region_wire(region);
        if wire.is_empty() {
            println!("  {:<8} -", region.to_string());
            continue;
        }
        let (data, checksum) = wire.split_at(wire.len() - 2);
        println!(
            "  {:<8} {} bytes + checksum {:02X} {:02X}",
            region.to_string(),
            data.len(),
            checksum[0],
            checksum[1]
        );
    }
    println!("  {} instructions", payload.instructions.len());
    if !payload.instructions.is_empty() {
        let op = Command::TransferProgram {
            count: payload.instructions.len() as u16,
        }
        .encode();
        println!("  transfer opcode 0x{:02X}{:02X}", op[0], op[1]);
    }
    Ok(())
}
