//! FXCore programming command opcodes
//!
//! Every programming-mode command is a 2-byte opcode sent as the first
//! bytes of a bus write (mode entry carries the bus address as a third
//! byte). The same table drives both directions: the protocol layer
//! encodes commands it issues, the bridge decodes commands it observes.

use crate::payload::{Region, CHECKSUM_LEN, INSTRUCTION_LEN, MAX_INSTRUCTIONS};

/// Enter programming mode (followed by the target's bus address byte)
pub const ENTER_PRG: u16 = 0xA55A;
/// Leave programming mode, back to RUN
pub const EXIT_PRG: u16 = 0x5AA5;
/// CREG transfer (low byte: 16 words minus one)
pub const XFER_CREG: u16 = 0x010F;
/// MREG transfer (low byte: 128 words minus one)
pub const XFER_MREG: u16 = 0x047F;
/// SFR transfer (low byte: 12 words minus one)
pub const XFER_SFR: u16 = 0x020B;
/// First PROGRAM transfer opcode; the instruction count minus one is
/// added to it
pub const XFER_PRG_BASE: u16 = 0x0800;
/// Last PROGRAM transfer opcode (1024 instructions)
pub const XFER_PRG_MAX: u16 = XFER_PRG_BASE + MAX_INSTRUCTIONS as u16 - 1;
/// Execute the uploaded program from RAM
pub const EXEC_FROM_RAM: u16 = 0x0D00;
/// Commit the uploaded program to a flash slot (low byte: location)
pub const WRITE_PRG: u16 = 0x0C00;
/// Stop execution and return to STATE0
pub const RETURN_0: u16 = 0x0E00;

/// Highest valid flash slot
pub const MAX_FLASH_LOCATION: u8 = 15;

/// A decoded programming command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Enter programming mode
    EnterProgramming,
    /// Leave programming mode
    ExitProgramming,
    /// Transfer a fixed-size register region (CREG, MREG or SFR)
    TransferRegister(Region),
    /// Transfer the program, `count` instructions
    TransferProgram {
        /// Number of 32-bit instructions that follow
        count: u16,
    },
    /// Execute from RAM
    ExecuteFromRam,
    /// Write the program to a flash slot
    WriteFlash {
        /// Slot 0-15
        location: u8,
    },
    /// Return to STATE0
    ReturnToIdle,
}

impl Command {
    /// Decode the leading two bytes of a bus write. Returns `None` for
    /// anything that is not a programming command.
    pub fn decode(hi: u8, lo: u8) -> Option<Command> {
        let cmd = u16::from_be_bytes([hi, lo]);
        match cmd {
            ENTER_PRG => Some(Command::EnterProgramming),
            EXIT_PRG => Some(Command::ExitProgramming),
            XFER_CREG => Some(Command::TransferRegister(Region::Creg)),
            XFER_MREG => Some(Command::TransferRegister(Region::Mreg)),
            XFER_SFR => Some(Command::TransferRegister(Region::Sfr)),
            XFER_PRG_BASE..=XFER_PRG_MAX => Some(Command::TransferProgram {
                count: cmd - XFER_PRG_BASE + 1,
            }),
            EXEC_FROM_RAM => Some(Command::ExecuteFromRam),
            RETURN_0 => Some(Command::ReturnToIdle),
            _ if hi == (WRITE_PRG >> 8) as u8 => Some(Command::WriteFlash { location: lo }),
            _ => None,
        }
    }

    /// The 2-byte wire form of this command.
    pub fn encode(&self) -> [u8; 2] {
        let cmd = match *self {
            Command::EnterProgramming => ENTER_PRG,
            Command::ExitProgramming => EXIT_PRG,
            Command::TransferRegister(region) => match region {
                Region::Creg => XFER_CREG,
                Region::Mreg => XFER_MREG,
                Region::Sfr => XFER_SFR,
                // PROGRAM always goes through TransferProgram
                Region::Program => XFER_PRG_BASE,
            },
            Command::TransferProgram { count } => XFER_PRG_BASE + count - 1,
            Command::ExecuteFromRam => EXEC_FROM_RAM,
            Command::WriteFlash { location } => WRITE_PRG | location as u16,
            Command::ReturnToIdle => RETURN_0,
        };
        cmd.to_be_bytes()
    }

    /// Wire bytes (data + checksum) this command announces, for the
    /// transfer commands; `None` for everything immediate.
    pub fn expected_data_len(&self) -> Option<usize> {
        match *self {
            Command::TransferRegister(region) => region.wire_len(),
            Command::TransferProgram { count } => {
                Some(count as usize * INSTRUCTION_LEN + CHECKSUM_LEN)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_fixed_commands() {
        assert_eq!(Command::decode(0xA5, 0x5A), Some(Command::EnterProgramming));
        assert_eq!(Command::decode(0x5A, 0xA5), Some(Command::ExitProgramming));
        assert_eq!(
            Command::decode(0x01, 0x0F),
            Some(Command::TransferRegister(Region::Creg))
        );
        assert_eq!(
            Command::decode(0x04, 0x7F),
            Some(Command::TransferRegister(Region::Mreg))
        );
        assert_eq!(
            Command::decode(0x02, 0x0B),
            Some(Command::TransferRegister(Region::Sfr))
        );
        assert_eq!(Command::decode(0x0D, 0x00), Some(Command::ExecuteFromRam));
        assert_eq!(
            Command::decode(0x0C, 0x07),
            Some(Command::WriteFlash { location: 0x07 })
        );
        assert_eq!(Command::decode(0x0E, 0x00), Some(Command::ReturnToIdle));
        assert_eq!(Command::decode(0x00, 0x00), None);
        assert_eq!(Command::decode(0xFF, 0xFF), None);
    }

    #[test]
    fn test_program_opcode_encodes_count() {
        // 2 instructions: 0x0800 + 2 - 1 = 0x0801
        let cmd = Command::TransferProgram { count: 2 };
        assert_eq!(cmd.encode(), [0x08, 0x01]);
        assert_eq!(Command::decode(0x08, 0x01), Some(cmd));

        // full range
        assert_eq!(
            Command::decode(0x0B, 0xFF),
            Some(Command::TransferProgram { count: 1024 })
        );
        // one past the range is no command at all
        assert_eq!(Command::decode(0x0C, 0x00).unwrap(), Command::WriteFlash { location: 0 });
    }

    #[test]
    fn test_expected_data_len() {
        assert_eq!(
            Command::TransferRegister(Region::Mreg).expected_data_len(),
            Some(514)
        );
        assert_eq!(
            Command::TransferProgram { count: 2 }.expected_data_len(),
            Some(10)
        );
        assert_eq!(Command::ExecuteFromRam.expected_data_len(), None);
    }
}
