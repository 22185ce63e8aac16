//! Target status block
//!
//! The target answers a plain read with a fixed 12-byte status block.
//! It is diagnostic only: while the target executes from RAM or commits
//! flash the block reads as garbage, so a heuristic separates
//! meaningful reads from noise instead of treating noise as an error.

use core::fmt;

use bitflags::bitflags;

/// Size of the status block
pub const STATUS_LEN: usize = 12;

bitflags! {
    /// Which transfers the target has acknowledged since entering
    /// programming mode.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TransferState: u8 {
        /// CREG block received
        const CREGS_RECEIVED = 0x01;
        /// SFR block received
        const SFRS_RECEIVED = 0x02;
        /// MREG block received
        const MREGS_RECEIVED = 0x04;
        /// All register blocks received
        const REGISTERS_RECEIVED = 0x08;
        /// Program received
        const PROGRAM_RECEIVED = 0x10;
    }
}

/// Parsed status block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceStatus {
    /// Transfer-state flags
    pub transfer_state: TransferState,
    /// Result of the last command
    pub command_status: u8,
    /// Last command the target saw (big-endian on the wire)
    pub last_command: u16,
    /// Bitmap of occupied program slots
    pub program_slots: u16,
    /// Device id
    pub device_id: u16,
    /// Device serial number
    pub serial_number: u32,
}

impl DeviceStatus {
    /// Parse a raw status block. Call [`is_meaningful`] first; this
    /// does no validation of its own.
    pub fn parse(raw: &[u8; STATUS_LEN]) -> DeviceStatus {
        DeviceStatus {
            transfer_state: TransferState::from_bits_retain(raw[0]),
            command_status: raw[1],
            last_command: u16::from_be_bytes([raw[2], raw[3]]),
            program_slots: u16::from_le_bytes([raw[4], raw[5]]),
            device_id: u16::from_le_bytes([raw[6], raw[7]]),
            serial_number: u32::from_le_bytes([raw[8], raw[9], raw[10], raw[11]]),
        }
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "state=0x{:02X} cmd_status=0x{:02X} last=0x{:04X} slots=0x{:04X} id=0x{:04X} serial=0x{:08X}",
            self.transfer_state.bits(),
            self.command_status,
            self.last_command,
            self.program_slots,
            self.device_id,
            self.serial_number
        )
    }
}

/// Whether a raw status read carries information at all.
///
/// All-0xFF, all-0x00 and other repeated-byte reads are what the bus
/// returns while the target is executing from RAM or committing flash;
/// they are "target busy", not an error.
pub fn is_meaningful(raw: &[u8; STATUS_LEN]) -> bool {
    let first = raw[0];
    !raw.iter().all(|&b| b == first)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_endianness() {
        let raw = [
            0x1F, 0x00, // state: everything received, command ok
            0x08, 0x01, // last command 0x0801, big-endian
            0x03, 0x80, // slots 0x8003, little-endian
            0x10, 0x0A, // device id 0x0A10
            0x78, 0x56, 0x34, 0x12, // serial 0x12345678
        ];
        let status = DeviceStatus::parse(&raw);
        assert!(status.transfer_state.contains(TransferState::PROGRAM_RECEIVED));
        assert!(status.transfer_state.contains(TransferState::CREGS_RECEIVED));
        assert_eq!(status.last_command, 0x0801);
        assert_eq!(status.program_slots, 0x8003);
        assert_eq!(status.device_id, 0x0A10);
        assert_eq!(status.serial_number, 0x1234_5678);
    }

    #[test]
    fn test_meaningful_heuristic() {
        assert!(!is_meaningful(&[0xFF; STATUS_LEN]));
        assert!(!is_meaningful(&[0x00; STATUS_LEN]));
        assert!(!is_meaningful(&[0xA5; STATUS_LEN]));
        let mut raw = [0u8; STATUS_LEN];
        raw[6] = 0x10; // a device id makes it a real block
        assert!(is_meaningful(&raw));
    }
}
