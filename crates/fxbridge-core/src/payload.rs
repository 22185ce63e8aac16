//! Target memory model
//!
//! The FXCore exposes four fixed-purpose memory windows. A build product
//! (hex file or reassembled HID transfer) is reduced to one wire buffer
//! per region plus the decoded instruction list; that bundle is the only
//! currency passed between the parsers and the programming sequence.

use core::fmt;

use heapless::Vec;

use crate::error::{Error, Result};

/// CREG (core register) data bytes on the wire
pub const CREG_DATA_LEN: usize = 64;
/// MREG (memory register) data bytes on the wire
pub const MREG_DATA_LEN: usize = 512;
/// SFR (special function register) data bytes on the wire
pub const SFR_DATA_LEN: usize = 48;
/// Trailing 16-bit checksum appended to every region transfer
pub const CHECKSUM_LEN: usize = 2;

/// CREG transfer size including checksum
pub const CREG_WIRE_LEN: usize = CREG_DATA_LEN + CHECKSUM_LEN;
/// MREG transfer size including checksum
pub const MREG_WIRE_LEN: usize = MREG_DATA_LEN + CHECKSUM_LEN;
/// SFR transfer size including checksum
pub const SFR_WIRE_LEN: usize = SFR_DATA_LEN + CHECKSUM_LEN;

/// Bytes per program instruction word
pub const INSTRUCTION_LEN: usize = 4;
/// Largest program the target accepts
pub const MAX_INSTRUCTIONS: usize = 1024;
/// Largest PROGRAM transfer size including checksum
pub const PROGRAM_WIRE_MAX: usize = MAX_INSTRUCTIONS * INSTRUCTION_LEN + CHECKSUM_LEN;

/// One of the four fixed-purpose memory windows in the target's address
/// space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    /// Core registers, addresses 0x0800-0x0FFF
    Creg,
    /// Memory registers, addresses 0x0000-0x07FF
    Mreg,
    /// Special function registers, addresses 0x1000-0x17FF
    Sfr,
    /// Program instructions, addresses 0x1800 and above
    Program,
}

impl Region {
    /// Map an address from the hex file to its owning region.
    pub const fn classify(addr: u16) -> Region {
        match addr {
            0x0000..=0x07FF => Region::Mreg,
            0x0800..=0x0FFF => Region::Creg,
            0x1000..=0x17FF => Region::Sfr,
            _ => Region::Program,
        }
    }

    /// First address of the region's window.
    pub const fn window_base(self) -> u16 {
        match self {
            Region::Mreg => 0x0000,
            Region::Creg => 0x0800,
            Region::Sfr => 0x1000,
            Region::Program => 0x1800,
        }
    }

    /// Data bytes carried by a transfer of this region, excluding the
    /// checksum. `None` for PROGRAM, whose size depends on the
    /// instruction count.
    pub const fn data_len(self) -> Option<usize> {
        match self {
            Region::Creg => Some(CREG_DATA_LEN),
            Region::Mreg => Some(MREG_DATA_LEN),
            Region::Sfr => Some(SFR_DATA_LEN),
            Region::Program => None,
        }
    }

    /// Total transfer size including the checksum. `None` for PROGRAM.
    pub const fn wire_len(self) -> Option<usize> {
        match self {
            Region::Creg => Some(CREG_WIRE_LEN),
            Region::Mreg => Some(MREG_WIRE_LEN),
            Region::Sfr => Some(SFR_WIRE_LEN),
            Region::Program => None,
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Region::Creg => write!(f, "CREG"),
            Region::Mreg => write!(f, "MREG"),
            Region::Sfr => write!(f, "SFR"),
            Region::Program => write!(f, "PROGRAM"),
        }
    }
}

/// 16-bit additive checksum over region data bytes.
///
/// Sent little-endian after the data; the target recomputes and compares.
pub fn checksum16(data: &[u8]) -> u16 {
    data.iter().fold(0u16, |sum, &b| sum.wrapping_add(b as u16))
}

/// Decode the 32-bit little-endian instruction words from a PROGRAM wire
/// buffer or populated span. The trailing two bytes are the checksum and
/// never instruction data; only complete 4-byte groups are decoded.
pub fn decode_instructions(span: &[u8], out: &mut Vec<u32, MAX_INSTRUCTIONS>) {
    out.clear();
    let data_len = span.len().saturating_sub(CHECKSUM_LEN);
    for word in span[..data_len].chunks_exact(INSTRUCTION_LEN) {
        let instr = u32::from_le_bytes([word[0], word[1], word[2], word[3]]);
        if out.push(instr).is_err() {
            break;
        }
    }
}

/// The four region wire buffers plus the decoded instruction list.
///
/// Constructed fresh per programming attempt and discarded afterwards;
/// an empty region buffer means "nothing to transfer", a non-empty one
/// is always exactly the region's wire size.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ProgrammingPayload {
    /// CREG transfer bytes (64 data + 2 checksum), or empty
    pub creg: Vec<u8, CREG_WIRE_LEN>,
    /// MREG transfer bytes (512 data + 2 checksum), or empty
    pub mreg: Vec<u8, MREG_WIRE_LEN>,
    /// SFR transfer bytes (48 data + 2 checksum), or empty
    pub sfr: Vec<u8, SFR_WIRE_LEN>,
    /// PROGRAM transfer bytes (4 per instruction + 2 checksum), or empty
    pub program: Vec<u8, PROGRAM_WIRE_MAX>,
    /// Decoded 32-bit instruction words
    pub instructions: Vec<u32, MAX_INSTRUCTIONS>,
}

impl ProgrammingPayload {
    /// Create an empty payload.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all buffered data, keeping capacity.
    pub fn clear(&mut self) {
        self.creg.clear();
        self.mreg.clear();
        self.sfr.clear();
        self.program.clear();
        self.instructions.clear();
    }

    /// True when no region has any data to transfer.
    pub fn is_empty(&self) -> bool {
        self.creg.is_empty()
            && self.mreg.is_empty()
            && self.sfr.is_empty()
            && self.program.is_empty()
    }

    /// Wire bytes for one region (empty slice when the region is unused).
    pub fn region_wire(&self, region: Region) -> &[u8] {
        match region {
            Region::Creg => &self.creg,
            Region::Mreg => &self.mreg,
            Region::Sfr => &self.sfr,
            Region::Program => &self.program,
        }
    }

    /// Build a register region's wire buffer from its populated address
    /// span: pad or truncate to the fixed data size and append the
    /// checksum.
    ///
    /// When the span is exactly two bytes longer than the data size,
    /// those two bytes are a checksum the source already computed; a
    /// nonzero source checksum is carried to the wire verbatim instead
    /// of being recomputed.
    pub fn set_register_span(&mut self, region: Region, span: &[u8]) {
        match region {
            Region::Creg => fill_wire(&mut self.creg, span, CREG_DATA_LEN),
            Region::Mreg => fill_wire(&mut self.mreg, span, MREG_DATA_LEN),
            Region::Sfr => fill_wire(&mut self.sfr, span, SFR_DATA_LEN),
            Region::Program => debug_assert!(false, "use set_program_span for PROGRAM"),
        }
    }

    /// Build the PROGRAM wire buffer and instruction list from the
    /// populated program span.
    ///
    /// A span that is already a whole transfer (4 bytes per instruction
    /// plus the 2 checksum bytes) is used verbatim, preserving the
    /// source checksum; anything else is re-encoded from the decoded
    /// instructions with a computed checksum. An empty or sub-instruction
    /// span leaves the region empty.
    pub fn set_program_span(&mut self, span: &[u8]) -> Result<()> {
        if span.len() > PROGRAM_WIRE_MAX {
            return Err(Error::HexOverflow {
                region: Region::Program,
            });
        }
        decode_instructions(span, &mut self.instructions);
        self.program.clear();
        if self.instructions.is_empty() {
            return Ok(());
        }
        if span.len() == self.instructions.len() * INSTRUCTION_LEN + CHECKSUM_LEN {
            let _ = self.program.extend_from_slice(span);
        } else {
            encode_program(&self.instructions, &mut self.program);
        }
        Ok(())
    }

    /// Set the program directly from instruction words (computes the
    /// wire buffer and checksum).
    pub fn set_instructions(&mut self, instructions: &[u32]) -> Result<()> {
        if instructions.len() > MAX_INSTRUCTIONS {
            return Err(Error::TooManyInstructions);
        }
        self.instructions.clear();
        let _ = self.instructions.extend_from_slice(instructions);
        self.program.clear();
        if !instructions.is_empty() {
            encode_program(&self.instructions, &mut self.program);
        }
        Ok(())
    }

    /// Accept a complete wire buffer reassembled by the bridge.
    ///
    /// The buffer must be exactly the region's wire size (for PROGRAM,
    /// any whole number of instructions plus checksum); PROGRAM also
    /// refreshes the instruction list.
    pub fn set_region_wire(&mut self, region: Region, wire: &[u8]) -> Result<()> {
        if let Some(expected) = region.wire_len() {
            if wire.len() != expected {
                return Err(Error::PayloadSizeMismatch {
                    region,
                    len: wire.len(),
                });
            }
        } else {
            let data_len = wire.len().saturating_sub(CHECKSUM_LEN);
            let whole = data_len > 0 && data_len % INSTRUCTION_LEN == 0;
            if !whole || wire.len() > PROGRAM_WIRE_MAX {
                return Err(Error::PayloadSizeMismatch {
                    region,
                    len: wire.len(),
                });
            }
        }
        match region {
            Region::Creg => {
                self.creg.clear();
                let _ = self.creg.extend_from_slice(wire);
            }
            Region::Mreg => {
                self.mreg.clear();
                let _ = self.mreg.extend_from_slice(wire);
            }
            Region::Sfr => {
                self.sfr.clear();
                let _ = self.sfr.extend_from_slice(wire);
            }
            Region::Program => {
                self.program.clear();
                let _ = self.program.extend_from_slice(wire);
                decode_instructions(wire, &mut self.instructions);
            }
        }
        Ok(())
    }
}

/// Pad/truncate `span` to `data_len` bytes, then append the checksum
/// (carried over from the source when present and nonzero).
fn fill_wire<const CAP: usize>(out: &mut Vec<u8, CAP>, span: &[u8], data_len: usize) {
    out.clear();
    let take = span.len().min(data_len);
    // CAP is data_len + CHECKSUM_LEN for every caller, so these cannot fail
    let _ = out.extend_from_slice(&span[..take]);
    while out.len() < data_len {
        let _ = out.push(0);
    }
    let checksum = match span.get(data_len..) {
        Some(source) if source.len() == CHECKSUM_LEN && (source[0] != 0 || source[1] != 0) => {
            u16::from_le_bytes([source[0], source[1]])
        }
        _ => checksum16(&out[..data_len]),
    };
    let _ = out.extend_from_slice(&checksum.to_le_bytes());
}

fn encode_program(
    instructions: &Vec<u32, MAX_INSTRUCTIONS>,
    out: &mut Vec<u8, PROGRAM_WIRE_MAX>,
) {
    for instr in instructions {
        let _ = out.extend_from_slice(&instr.to_le_bytes());
    }
    let checksum = checksum16(out);
    let _ = out.extend_from_slice(&checksum.to_le_bytes());
}
