//! Hex build-product parsing
//!
//! Reduces the text content of one hex file to a [`ProgrammingPayload`]:
//! data records are merged by address into the owning region, gaps
//! inside a region's populated span are zero-filled, and the PROGRAM
//! span is decoded into 32-bit instruction words.
//!
//! Per-line policy: lines that don't start with `:` are ignored, records
//! failing length or checksum validation are skipped with a diagnostic,
//! a type-1 record ends parsing early, and unknown record types are
//! ignored. Only an empty file, a file not starting with the record
//! marker, or a region capacity overflow are fatal.

pub mod record;

use crate::error::{Error, Result};
use crate::payload::{ProgrammingPayload, Region, PROGRAM_WIRE_MAX};

use record::{Record, MIN_RECORD_CHARS, TYPE_DATA, TYPE_EOF};

/// Address span of each register window
const REGISTER_WINDOW_LEN: usize = 0x0800;

/// Accumulates the populated span of one region: a fixed backing array
/// indexed from the window base plus low/high watermarks. Bytes are
/// stored directly, so overwriting an address and zero-filling gaps
/// both fall out of the representation.
struct RegionAccumulator<const CAP: usize> {
    buf: [u8; CAP],
    lo: usize,
    hi: usize,
}

impl<const CAP: usize> RegionAccumulator<CAP> {
    fn new() -> Self {
        Self {
            buf: [0; CAP],
            lo: CAP,
            hi: 0,
        }
    }

    /// Store one byte at the given window offset. Returns false when
    /// the offset is beyond the backing capacity.
    fn store(&mut self, offset: usize, byte: u8) -> bool {
        if offset >= CAP {
            return false;
        }
        self.buf[offset] = byte;
        self.lo = self.lo.min(offset);
        self.hi = self.hi.max(offset);
        true
    }

    fn is_populated(&self) -> bool {
        self.lo <= self.hi
    }

    /// The populated span, lowest to highest written address, gaps
    /// zero-filled.
    fn span(&self) -> &[u8] {
        if self.is_populated() {
            &self.buf[self.lo..=self.hi]
        } else {
            &[]
        }
    }
}

/// Parse the full text content of one hex file into a payload.
pub fn parse_payload(content: &str) -> Result<ProgrammingPayload> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(Error::EmptyHexFile);
    }
    if !trimmed.starts_with(':') {
        return Err(Error::MissingStartMarker);
    }

    let mut mreg = RegionAccumulator::<REGISTER_WINDOW_LEN>::new();
    let mut creg = RegionAccumulator::<REGISTER_WINDOW_LEN>::new();
    let mut sfr = RegionAccumulator::<REGISTER_WINDOW_LEN>::new();
    let mut program = RegionAccumulator::<PROGRAM_WIRE_MAX>::new();

    for (idx, raw) in trimmed.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();
        if !line.starts_with(':') {
            // comment or stray text between records
            continue;
        }
        if line.len() < MIN_RECORD_CHARS {
            log::warn!("line {}: record too short, skipping", line_no);
            continue;
        }

        let rec = match Record::parse(line) {
            Ok(rec) => rec,
            Err(e) => {
                log::warn!("line {}: {}, skipping", line_no, e);
                continue;
            }
        };

        match rec.record_type {
            TYPE_DATA => {
                for (i, &byte) in rec.data.iter().enumerate() {
                    let addr = rec.address as usize + i;
                    if addr > u16::MAX as usize {
                        log::warn!("line {}: data runs past the address space", line_no);
                        break;
                    }
                    let addr = addr as u16;
                    let region = Region::classify(addr);
                    let offset = (addr - region.window_base()) as usize;
                    let stored = match region {
                        Region::Mreg => mreg.store(offset, byte),
                        Region::Creg => creg.store(offset, byte),
                        Region::Sfr => sfr.store(offset, byte),
                        Region::Program => program.store(offset, byte),
                    };
                    if !stored {
                        return Err(Error::HexOverflow { region });
                    }
                }
            }
            TYPE_EOF => {
                log::debug!("line {}: end of file record", line_no);
                break;
            }
            other => {
                log::debug!("line {}: record type 0x{:02X} ignored", line_no, other);
            }
        }
    }

    let mut payload = ProgrammingPayload::new();
    if creg.is_populated() {
        payload.set_register_span(Region::Creg, creg.span());
    }
    if mreg.is_populated() {
        payload.set_register_span(Region::Mreg, mreg.span());
    }
    if sfr.is_populated() {
        payload.set_register_span(Region::Sfr, sfr.span());
    }
    if program.is_populated() {
        payload.set_program_span(program.span())?;
    }

    log::debug!(
        "extracted spans: MREG={} CREG={} SFR={} PROGRAM={} bytes, {} instructions",
        mreg.span().len(),
        creg.span().len(),
        sfr.span().len(),
        program.span().len(),
        payload.instructions.len()
    );

    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::{checksum16, CREG_DATA_LEN, CREG_WIRE_LEN, MREG_WIRE_LEN};

    /// Build one well-formed data record.
    fn data_record(addr: u16, data: &[u8]) -> String {
        record_with_type(addr, 0x00, data)
    }

    fn record_with_type(addr: u16, record_type: u8, data: &[u8]) -> String {
        let mut line = format!(":{:02X}{:04X}{:02X}", data.len(), addr, record_type);
        let mut sum = data.len() as u8;
        sum = sum
            .wrapping_add((addr >> 8) as u8)
            .wrapping_add(addr as u8)
            .wrapping_add(record_type);
        for &b in data {
            line.push_str(&format!("{:02X}", b));
            sum = sum.wrapping_add(b);
        }
        line.push_str(&format!("{:02X}", sum.wrapping_neg()));
        line
    }

    const EOF: &str = ":00000001FF";

    #[test]
    fn test_rejects_empty_and_unmarked() {
        assert_eq!(parse_payload(""), Err(Error::EmptyHexFile));
        assert_eq!(parse_payload("   \n \n"), Err(Error::EmptyHexFile));
        assert_eq!(
            parse_payload("hello world\n:00000001FF"),
            Err(Error::MissingStartMarker)
        );
    }

    #[test]
    fn test_regions_land_in_their_windows() {
        let content = [
            data_record(0x0000, &[0x01, 0x02]),
            data_record(0x0800, &[0x03]),
            data_record(0x1000, &[0x04]),
            data_record(0x1800, &[0x44, 0x33, 0x22, 0x11, 0x88, 0x77, 0x66, 0x55]),
            EOF.to_string(),
        ]
        .join("\n");

        let payload = parse_payload(&content).unwrap();
        assert_eq!(payload.mreg.len(), MREG_WIRE_LEN);
        assert_eq!(&payload.mreg[..2], &[0x01, 0x02]);
        assert_eq!(payload.creg.len(), CREG_WIRE_LEN);
        assert_eq!(payload.creg[0], 0x03);
        assert_eq!(payload.sfr[0], 0x04);
        assert_eq!(payload.instructions.as_slice(), &[0x1122_3344, 0x5566_7788]);
    }

    #[test]
    fn test_gap_zero_fill_and_overwrite() {
        let content = [
            data_record(0x0802, &[0xAA]),
            data_record(0x0805, &[0xBB]),
            // overwrite the first byte
            data_record(0x0802, &[0xCC]),
            EOF.to_string(),
        ]
        .join("\n");

        let payload = parse_payload(&content).unwrap();
        // span is 0x0802..=0x0805, padded out to the CREG data size
        assert_eq!(&payload.creg[..4], &[0xCC, 0x00, 0x00, 0xBB]);
        assert!(payload.creg[4..CREG_DATA_LEN].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_bad_checksum_skips_only_that_record() {
        let good = data_record(0x0800, &[0x03]);
        let mut bad = data_record(0x0801, &[0x04]);
        // corrupt one data nibble, keeping the old checksum
        let n = bad.len() - 4;
        bad.replace_range(n..n + 1, "5");
        let content = [good, bad, EOF.to_string()].join("\n");

        let payload = parse_payload(&content).unwrap();
        assert_eq!(payload.creg[0], 0x03);
        // the corrupted record's byte never landed
        assert_eq!(payload.creg[1], 0x00);
    }

    #[test]
    fn test_eof_record_stops_parsing() {
        let content = [
            data_record(0x0800, &[0x03]),
            EOF.to_string(),
            data_record(0x0801, &[0x04]),
        ]
        .join("\n");

        let payload = parse_payload(&content).unwrap();
        assert_eq!(payload.creg[0], 0x03);
        assert_eq!(payload.creg[1], 0x00);
    }

    #[test]
    fn test_unknown_record_types_and_comments_ignored() {
        let content = [
            data_record(0x0800, &[0x03]),
            record_with_type(0x0000, 0x04, &[0x00, 0x01]),
            "; a comment".to_string(),
            ":09".to_string(), // too short
            EOF.to_string(),
        ]
        .join("\n");

        let payload = parse_payload(&content).unwrap();
        assert_eq!(payload.creg[0], 0x03);
        assert!(payload.mreg.is_empty());
    }

    #[test]
    fn test_two_instruction_program_wire_image() {
        // End-to-end scenario from the protocol contract: the 8 data
        // bytes land little-endian-per-word and the file's own checksum
        // record bytes ride along.
        let instructions = [0x44, 0x33, 0x22, 0x11, 0x88, 0x77, 0x66, 0x55];
        let checksum = checksum16(&instructions);
        let content = [
            data_record(0x1800, &instructions),
            data_record(0x1808, &checksum.to_le_bytes()),
            EOF.to_string(),
        ]
        .join("\n");

        let payload = parse_payload(&content).unwrap();
        assert_eq!(payload.instructions.as_slice(), &[0x1122_3344, 0x5566_7788]);
        assert_eq!(payload.program.len(), 10);
        assert_eq!(&payload.program[..8], &instructions);
        assert_eq!(&payload.program[8..], &checksum.to_le_bytes());
    }

    #[test]
    fn test_program_overflow_is_fatal() {
        // 1024 instructions fit; one more record of program data overflows
        let mut lines = Vec::new();
        for i in 0..(PROGRAM_WIRE_MAX / 16 + 1) {
            lines.push(data_record(0x1800u16 + (i * 16) as u16, &[0xA5; 16]));
        }
        lines.push(EOF.to_string());
        let content = lines.join("\n");
        assert_eq!(
            parse_payload(&content),
            Err(Error::HexOverflow {
                region: Region::Program
            })
        );
    }
}
