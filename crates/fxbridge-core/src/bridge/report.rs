//! FT260-style HID report model
//!
//! The host talks to the bridge chip through four report kinds. Report
//! payloads are a fixed 63 bytes; the report id travels out of band
//! (HID report id).

/// Payload length of every report, in and out
pub const REPORT_DATA_LEN: usize = 63;
/// Most data bytes a read response can carry (one byte is the count)
pub const MAX_READ_LEN: usize = REPORT_DATA_LEN - 1;
/// Most data bytes a write report can carry (addr, flag, count prefix)
pub const MAX_WRITE_LEN: usize = REPORT_DATA_LEN - 3;

/// Feature report: configuration commands
pub const REPORT_CONFIG: u8 = 0xA1;
/// Feature report: bus status query
pub const REPORT_STATUS: u8 = 0xC0;
/// Output report: bus read request; input report: read data
pub const REPORT_READ: u8 = 0xC2;
/// Output report: bus write
pub const REPORT_WRITE: u8 = 0xD0;

/// Continuation of a multi-packet burst
pub const FLAG_CONTINUATION: u8 = 0x00;
/// First packet of a burst (bus START)
pub const FLAG_START: u8 = 0x02;
/// Last packet of a burst (bus STOP)
pub const FLAG_STOP: u8 = 0x04;
/// Complete single packet (START + STOP)
pub const FLAG_START_STOP: u8 = 0x06;

/// Bus idle / last transaction ok
pub const BUS_STATUS_IDLE: u8 = 0x20;
/// Last transaction not acknowledged
pub const BUS_STATUS_ERROR: u8 = 0x26;

/// Configuration command: reset the bus state
pub const CONFIG_BUS_RESET: u8 = 0x20;
/// Configuration command: set bus speed (kHz, little-endian)
pub const CONFIG_SET_SPEED: u8 = 0x22;

/// A write report's fields.
#[derive(Debug, Clone, Copy)]
pub struct WriteReport<'a> {
    /// Destination bus address
    pub addr: u8,
    /// Transport framing flag
    pub flag: u8,
    /// Payload bytes (already cut to the declared count)
    pub data: &'a [u8],
}

impl WriteReport<'_> {
    /// Whether this packet is framed as a complete single transfer
    /// (START + STOP) rather than part of a burst.
    pub fn is_single_packet(&self) -> bool {
        self.flag == FLAG_START_STOP
    }
}

/// One report received from the host, decoded by kind.
#[derive(Debug, Clone, Copy)]
pub enum HostReport<'a> {
    /// Configuration command
    Configure {
        /// Command byte
        command: u8,
        /// Remaining payload
        args: &'a [u8],
    },
    /// Bus status query; answered with the current status byte
    StatusQuery,
    /// Bus read request
    ReadRequest {
        /// Bus address to read from
        addr: u8,
        /// Requested byte count
        len: u16,
    },
    /// Bus write
    Write(WriteReport<'a>),
}

impl<'a> HostReport<'a> {
    /// Decode a raw report. Returns `None` for unknown ids or reports
    /// too short to carry their own header.
    pub fn parse(id: u8, buf: &'a [u8]) -> Option<HostReport<'a>> {
        match id {
            REPORT_CONFIG => buf.split_first().map(|(&command, args)| HostReport::Configure {
                command,
                args,
            }),
            REPORT_STATUS => Some(HostReport::StatusQuery),
            REPORT_READ => {
                if buf.len() < 4 {
                    return None;
                }
                Some(HostReport::ReadRequest {
                    addr: buf[0],
                    len: u16::from_le_bytes([buf[2], buf[3]]),
                })
            }
            REPORT_WRITE => {
                if buf.len() < 3 {
                    return None;
                }
                let count = (buf[2] as usize).min(buf.len() - 3);
                Some(HostReport::Write(WriteReport {
                    addr: buf[0],
                    flag: buf[1],
                    data: &buf[3..3 + count],
                }))
            }
            _ => None,
        }
    }
}

/// Build the input-report payload answering a read request:
/// a byte count followed by the data, zero-padded to the report size.
pub fn read_response(data: &[u8]) -> [u8; REPORT_DATA_LEN] {
    let mut out = [0u8; REPORT_DATA_LEN];
    let len = data.len().min(MAX_READ_LEN);
    out[0] = len as u8;
    out[1..1 + len].copy_from_slice(&data[..len]);
    out
}

/// Build the input-report payload answering a status query.
pub fn status_response(status: u8) -> [u8; REPORT_DATA_LEN] {
    let mut out = [0u8; REPORT_DATA_LEN];
    out[0] = status;
    out
}
