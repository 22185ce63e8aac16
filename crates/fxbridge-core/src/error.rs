//! Error types for fxbridge-core
//!
//! This module provides a no_std compatible error type that can be used
//! throughout the crate.

use core::fmt;

use crate::payload::Region;

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    // Hex input errors
    /// Hex source was empty (or whitespace only)
    EmptyHexFile,
    /// Hex source does not begin with the `:` record marker
    MissingStartMarker,
    /// Hex source populates more of a region than the target can hold
    HexOverflow {
        /// Region whose capacity was exceeded
        region: Region,
    },

    // Transport errors
    /// Bus write was rejected, including the chunked fallback
    BusWriteFailed,
    /// Bus read was rejected
    BusReadFailed,
    /// HID input report could not be sent back to the host
    ReportSendFailed,

    // Protocol precondition errors (refused before any bus write)
    /// Region payload length does not match the region's wire size
    PayloadSizeMismatch {
        /// Region being transferred
        region: Region,
        /// Actual payload length in bytes
        len: usize,
    },
    /// Flash location outside 0-15
    LocationOutOfRange,
    /// Program exceeds the 1024 instruction limit
    TooManyInstructions,

    // Sequence errors
    /// A stage of the programming sequence failed and the rest was aborted
    ProgrammingAborted,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyHexFile => write!(f, "hex source is empty"),
            Self::MissingStartMarker => {
                write!(f, "hex source does not start with a ':' record marker")
            }
            Self::HexOverflow { region } => {
                write!(f, "hex source overflows the {} region", region)
            }
            Self::BusWriteFailed => write!(f, "bus write failed"),
            Self::BusReadFailed => write!(f, "bus read failed"),
            Self::ReportSendFailed => write!(f, "failed to send HID input report"),
            Self::PayloadSizeMismatch { region, len } => {
                write!(f, "{} payload is {} bytes, not the region wire size", region, len)
            }
            Self::LocationOutOfRange => write!(f, "flash location must be 0-15"),
            Self::TooManyInstructions => {
                write!(f, "program exceeds the 1024 instruction limit")
            }
            Self::ProgrammingAborted => write!(f, "programming sequence aborted"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
