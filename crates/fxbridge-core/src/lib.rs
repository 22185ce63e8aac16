//! fxbridge-core - Core library for FXCore DSP programming
//!
//! This crate implements the two halves of an FXCore programming bridge:
//! the file-driven path (parse a hex build product, push it into the DSP
//! over the bus) and the host-driven path (reinterpret FT260-style HID
//! write reports as the same structured transfer). Both paths end in the
//! same programming sequence, so the bytes on the bus are identical no
//! matter which side initiated the upload.
//!
//! The crate is `no_std` compatible. All I/O goes through the [`bus::BusMaster`]
//! and [`bridge::HidPort`] traits; buffers are fixed capacity (`heapless`),
//! sized to the largest transfer the target accepts.
//!
//! # Features
//!
//! - `std` - Enable standard library support (`std::error::Error` impls)
//! - `is_sync` - Compile the `maybe-async` seams synchronously
//!
//! # Example
//!
//! ```ignore
//! use fxbridge_core::{hex, protocol::Target, sequence, status::NullSink};
//!
//! fn program<M: fxbridge_core::bus::BusMaster>(bus: M, source: &str) {
//!     let payload = hex::parse_payload(source).unwrap();
//!     let mut target = Target::new(bus, NullSink);
//!     sequence::run_programming(&mut target, &payload, sequence::ProgramAction::ExecuteFromRam)
//!         .unwrap();
//! }
//! ```

#![cfg_attr(not(any(feature = "std", test)), no_std)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
// Allow async fn in traits - we use maybe-async for dual sync/async support
#![allow(async_fn_in_trait)]

pub mod bridge;
pub mod bus;
pub mod error;
pub mod hex;
pub mod payload;
pub mod protocol;
pub mod sequence;
pub mod status;

pub use error::{Error, Result};
