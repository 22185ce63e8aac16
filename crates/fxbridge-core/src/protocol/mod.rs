//! Target device protocol
//!
//! One operation per target-facing action, each producing an observable
//! bus write. [`Target`] owns the bus handle, the status sink and the
//! local running flag, so the whole I/O context threads through the
//! control loop as one value instead of ambient module state.
//!
//! Uses `maybe_async` to support both sync and async modes:
//! - With `is_sync` feature: blocking/synchronous
//! - Without `is_sync` feature: async

pub mod opcodes;
pub mod status;

use maybe_async::maybe_async;

use crate::bus::{self, BusMaster};
use crate::error::{Error, Result};
use crate::payload::{Region, CHECKSUM_LEN, INSTRUCTION_LEN, MAX_INSTRUCTIONS};
use crate::status::{StatusEvent, StatusSink};

pub use opcodes::{Command, MAX_FLASH_LOCATION};
pub use status::{DeviceStatus, TransferState, STATUS_LEN};

/// The target's fixed bus address
pub const TARGET_ADDR: u8 = 0x30;

/// Settle time after the flash-write opcode; the commit is not
/// otherwise observable, so no bus traffic is allowed before this
/// elapses
pub const FLASH_SETTLE_US: u32 = 200_000;

/// Short pause after every command write
const COMMAND_SETTLE_US: u32 = 10_000;

/// The programming target: bus handle, status sink, running flag.
pub struct Target<M, S> {
    bus: M,
    sink: S,
    addr: u8,
    running: bool,
}

impl<M, S> Target<M, S> {
    /// Wrap a bus and sink for the default target address.
    pub fn new(bus: M, sink: S) -> Self {
        Self::with_address(bus, sink, TARGET_ADDR)
    }

    /// Wrap a bus and sink for a non-default target address.
    pub fn with_address(bus: M, sink: S, addr: u8) -> Self {
        Self {
            bus,
            sink,
            addr,
            running: false,
        }
    }

    /// The target's bus address.
    pub fn addr(&self) -> u8 {
        self.addr
    }

    /// Whether a program was started from RAM and not stopped since.
    pub fn running(&self) -> bool {
        self.running
    }

    /// Direct access to the bus (pass-through traffic, status reads).
    pub fn bus_mut(&mut self) -> &mut M {
        &mut self.bus
    }

    /// Direct access to the status sink.
    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Tear the context apart again.
    pub fn into_parts(self) -> (M, S) {
        (self.bus, self.sink)
    }
}

#[maybe_async]
impl<M: BusMaster, S: StatusSink> Target<M, S> {
    /// Enter programming mode. Required before any transfer; safe to
    /// repeat while already in programming mode.
    pub async fn enter_programming_mode(&mut self) -> Result<()> {
        let op = Command::EnterProgramming.encode();
        let frame = [op[0], op[1], self.addr];
        self.command_write(&frame, "ENTER_PRG").await
    }

    /// Leave programming mode, returning the target to RUN. Always
    /// safe; clears the local running flag.
    pub async fn exit_programming_mode(&mut self) -> Result<()> {
        let frame = Command::ExitProgramming.encode();
        self.command_write(&frame, "EXIT_PRG").await?;
        self.running = false;
        Ok(())
    }

    /// Transfer one region: the selecting opcode, then the wire payload
    /// (data + checksum) as a single bus transaction. The payload must
    /// be exactly the region's wire size or the operation is refused
    /// before anything is written.
    pub async fn transfer_region(&mut self, region: Region, wire: &[u8]) -> Result<()> {
        let command = match region {
            Region::Program => {
                let data_len = wire.len().saturating_sub(CHECKSUM_LEN);
                if data_len == 0 || data_len % INSTRUCTION_LEN != 0 {
                    return self.refuse(Error::PayloadSizeMismatch {
                        region,
                        len: wire.len(),
                    });
                }
                let count = data_len / INSTRUCTION_LEN;
                if count > MAX_INSTRUCTIONS {
                    return self.refuse(Error::TooManyInstructions);
                }
                Command::TransferProgram {
                    count: count as u16,
                }
            }
            _ => {
                // wire_len is always Some for the register regions
                if Some(wire.len()) != region.wire_len() {
                    return self.refuse(Error::PayloadSizeMismatch {
                        region,
                        len: wire.len(),
                    });
                }
                Command::TransferRegister(region)
            }
        };

        let op = command.encode();
        log::debug!(
            "XFER_{}: opcode {:02X} {:02X}, {} bytes",
            region,
            op[0],
            op[1],
            wire.len()
        );
        self.command_write(&op, "transfer opcode").await?;

        if let Err(e) = bus::write_with_fallback(&mut self.bus, self.addr, wire).await {
            log::error!("{} payload write failed", region);
            self.sink.event(StatusEvent::Error);
            return Err(e);
        }
        log::debug!("sent {} bytes of {} data", wire.len(), region);
        Ok(())
    }

    /// Start executing the uploaded program from RAM. Sets the running
    /// flag; periodic running indication is the caller's job from here.
    pub async fn execute_from_ram(&mut self) -> Result<()> {
        let frame = Command::ExecuteFromRam.encode();
        self.command_write(&frame, "EXEC_FROM_RAM").await?;
        self.running = true;
        Ok(())
    }

    /// Commit the uploaded program to flash slot `location` (0-15).
    /// Blocks for the fixed settle delay afterwards; the commit is not
    /// otherwise observable.
    pub async fn write_to_flash(&mut self, location: u8) -> Result<()> {
        if location > MAX_FLASH_LOCATION {
            return self.refuse(Error::LocationOutOfRange);
        }
        let frame = Command::WriteFlash { location }.encode();
        self.command_write(&frame, "WRITE_PRG").await?;
        log::debug!("flash write to slot {:X}, settling", location);
        self.bus.delay_us(FLASH_SETTLE_US).await;
        Ok(())
    }

    /// Stop execution and return the target to STATE0. Issued as part
    /// of every cleanup, regardless of prior success.
    pub async fn return_to_idle(&mut self) -> Result<()> {
        let frame = Command::ReturnToIdle.encode();
        self.command_write(&frame, "RETURN_0").await
    }

    /// Read the 12-byte status block. `Ok(None)` means the read went
    /// through but the block is the garbage pattern the target returns
    /// while busy; diagnostics only, never control flow.
    pub async fn read_status(&mut self) -> Result<Option<DeviceStatus>> {
        let mut raw = [0u8; STATUS_LEN];
        bus::locked_read(&mut self.bus, self.addr, &mut raw)
            .await
            .map_err(|_| Error::BusReadFailed)?;
        if !status::is_meaningful(&raw) {
            log::debug!("status read not meaningful (target busy)");
            return Ok(None);
        }
        Ok(Some(DeviceStatus::parse(&raw)))
    }

    /// Pause helper for sequence pacing.
    pub async fn delay_us(&mut self, us: u32) {
        self.bus.delay_us(us).await;
    }

    /// One locked command write plus the post-command pause.
    async fn command_write(&mut self, frame: &[u8], what: &str) -> Result<()> {
        if let Err(e) = bus::locked_write(&mut self.bus, self.addr, frame).await {
            log::error!("{} command write failed", what);
            self.sink.event(StatusEvent::Error);
            return Err(e);
        }
        log::debug!("sent {} command", what);
        self.bus.delay_us(COMMAND_SETTLE_US).await;
        Ok(())
    }

    /// Refuse an operation before any bus write.
    fn refuse(&mut self, error: Error) -> Result<()> {
        log::error!("operation refused: {}", error);
        self.sink.event(StatusEvent::Error);
        Err(error)
    }
}
