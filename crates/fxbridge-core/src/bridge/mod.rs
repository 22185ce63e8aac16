//! HID-to-bus bridge with transfer interception
//!
//! The bridge forwards ordinary host bus traffic verbatim, but writes
//! addressed to the target whose leading bytes decode to a programming
//! command are silently reinterpreted: region transfers are reassembled
//! from the multi-packet burst that follows, and once the host issues
//! execute or flash-write the accumulated regions are packaged into the
//! same [`ProgrammingPayload`] the hex parser produces and run through
//! the same programming sequence.
//!
//! Packet boundaries are not framed on the wire; the transport framing
//! flag is the only disambiguator between "continuation data" and "new
//! command". A START+STOP packet whose first two bytes match a
//! recognized opcode always pre-empts an in-progress reassembly, which
//! silently discards the partial buffer. That pre-emption rule is a
//! known sharp edge of the bridge hardware's framing and is kept
//! exactly as observed; do not "fix" it here.

pub mod report;

use maybe_async::maybe_async;

use crate::bus::{self, BusMaster};
use crate::payload::{decode_instructions, ProgrammingPayload, Region};
use crate::protocol::{Command, Target};
use crate::sequence::{self, ProgramAction};
use crate::status::{StatusEvent, StatusSink};

use report::{
    read_response, status_response, HostReport, WriteReport, BUS_STATUS_ERROR, BUS_STATUS_IDLE,
    CONFIG_BUS_RESET, CONFIG_SET_SPEED, MAX_READ_LEN, REPORT_DATA_LEN, REPORT_READ, REPORT_STATUS,
};

/// The HID primitives supplied by the host environment.
#[maybe_async(AFIT)]
pub trait HidPort {
    /// Fetch the most recent unread host report, if any. Returns the
    /// report id; the payload lands in `buf`.
    async fn recv(&mut self, buf: &mut [u8; REPORT_DATA_LEN]) -> Option<u8>;

    /// Send an input report back to the host.
    async fn send(&mut self, id: u8, data: &[u8; REPORT_DATA_LEN]) -> crate::Result<()>;
}

/// Reassembly state: passing traffic through, or collecting one
/// region's wire bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BridgeMode {
    Normal,
    Awaiting { region: Region, remaining: usize },
}

/// The interception state machine. Owns the [`Target`] so the HID path
/// and any file-triggered path share one bus context.
pub struct Bridge<M, S> {
    target: Target<M, S>,
    mode: BridgeMode,
    /// Region accumulators; reused across attempts, reset on mode entry
    acc: ProgrammingPayload,
    /// Wire size the current program reassembly announced
    program_expected: usize,
    /// Whether the target was put into programming mode via the bridge
    target_mode_active: bool,
    bus_status: u8,
}

impl<M, S> Bridge<M, S> {
    /// Wrap a target context.
    pub fn new(target: Target<M, S>) -> Self {
        Self {
            target,
            mode: BridgeMode::Normal,
            acc: ProgrammingPayload::new(),
            program_expected: 0,
            target_mode_active: false,
            bus_status: BUS_STATUS_IDLE,
        }
    }

    /// The shared target context (for the file-triggered path).
    pub fn target_mut(&mut self) -> &mut Target<M, S> {
        &mut self.target
    }

    /// Current bus status byte as reported to the host.
    pub fn bus_status(&self) -> u8 {
        self.bus_status
    }

    /// Whether the host drove the target into programming mode.
    pub fn programming_mode_active(&self) -> bool {
        self.target_mode_active
    }

    /// Give the target context back.
    pub fn into_target(self) -> Target<M, S> {
        self.target
    }

    fn reset_reassembly(&mut self) {
        self.acc.clear();
        self.program_expected = 0;
        self.mode = BridgeMode::Normal;
    }
}

#[maybe_async]
impl<M: BusMaster, S: StatusSink> Bridge<M, S> {
    /// Poll the HID port once and handle at most one report. Returns
    /// whether a report was processed. Never propagates I/O failures
    /// into the control loop; they are logged and reflected in the bus
    /// status byte.
    pub async fn service<P: HidPort>(&mut self, port: &mut P) -> bool {
        let mut buf = [0u8; REPORT_DATA_LEN];
        let Some(id) = port.recv(&mut buf).await else {
            return false;
        };
        self.target.sink_mut().event(StatusEvent::BridgeActivity);

        match HostReport::parse(id, &buf) {
            Some(HostReport::Configure { command, args }) => self.handle_configure(command, args),
            Some(HostReport::StatusQuery) => {
                let response = status_response(self.bus_status);
                if port.send(REPORT_STATUS, &response).await.is_err() {
                    log::error!("failed to answer status query");
                }
            }
            Some(HostReport::ReadRequest { addr, len }) => {
                self.handle_read_request(port, addr, len).await;
            }
            Some(HostReport::Write(w)) => self.handle_write(&w).await,
            None => log::debug!("report 0x{:02X} ignored", id),
        }
        true
    }

    /// Configuration commands are handled locally, never forwarded.
    fn handle_configure(&mut self, command: u8, args: &[u8]) {
        match command {
            CONFIG_BUS_RESET => {
                log::debug!("bus reset requested");
                self.bus_status = BUS_STATUS_IDLE;
            }
            CONFIG_SET_SPEED if args.len() >= 2 => {
                let speed = u16::from_le_bytes([args[0], args[1]]);
                // acknowledged only; the supplied bus runs at its own pace
                log::debug!("bus speed set to {} kHz", speed);
            }
            other => log::debug!("configuration command 0x{:02X} ignored", other),
        }
    }

    /// Read requests are always serviced as literal bus reads,
    /// regardless of bridge state.
    async fn handle_read_request<P: HidPort>(&mut self, port: &mut P, addr: u8, len: u16) {
        let want = (len as usize).min(MAX_READ_LEN);
        let mut data = [0u8; MAX_READ_LEN];
        let result = if want > 0 {
            bus::locked_read(self.target.bus_mut(), addr, &mut data[..want]).await
        } else {
            Ok(())
        };

        let response = match result {
            Ok(()) => {
                self.bus_status = BUS_STATUS_IDLE;
                log::debug!("read 0x{:02X}: {} bytes", addr, want);
                read_response(&data[..want])
            }
            Err(_) => {
                self.bus_status = BUS_STATUS_ERROR;
                log::debug!("read 0x{:02X} failed", addr);
                read_response(&[])
            }
        };
        if port.send(REPORT_READ, &response).await.is_err() {
            log::error!("failed to send read response");
        }
    }

    /// The interception decision for one write report.
    async fn handle_write(&mut self, w: &WriteReport<'_>) {
        if w.addr != self.target.addr() {
            // pass-through is never intercepted
            self.pass_through(w).await;
            return;
        }

        if let BridgeMode::Awaiting { region, remaining } = self.mode {
            if w.is_single_packet() {
                if let Some(cmd) = decode_leading(w.data) {
                    // Known sharp edge: a recognized command always
                    // pre-empts the reassembly and the partial buffer
                    // is lost.
                    log::warn!(
                        "{:?} pre-empts {} reassembly with {} bytes outstanding",
                        cmd,
                        region,
                        remaining
                    );
                    self.mode = BridgeMode::Normal;
                    self.handle_command(cmd, &w.data[2..]).await;
                    return;
                }
                // single-packet framing, but not a command: data
            }
            self.append_region_data(w.data);
            return;
        }

        if let Some(cmd) = decode_leading(w.data) {
            self.handle_command(cmd, &w.data[2..]).await;
            return;
        }

        // target-addressed but no recognized opcode: ordinary traffic
        self.pass_through(w).await;
    }

    /// Act on a recognized programming command observed on the HID
    /// path. `extra` is any payload following the 2-byte opcode.
    async fn handle_command(&mut self, cmd: Command, extra: &[u8]) {
        match cmd {
            Command::EnterProgramming => {
                // fresh attempt: stale data from an aborted one must
                // not leak in
                self.reset_reassembly();
                self.target_mode_active = true;
                if self.target.enter_programming_mode().await.is_err() {
                    log::error!("bridged ENTER_PRG failed");
                }
            }
            Command::ExitProgramming => {
                self.target_mode_active = false;
                if self.target.exit_programming_mode().await.is_err() {
                    log::error!("bridged EXIT_PRG failed");
                }
            }
            Command::TransferRegister(region) => {
                // wire_len is always Some for the register regions
                if let Some(len) = region.wire_len() {
                    self.start_reassembly(region, len, extra);
                }
            }
            Command::TransferProgram { .. } => {
                // decode bounds count to 1..=1024
                let len = cmd.expected_data_len().unwrap_or(0);
                self.program_expected = len;
                self.start_reassembly(Region::Program, len, extra);
            }
            Command::ExecuteFromRam => self.dispatch(ProgramAction::ExecuteFromRam).await,
            Command::WriteFlash { location } => {
                self.dispatch(ProgramAction::WriteFlash(location)).await
            }
            Command::ReturnToIdle => {
                if self.target.return_to_idle().await.is_err() {
                    log::error!("bridged RETURN_0 failed");
                }
            }
        }
    }

    /// Begin collecting one region's wire bytes. Any payload that rode
    /// along with the opcode is the first chunk.
    fn start_reassembly(&mut self, region: Region, wire_len: usize, first_chunk: &[u8]) {
        clear_region(&mut self.acc, region);
        self.mode = BridgeMode::Awaiting {
            region,
            remaining: wire_len,
        };
        log::debug!("collecting {}: expecting {} bytes", region, wire_len);
        if !first_chunk.is_empty() {
            self.append_region_data(first_chunk);
        }
    }

    /// Append data to the in-progress reassembly, finishing it when the
    /// announced byte count has arrived.
    fn append_region_data(&mut self, data: &[u8]) {
        let BridgeMode::Awaiting { region, remaining } = self.mode else {
            log::debug!("data with no reassembly in progress, dropped");
            return;
        };
        let take = data.len().min(remaining);
        extend_region(&mut self.acc, region, &data[..take]);
        let remaining = remaining - take;
        if remaining == 0 {
            log::debug!(
                "{} complete ({} bytes)",
                region,
                self.acc.region_wire(region).len()
            );
            self.mode = BridgeMode::Normal;
        } else {
            self.mode = BridgeMode::Awaiting { region, remaining };
        }
    }

    /// Package the accumulated regions and run the programming
    /// sequence. The accumulators are discarded afterwards, success or
    /// not.
    async fn dispatch(&mut self, action: ProgramAction) {
        self.prune_incomplete();
        if !self.acc.program.is_empty() {
            decode_instructions(&self.acc.program, &mut self.acc.instructions);
        }
        log::info!(
            "dispatching bridged payload: CREG={} MREG={} SFR={} PROGRAM={} bytes ({} instructions)",
            self.acc.creg.len(),
            self.acc.mreg.len(),
            self.acc.sfr.len(),
            self.acc.program.len(),
            self.acc.instructions.len()
        );
        if sequence::run_programming(&mut self.target, &self.acc, action)
            .await
            .is_err()
        {
            log::error!("bridged programming attempt failed");
        }
        self.acc.clear();
        self.program_expected = 0;
        self.mode = BridgeMode::Normal;
    }

    /// Drop buffers that never reached their announced size (abandoned
    /// by the pre-emption rule).
    fn prune_incomplete(&mut self) {
        if let BridgeMode::Awaiting { region, remaining } = self.mode {
            log::warn!(
                "dropping unfinished {} reassembly ({} bytes short)",
                region,
                remaining
            );
            clear_region(&mut self.acc, region);
            self.mode = BridgeMode::Normal;
        }
        for region in [Region::Creg, Region::Mreg, Region::Sfr] {
            let len = self.acc.region_wire(region).len();
            if len != 0 && Some(len) != region.wire_len() {
                log::warn!("dropping incomplete {} buffer ({} bytes)", region, len);
                clear_region(&mut self.acc, region);
            }
        }
        let len = self.acc.program.len();
        if len != 0 && len != self.program_expected {
            log::warn!("dropping incomplete PROGRAM buffer ({} bytes)", len);
            self.acc.program.clear();
        }
    }

    /// Forward one write verbatim, single transaction, and track the
    /// outcome in the bus status byte.
    async fn pass_through(&mut self, w: &WriteReport<'_>) {
        log::debug!("pass-through write 0x{:02X}: {} bytes", w.addr, w.data.len());
        match bus::locked_write(self.target.bus_mut(), w.addr, w.data).await {
            Ok(()) => self.bus_status = BUS_STATUS_IDLE,
            Err(_) => {
                log::debug!("pass-through write 0x{:02X} not acknowledged", w.addr);
                self.bus_status = BUS_STATUS_ERROR;
            }
        }
    }
}

/// Decode the leading opcode bytes of a write payload.
fn decode_leading(data: &[u8]) -> Option<Command> {
    if data.len() < 2 {
        return None;
    }
    Command::decode(data[0], data[1])
}

fn clear_region(acc: &mut ProgrammingPayload, region: Region) {
    match region {
        Region::Creg => acc.creg.clear(),
        Region::Mreg => acc.mreg.clear(),
        Region::Sfr => acc.sfr.clear(),
        Region::Program => acc.program.clear(),
    }
}

fn extend_region(acc: &mut ProgrammingPayload, region: Region, data: &[u8]) {
    // reassembly never exceeds the announced wire size, which fits the
    // buffer capacity
    let _ = match region {
        Region::Creg => acc.creg.extend_from_slice(data),
        Region::Mreg => acc.mreg.extend_from_slice(data),
        Region::Sfr => acc.sfr.extend_from_slice(data),
        Region::Program => acc.program.extend_from_slice(data),
    };
}
