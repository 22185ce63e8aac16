//! fxbridge-dummy - In-memory FXCore target emulator for testing
//!
//! Implements [`BusMaster`] over a model of the target's programming
//! behavior: mode entry/exit, per-region receive bookkeeping, slot
//! writes, and the 12-byte status block (which reads as garbage while
//! the emulated program "runs", like the real part). Every bus
//! transaction is captured for assertions, and an optional transaction
//! size limit makes the chunked-write fallback exercisable.

use fxbridge_core::bus::BusMaster;
use fxbridge_core::error::{Error, Result};
use fxbridge_core::payload::Region;
use fxbridge_core::protocol::{Command, TransferState, TARGET_ADDR};

/// Configuration for the emulated target
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// Device id reported in the status block
    pub device_id: u16,
    /// Serial number reported in the status block
    pub serial_number: u32,
    /// Largest write accepted as a single transaction; larger ones are
    /// rejected, which is what drives the caller's chunked fallback
    pub max_transfer_len: Option<usize>,
    /// Reject every write after this many transactions (failure
    /// injection for abort paths)
    pub fail_after_writes: Option<usize>,
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            device_id: 0x0A10,
            serial_number: 0x0012_3456,
            max_transfer_len: None,
            fail_after_writes: None,
        }
    }
}

/// In-memory FXCore target
pub struct DummyFxcore {
    config: DummyConfig,
    locked: bool,
    programming_mode: bool,
    running: bool,
    /// Region the target expects data for, and bytes still outstanding
    expecting: Option<(Region, usize)>,
    creg: Vec<u8>,
    mreg: Vec<u8>,
    sfr: Vec<u8>,
    program: Vec<u8>,
    transfer_state: TransferState,
    last_command: u16,
    program_slots: u16,
    /// Every write transaction attempted on the bus, address + bytes
    writes: Vec<(u8, Vec<u8>)>,
}

impl DummyFxcore {
    /// Create an emulated target with the given configuration
    pub fn new(config: DummyConfig) -> Self {
        Self {
            config,
            locked: false,
            programming_mode: false,
            running: false,
            expecting: None,
            creg: Vec::new(),
            mreg: Vec::new(),
            sfr: Vec::new(),
            program: Vec::new(),
            transfer_state: TransferState::empty(),
            last_command: 0,
            program_slots: 0,
            writes: Vec::new(),
        }
    }

    /// Create an emulated target with the default configuration
    pub fn new_default() -> Self {
        Self::new(DummyConfig::default())
    }

    /// All write transactions seen so far (including rejected ones)
    pub fn writes(&self) -> &[(u8, Vec<u8>)] {
        &self.writes
    }

    /// Forget recorded transactions
    pub fn clear_writes(&mut self) {
        self.writes.clear();
    }

    /// The 2-byte opcodes of every command write the target accepted
    /// (data chunks and rejected writes excluded)
    pub fn command_log(&self) -> Vec<[u8; 2]> {
        let mut log = Vec::new();
        let mut expecting = 0usize;
        for (addr, data) in &self.writes {
            if *addr != TARGET_ADDR || data.len() < 2 {
                continue;
            }
            if let Some(max) = self.config.max_transfer_len {
                if data.len() > max {
                    continue;
                }
            }
            if expecting > 0 {
                expecting = expecting.saturating_sub(data.len());
                continue;
            }
            let op = [data[0], data[1]];
            if let Some(cmd) = Command::decode(op[0], op[1]) {
                log.push(op);
                if let Some(len) = cmd.expected_data_len() {
                    expecting = len.saturating_sub(data.len() - 2);
                }
            }
        }
        log
    }

    /// Region bytes the target has received (data + checksum)
    pub fn region_data(&self, region: Region) -> &[u8] {
        match region {
            Region::Creg => &self.creg,
            Region::Mreg => &self.mreg,
            Region::Sfr => &self.sfr,
            Region::Program => &self.program,
        }
    }

    /// Whether the target is in programming mode
    pub fn programming_mode(&self) -> bool {
        self.programming_mode
    }

    /// Whether the emulated program is executing from RAM
    pub fn running(&self) -> bool {
        self.running
    }

    /// Bitmap of flash slots that have been written
    pub fn program_slots(&self) -> u16 {
        self.program_slots
    }

    fn receive_data(&mut self, data: &[u8]) {
        let Some((region, remaining)) = self.expecting else {
            return;
        };
        let take = data.len().min(remaining);
        match region {
            Region::Creg => self.creg.extend_from_slice(&data[..take]),
            Region::Mreg => self.mreg.extend_from_slice(&data[..take]),
            Region::Sfr => self.sfr.extend_from_slice(&data[..take]),
            Region::Program => self.program.extend_from_slice(&data[..take]),
        }
        let remaining = remaining - take;
        if remaining == 0 {
            self.expecting = None;
            self.transfer_state |= match region {
                Region::Creg => TransferState::CREGS_RECEIVED,
                Region::Mreg => TransferState::MREGS_RECEIVED,
                Region::Sfr => TransferState::SFRS_RECEIVED,
                Region::Program => TransferState::PROGRAM_RECEIVED,
            };
            let registers = TransferState::CREGS_RECEIVED
                | TransferState::MREGS_RECEIVED
                | TransferState::SFRS_RECEIVED;
            if self.transfer_state.contains(registers) {
                self.transfer_state |= TransferState::REGISTERS_RECEIVED;
            }
        } else {
            self.expecting = Some((region, remaining));
        }
    }

    fn handle_command(&mut self, cmd: Command, data: &[u8]) -> Result<()> {
        log::trace!("target command: {:?}", cmd);
        self.last_command = u16::from_be_bytes([data[0], data[1]]);
        match cmd {
            Command::EnterProgramming => {
                self.programming_mode = true;
                self.expecting = None;
                self.creg.clear();
                self.mreg.clear();
                self.sfr.clear();
                self.program.clear();
                self.transfer_state = TransferState::empty();
            }
            Command::ExitProgramming => self.programming_mode = false,
            Command::TransferRegister(_) | Command::TransferProgram { .. } => {
                if !self.programming_mode {
                    return Err(Error::BusWriteFailed);
                }
                // expected_data_len is always Some for transfer commands
                let len = cmd.expected_data_len().unwrap_or(0);
                let region = match cmd {
                    Command::TransferRegister(region) => region,
                    _ => Region::Program,
                };
                self.expecting = Some((region, len));
                // payload bytes can ride along with the opcode
                self.receive_data(&data[2..]);
            }
            Command::ExecuteFromRam => {
                if !self.programming_mode {
                    return Err(Error::BusWriteFailed);
                }
                self.running = true;
            }
            Command::WriteFlash { location } => {
                if !self.programming_mode || location > 15 {
                    return Err(Error::BusWriteFailed);
                }
                self.program_slots |= 1 << location;
            }
            Command::ReturnToIdle => self.running = false,
        }
        Ok(())
    }
}

impl BusMaster for DummyFxcore {
    fn try_lock(&mut self) -> bool {
        if self.locked {
            return false;
        }
        self.locked = true;
        true
    }

    fn unlock(&mut self) {
        self.locked = false;
    }

    fn write(&mut self, addr: u8, data: &[u8]) -> Result<()> {
        self.writes.push((addr, data.to_vec()));

        if let Some(n) = self.config.fail_after_writes {
            if self.writes.len() > n {
                return Err(Error::BusWriteFailed);
            }
        }
        if addr != TARGET_ADDR {
            // nothing else answers on this bus
            return Err(Error::BusWriteFailed);
        }
        if let Some(max) = self.config.max_transfer_len {
            if data.len() > max {
                return Err(Error::BusWriteFailed);
            }
        }

        if self.expecting.is_some() {
            self.receive_data(data);
            return Ok(());
        }
        if data.len() >= 2 {
            if let Some(cmd) = Command::decode(data[0], data[1]) {
                return self.handle_command(cmd, data);
            }
        }
        // unrecognized writes are tolerated, like the real part
        Ok(())
    }

    fn read(&mut self, addr: u8, buf: &mut [u8]) -> Result<()> {
        if addr != TARGET_ADDR {
            return Err(Error::BusReadFailed);
        }
        if self.running {
            // executing from RAM: the status block reads as garbage
            buf.fill(0xFF);
            return Ok(());
        }
        let slots = self.program_slots.to_le_bytes();
        let id = self.config.device_id.to_le_bytes();
        let serial = self.config.serial_number.to_le_bytes();
        let block = [
            self.transfer_state.bits(),
            0x00,
            (self.last_command >> 8) as u8,
            self.last_command as u8,
            slots[0],
            slots[1],
            id[0],
            id[1],
            serial[0],
            serial[1],
            serial[2],
            serial[3],
        ];
        let n = buf.len().min(block.len());
        buf[..n].copy_from_slice(&block[..n]);
        if buf.len() > n {
            buf[n..].fill(0);
        }
        Ok(())
    }

    fn delay_us(&mut self, _us: u32) {
        // No delay needed for in-memory operations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fxbridge_core::payload::{checksum16, ProgrammingPayload, CREG_WIRE_LEN, SFR_WIRE_LEN};
    use fxbridge_core::protocol::Target;
    use fxbridge_core::status::NullSink;

    fn target(dummy: DummyFxcore) -> Target<DummyFxcore, NullSink> {
        Target::new(dummy, NullSink)
    }

    #[test]
    fn test_enter_and_exit_mode() {
        let mut t = target(DummyFxcore::new_default());
        t.enter_programming_mode().unwrap();
        assert!(t.bus_mut().programming_mode());
        t.exit_programming_mode().unwrap();
        assert!(!t.bus_mut().programming_mode());
    }

    #[test]
    fn test_transfer_requires_programming_mode() {
        let mut t = target(DummyFxcore::new_default());
        let wire = [0u8; CREG_WIRE_LEN];
        assert!(t.transfer_region(Region::Creg, &wire).is_err());
    }

    #[test]
    fn test_region_transfer_lands() {
        let mut t = target(DummyFxcore::new_default());
        t.enter_programming_mode().unwrap();

        let mut payload = ProgrammingPayload::new();
        payload.set_register_span(Region::Creg, &[0xAB; 10]);
        t.transfer_region(Region::Creg, &payload.creg).unwrap();

        let dummy = t.bus_mut();
        assert_eq!(dummy.region_data(Region::Creg), payload.creg.as_slice());
        // opcode write observed
        assert!(dummy
            .writes()
            .iter()
            .any(|(addr, data)| *addr == TARGET_ADDR && data.as_slice() == [0x01, 0x0F]));
    }

    #[test]
    fn test_size_mismatch_refused_before_any_write() {
        let mut t = target(DummyFxcore::new_default());
        t.enter_programming_mode().unwrap();
        let before = t.bus_mut().writes().len();

        let wire = [0u8; CREG_WIRE_LEN - 1];
        assert!(matches!(
            t.transfer_region(Region::Creg, &wire),
            Err(Error::PayloadSizeMismatch { .. })
        ));
        let wire = [0u8; SFR_WIRE_LEN + 2];
        assert!(t.transfer_region(Region::Sfr, &wire).is_err());

        assert_eq!(t.bus_mut().writes().len(), before);
    }

    #[test]
    fn test_flash_location_bounds() {
        let mut t = target(DummyFxcore::new_default());
        t.enter_programming_mode().unwrap();

        let before = t.bus_mut().writes().len();
        assert_eq!(t.write_to_flash(16), Err(Error::LocationOutOfRange));
        assert_eq!(t.bus_mut().writes().len(), before, "rejected before any bus write");

        t.write_to_flash(0).unwrap();
        t.write_to_flash(15).unwrap();
        assert_eq!(t.bus_mut().program_slots(), 0x8001);
    }

    #[test]
    fn test_program_opcode_encodes_instruction_count() {
        let mut t = target(DummyFxcore::new_default());
        t.enter_programming_mode().unwrap();

        let mut payload = ProgrammingPayload::new();
        payload
            .set_instructions(&[0x1122_3344, 0x5566_7788])
            .unwrap();
        t.transfer_region(Region::Program, &payload.program).unwrap();

        let dummy = t.bus_mut();
        // 0x0800 + 2 - 1
        assert!(dummy
            .writes()
            .iter()
            .any(|(_, data)| data.as_slice() == [0x08, 0x01]));
        let expected_data = [0x44, 0x33, 0x22, 0x11, 0x88, 0x77, 0x66, 0x55];
        let received = dummy.region_data(Region::Program);
        assert_eq!(&received[..8], &expected_data);
        assert_eq!(&received[8..], &checksum16(&expected_data).to_le_bytes());
    }

    #[test]
    fn test_chunked_fallback_transfers_every_byte() {
        let mut dummy = DummyFxcore::new(DummyConfig {
            max_transfer_len: Some(32),
            ..DummyConfig::default()
        });
        dummy.write(TARGET_ADDR, &[0xA5, 0x5A, TARGET_ADDR]).unwrap();
        let mut t = target(dummy);

        let mut payload = ProgrammingPayload::new();
        payload.set_register_span(Region::Creg, &[0x5A; CREG_WIRE_LEN - 2]);
        t.transfer_region(Region::Creg, &payload.creg).unwrap();

        let dummy = t.bus_mut();
        assert_eq!(dummy.region_data(Region::Creg), payload.creg.as_slice());
        // one rejected whole-payload attempt, then 32 + 32 + 2 bytes
        let attempts: Vec<usize> = dummy
            .writes()
            .iter()
            .filter(|(_, data)| data.len() > 2)
            .map(|(_, data)| data.len())
            .collect();
        assert_eq!(attempts, vec![3, 66, 32, 32, 2]);
    }

    #[test]
    fn test_status_block_round_trip() {
        let mut t = target(DummyFxcore::new_default());
        t.enter_programming_mode().unwrap();
        let status = t.read_status().unwrap().expect("status should be meaningful");
        assert_eq!(status.device_id, 0x0A10);
        assert_eq!(status.serial_number, 0x0012_3456);
    }

    #[test]
    fn test_status_reads_garbage_while_running() {
        let mut t = target(DummyFxcore::new_default());
        t.enter_programming_mode().unwrap();
        t.execute_from_ram().unwrap();
        assert!(t.running());
        assert_eq!(t.read_status().unwrap(), None);

        t.return_to_idle().unwrap();
        assert!(t.read_status().unwrap().is_some());
    }
}
