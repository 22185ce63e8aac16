//! End-to-end programming sequences against the emulated target.

use fxbridge_core::hex;
use fxbridge_core::payload::{ProgrammingPayload, Region};
use fxbridge_core::protocol::{Target, TARGET_ADDR};
use fxbridge_core::sequence::{run_programming, ProgramAction};
use fxbridge_core::status::{NullSink, StatusEvent, StatusSink};
use fxbridge_core::Error;
use fxbridge_dummy::{DummyConfig, DummyFxcore};

/// Sink that records every event for assertions.
#[derive(Default)]
struct RecordingSink(Vec<StatusEvent>);

impl StatusSink for RecordingSink {
    fn event(&mut self, event: StatusEvent) {
        self.0.push(event);
    }
}

fn full_payload() -> ProgrammingPayload {
    let mut payload = ProgrammingPayload::new();
    payload.set_register_span(Region::Creg, &[0x11; 8]);
    payload.set_register_span(Region::Mreg, &[0x22; 16]);
    payload.set_register_span(Region::Sfr, &[0x33; 4]);
    payload.set_instructions(&[0x1122_3344, 0x5566_7788]).unwrap();
    payload
}

#[test]
fn region_order_is_fixed_and_program_is_last() {
    let mut target = Target::new(DummyFxcore::new_default(), NullSink);
    run_programming(&mut target, &full_payload(), ProgramAction::ExecuteFromRam).unwrap();

    let log = target.bus_mut().command_log();
    let opcode_pos = |op: [u8; 2]| log.iter().position(|&o| o == op).unwrap();
    let creg = opcode_pos([0x01, 0x0F]);
    let mreg = opcode_pos([0x04, 0x7F]);
    let sfr = opcode_pos([0x02, 0x0B]);
    let program = opcode_pos([0x08, 0x01]);
    assert!(creg < mreg && mreg < sfr && sfr < program);
    // execute comes after everything
    assert!(program < opcode_pos([0x0D, 0x00]));
}

#[test]
fn empty_regions_are_skipped() {
    let mut payload = ProgrammingPayload::new();
    payload.set_instructions(&[0xDEAD_BEEF]).unwrap();

    let mut target = Target::new(DummyFxcore::new_default(), NullSink);
    run_programming(&mut target, &payload, ProgramAction::ExecuteFromRam).unwrap();

    let log = target.bus_mut().command_log();
    assert!(!log.contains(&[0x01, 0x0F]));
    assert!(!log.contains(&[0x04, 0x7F]));
    assert!(!log.contains(&[0x02, 0x0B]));
    assert!(log.contains(&[0x08, 0x00]));
}

#[test]
fn ram_execution_sets_running_and_skips_cleanup() {
    let mut target = Target::new(DummyFxcore::new_default(), RecordingSink::default());
    run_programming(&mut target, &full_payload(), ProgramAction::ExecuteFromRam).unwrap();

    assert!(target.running());
    assert!(target.bus_mut().running());
    let log = target.bus_mut().command_log();
    assert!(!log.contains(&[0x0E, 0x00]), "no RETURN_0 after RAM success");
    assert!(!log.contains(&[0x5A, 0xA5]), "target keeps running, no mode exit");
    assert!(target.sink_mut().0.contains(&StatusEvent::Running));
}

#[test]
fn flash_write_cleans_up_even_on_success() {
    let mut target = Target::new(DummyFxcore::new_default(), RecordingSink::default());
    run_programming(&mut target, &full_payload(), ProgramAction::WriteFlash(3)).unwrap();

    assert!(!target.running());
    assert_eq!(target.bus_mut().program_slots(), 1 << 3);
    assert!(!target.bus_mut().programming_mode());
    let log = target.bus_mut().command_log();
    let flash = log.iter().position(|&o| o == [0x0C, 0x03]).unwrap();
    let ret = log.iter().position(|&o| o == [0x0E, 0x00]).unwrap();
    let exit = log.iter().position(|&o| o == [0x5A, 0xA5]).unwrap();
    assert!(flash < ret && ret < exit);
    assert!(target.sink_mut().0.contains(&StatusEvent::Success));
}

#[test]
fn transfer_failure_aborts_and_cleans_up() {
    // enter (1 write) + CREG opcode (2nd) succeed, everything after fails
    let dummy = DummyFxcore::new(DummyConfig {
        fail_after_writes: Some(2),
        ..DummyConfig::default()
    });
    let mut target = Target::new(dummy, RecordingSink::default());
    let result = run_programming(&mut target, &full_payload(), ProgramAction::ExecuteFromRam);
    assert_eq!(result, Err(Error::ProgrammingAborted));

    // MREG was never attempted, and cleanup was still issued
    let writes = target.bus_mut().writes().to_vec();
    let frames: Vec<&[u8]> = writes.iter().map(|(_, d)| d.as_slice()).collect();
    assert!(!frames.contains(&[0x04u8, 0x7F].as_slice()));
    let tail: Vec<&[u8]> = frames[frames.len() - 2..].to_vec();
    assert_eq!(tail, vec![&[0x0Eu8, 0x00][..], &[0x5Au8, 0xA5][..]]);
    assert!(target.sink_mut().0.contains(&StatusEvent::Error));
}

#[test]
fn flash_location_checked_after_upload_with_cleanup() {
    let mut target = Target::new(DummyFxcore::new_default(), NullSink);
    let result = run_programming(&mut target, &full_payload(), ProgramAction::WriteFlash(16));
    assert_eq!(result, Err(Error::ProgrammingAborted));
    assert_eq!(target.bus_mut().program_slots(), 0);
    assert!(!target.bus_mut().programming_mode());
}

#[test]
fn hex_file_to_ram_execution() {
    // two instructions at the program base plus their checksum bytes,
    // and a couple of CREG bytes
    let content = "\
:020800001122C3
:0818000044332211887766557C
:02180800640278
:00000001FF
";
    let payload = hex::parse_payload(content).unwrap();
    let mut target = Target::new(DummyFxcore::new_default(), NullSink);
    run_programming(&mut target, &payload, ProgramAction::ExecuteFromRam).unwrap();

    let dummy = target.bus_mut();
    assert!(dummy.running());
    assert_eq!(&dummy.region_data(Region::Creg)[..2], &[0x11, 0x22]);
    let program = dummy.region_data(Region::Program);
    assert_eq!(
        &program[..8],
        &[0x44, 0x33, 0x22, 0x11, 0x88, 0x77, 0x66, 0x55]
    );
    assert_eq!(program.len(), 10);
}

#[test]
fn chunked_fallback_is_transparent_to_the_sequence() {
    let dummy = DummyFxcore::new(DummyConfig {
        max_transfer_len: Some(32),
        ..DummyConfig::default()
    });
    let mut target = Target::new(dummy, NullSink);
    run_programming(&mut target, &full_payload(), ProgramAction::ExecuteFromRam).unwrap();

    // every region still arrived complete
    let dummy = target.bus_mut();
    assert_eq!(dummy.region_data(Region::Creg).len(), 66);
    assert_eq!(dummy.region_data(Region::Mreg).len(), 514);
    assert_eq!(dummy.region_data(Region::Sfr).len(), 50);
    assert_eq!(dummy.region_data(Region::Program).len(), 10);
    assert!(dummy.running());
}
