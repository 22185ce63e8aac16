//! The programming sequence
//!
//! One run per attempt: enter programming mode, transfer the regions in
//! the order the target requires (CREG, MREG, SFR, then PROGRAM last),
//! then execute from RAM or commit to a flash slot. Empty regions are
//! skipped. Any failure aborts the rest and runs best-effort cleanup
//! (return-to-idle plus mode exit) so the target is never left in
//! programming mode; flash-mode runs clean up even on success.
//!
//! Both trigger sources (hex file and bridge) funnel through this one
//! function, which is what keeps their bus traffic byte-identical.

use maybe_async::maybe_async;

use crate::bus::BusMaster;
use crate::error::{Error, Result};
use crate::payload::{ProgrammingPayload, Region};
use crate::protocol::Target;
use crate::status::{StatusEvent, StatusSink};

/// What to do with the payload once it is uploaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramAction {
    /// Run the program from RAM; the target keeps executing after the
    /// sequence returns and the running flag stays set
    ExecuteFromRam,
    /// Commit the program to the given flash slot (0-15)
    WriteFlash(u8),
}

/// Fixed transfer order; PROGRAM must be last, the target's internal
/// state depends on it.
const REGION_ORDER: [Region; 4] = [Region::Creg, Region::Mreg, Region::Sfr, Region::Program];

/// Pause between sequence stages
const STAGE_DELAY_US: u32 = 100_000;

/// Run one complete programming attempt.
#[maybe_async]
pub async fn run_programming<M: BusMaster, S: StatusSink>(
    target: &mut Target<M, S>,
    payload: &ProgrammingPayload,
    action: ProgramAction,
) -> Result<()> {
    match action {
        ProgramAction::ExecuteFromRam => {
            log::info!("starting RAM upload");
            target.sink_mut().event(StatusEvent::RamUpload);
        }
        ProgramAction::WriteFlash(location) => {
            log::info!("starting flash programming to slot {:X}", location);
            target.sink_mut().event(StatusEvent::FlashWrite);
        }
    }

    target.delay_us(STAGE_DELAY_US).await;
    if target.enter_programming_mode().await.is_err() {
        // Never entered, so there is nothing to clean up.
        log::error!("failed to enter programming mode");
        return Err(Error::ProgrammingAborted);
    }
    target.delay_us(STAGE_DELAY_US).await;

    let mut failure = None;
    for region in REGION_ORDER {
        let wire = payload.region_wire(region);
        if wire.is_empty() {
            log::debug!("{} empty, skipped", region);
            continue;
        }
        if let Err(e) = target.transfer_region(region, wire).await {
            failure = Some(e);
            break;
        }
        log_stage_status(target, region).await;
        target.delay_us(STAGE_DELAY_US).await;
    }

    if failure.is_none() {
        match action {
            ProgramAction::ExecuteFromRam => match target.execute_from_ram().await {
                Ok(()) => {
                    // The target keeps running; no cleanup, and the
                    // periodic running indication is now the caller's.
                    target.sink_mut().event(StatusEvent::Running);
                    log::info!("program is running from RAM");
                    return Ok(());
                }
                Err(e) => failure = Some(e),
            },
            ProgramAction::WriteFlash(location) => match target.write_to_flash(location).await {
                Ok(()) => {
                    let _ = target.return_to_idle().await;
                    target.delay_us(STAGE_DELAY_US).await;
                    let _ = target.exit_programming_mode().await;
                    target.sink_mut().event(StatusEvent::Success);
                    log::info!("program written to flash slot {:X}", location);
                    return Ok(());
                }
                Err(e) => failure = Some(e),
            },
        }
    }

    // Failure path: the target must not stay in programming mode.
    if let Some(error) = failure {
        log::error!("programming aborted: {}", error);
    }
    let _ = target.return_to_idle().await;
    let _ = target.exit_programming_mode().await;
    Err(Error::ProgrammingAborted)
}

/// Post-stage status read, diagnostics only.
#[maybe_async]
async fn log_stage_status<M: BusMaster, S: StatusSink>(target: &mut Target<M, S>, region: Region) {
    match target.read_status().await {
        Ok(Some(status)) => log::debug!("after {} transfer: {}", region, status),
        Ok(None) => {}
        Err(_) => log::debug!("status read failed after {} transfer", region),
    }
}
