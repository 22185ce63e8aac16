//! Trigger-file control loop
//!
//! The original deployment drops hex files onto a small disk: a file
//! named `output.hex` means "run this from RAM until the file goes
//! away", and `0.hex` through `F.hex` mean "store this in that flash
//! location". This command polls a directory for the same triggers and
//! drives the shared programming sequence.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use fxbridge_core::bus::BusMaster;
use fxbridge_core::hex;
use fxbridge_core::protocol::Target;
use fxbridge_core::sequence::{run_programming, ProgramAction};
use fxbridge_core::status::{StatusEvent, StatusSink};

use super::{CommandError, LogSink};
use crate::programmers;

/// File whose presence starts RAM execution and whose removal stops it
const RAM_TRIGGER: &str = "OUTPUT.HEX";
/// Wall-clock interval of the running indicator pulse
const RUNNING_PULSE: Duration = Duration::from_millis(500);

/// Trigger files found in one scan of the watch directory.
#[derive(Debug, Default)]
pub struct Triggers {
    /// `output.hex` with nonempty content
    pub ram: Option<PathBuf>,
    /// `0.hex`-`F.hex` with nonempty content, sorted by location
    pub locations: Vec<(u8, PathBuf, SystemTime)>,
}

/// One scan of the directory for trigger files. Names are matched
/// case-insensitively; empty files don't count.
pub fn scan_triggers(dir: &Path) -> Result<Triggers, CommandError> {
    let mut triggers = Triggers::default();
    let entries = fs::read_dir(dir).map_err(|source| CommandError::ScanDir {
        path: dir.to_path_buf(),
        source,
    })?;

    for entry in entries.flatten() {
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let name = name.to_ascii_uppercase();
        if name == RAM_TRIGGER {
            if has_content(&path) {
                triggers.ram = Some(path);
            }
            continue;
        }
        let Some(stem) = name.strip_suffix(".HEX") else {
            continue;
        };
        if stem.len() != 1 {
            continue;
        }
        let Ok(location) = u8::from_str_radix(stem, 16) else {
            continue;
        };
        if has_content(&path) {
            let modified = entry
                .metadata()
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            triggers.locations.push((location, path, modified));
        }
    }
    triggers.locations.sort_by_key(|&(location, _, _)| location);
    Ok(triggers)
}

fn has_content(path: &Path) -> bool {
    fs::read_to_string(path)
        .map(|c| !c.trim().is_empty())
        .unwrap_or(false)
}

/// Poll `dir` forever and act on trigger-file changes.
pub fn run(programmer: &str, dir: &Path, interval_ms: u64) -> Result<(), CommandError> {
    let bus = programmers::create(programmer).map_err(CommandError::Backend)?;
    let mut target = Target::new(bus, LogSink);

    // what was last programmed per location, keyed by file mtime
    let mut programmed: HashMap<u8, SystemTime> = HashMap::new();
    let mut idle_ensured = 0u8;
    let mut last_pulse = Instant::now();

    log::info!(
        "watching {} ({} for RAM execution, 0.hex-F.hex for flash)",
        dir.display(),
        RAM_TRIGGER.to_ascii_lowercase()
    );

    // the target may still be running from a previous session
    ensure_idle(&mut target);

    loop {
        match scan_triggers(dir) {
            Err(e) => log::warn!("{}", e),
            Ok(triggers) => {
                for &(location, ref path, modified) in &triggers.locations {
                    if programmed.get(&location) == Some(&modified) {
                        continue;
                    }
                    log::info!("{} -> flash location {:X}", path.display(), location);
                    if let Err(e) =
                        program_file(&mut target, path, ProgramAction::WriteFlash(location))
                    {
                        log::error!("programming location {:X} failed: {}", location, e);
                    }
                    // either way, don't retry the same file every poll
                    programmed.insert(location, modified);
                }

                match (&triggers.ram, target.running()) {
                    (Some(path), false) => {
                        log::info!("{} found, starting RAM execution", path.display());
                        if let Err(e) =
                            program_file(&mut target, path, ProgramAction::ExecuteFromRam)
                        {
                            log::error!("RAM execution failed: {}", e);
                        }
                        last_pulse = Instant::now();
                        idle_ensured = 0;
                    }
                    (None, true) => {
                        log::info!("trigger removed, stopping execution");
                        ensure_idle(&mut target);
                        idle_ensured = 0;
                    }
                    (Some(_), true) => {
                        // advance the running indicator on a fixed
                        // wall-clock interval, not every poll
                        if last_pulse.elapsed() >= RUNNING_PULSE {
                            target.sink_mut().event(StatusEvent::Running);
                            last_pulse = Instant::now();
                        }
                    }
                    (None, false) => {
                        if triggers.locations.is_empty() && idle_ensured < 2 {
                            ensure_idle(&mut target);
                            idle_ensured += 1;
                        }
                    }
                }
            }
        }

        std::thread::sleep(Duration::from_millis(interval_ms));
    }
}

fn program_file<M: BusMaster>(
    target: &mut Target<M, LogSink>,
    path: &Path,
    action: ProgramAction,
) -> Result<(), CommandError> {
    let content = fs::read_to_string(path).map_err(|source| CommandError::ReadInput {
        path: path.to_path_buf(),
        source,
    })?;
    let payload = hex::parse_payload(&content)?;
    run_programming(target, &payload, action)?;
    Ok(())
}

/// Best-effort stop: return to STATE0 and leave programming mode.
fn ensure_idle<M: BusMaster>(target: &mut Target<M, LogSink>) {
    let _ = target.return_to_idle();
    let _ = target.exit_programming_mode();
    target.sink_mut().event(StatusEvent::Idle);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;

    fn temp_watch_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("fxbridge-watch-{}-{}", tag, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_file(dir: &Path, name: &str, content: &str) {
        let mut f = File::create(dir.join(name)).unwrap();
        f.write_all(content.as_bytes()).unwrap();
    }

    #[test]
    fn test_scan_finds_triggers() {
        let dir = temp_watch_dir("scan");
        write_file(&dir, "output.hex", ":00000001FF\n");
        write_file(&dir, "3.hex", ":00000001FF\n");
        write_file(&dir, "a.hex", ":00000001FF\n");
        write_file(&dir, "readme.txt", "not a trigger");
        write_file(&dir, "10.hex", ":00000001FF\n"); // two digits: not a location
        write_file(&dir, "5.hex", "   \n"); // empty: ignored

        let triggers = scan_triggers(&dir).unwrap();
        assert!(triggers.ram.is_some());
        let locations: Vec<u8> = triggers.locations.iter().map(|&(l, _, _)| l).collect();
        assert_eq!(locations, vec![0x3, 0xA]);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_scan_detects_removal() {
        let dir = temp_watch_dir("removal");
        write_file(&dir, "output.hex", ":00000001FF\n");
        assert!(scan_triggers(&dir).unwrap().ram.is_some());

        fs::remove_file(dir.join("output.hex")).unwrap();
        assert!(scan_triggers(&dir).unwrap().ram.is_none());

        let _ = fs::remove_dir_all(&dir);
    }
}
