//! Programmer backend registry
//!
//! The real bus primitives come from whatever environment hosts the
//! bridge; on a developer machine only the in-memory emulator is
//! available, which is still enough to validate hex files end to end.

use fxbridge_core::bus::BusMaster;
use fxbridge_dummy::DummyFxcore;

/// Information about a programmer backend
pub struct ProgrammerInfo {
    /// Name used to select the backend
    pub name: &'static str,
    /// One-line description
    pub description: &'static str,
}

/// All registered backends
pub const PROGRAMMERS: &[ProgrammerInfo] = &[ProgrammerInfo {
    name: "dummy",
    description: "In-memory FXCore emulator (no hardware required)",
}];

/// Comma-separated backend names for help text
pub fn programmer_names_short() -> String {
    PROGRAMMERS
        .iter()
        .map(|p| p.name)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Instantiate a backend by name
pub fn create(name: &str) -> Result<Box<dyn BusMaster + Send>, String> {
    match name {
        "dummy" => Ok(Box::new(DummyFxcore::new_default())),
        other => Err(format!(
            "unknown programmer '{}' (available: {})",
            other,
            programmer_names_short()
        )),
    }
}
