//! Status sink
//!
//! Programming progress is surfaced through a single RGB indicator. The
//! core only emits semantic events; rendering is one fixed color/blink
//! mapping with no logic of its own, so sinks stay trivial (an LED
//! driver on hardware, a logger on a host).

/// Semantic indicator events emitted by the protocol and sequence layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusEvent {
    /// Nothing in flight
    Idle,
    /// A HID report was handled
    BridgeActivity,
    /// RAM upload attempt started
    RamUpload,
    /// Flash programming attempt started
    FlashWrite,
    /// Attempt finished successfully
    Success,
    /// Attempt failed
    Error,
    /// Program executing from RAM; re-emitted on a fixed interval by
    /// whoever owns the control loop
    Running,
}

/// Receives status events. Implementations must not block for long;
/// they run inside the control loop.
pub trait StatusSink {
    /// Render one event.
    fn event(&mut self, event: StatusEvent);
}

/// Sink that drops every event (tests, headless use).
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl StatusSink for NullSink {
    fn event(&mut self, _event: StatusEvent) {}
}

/// An RGB color triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

/// Indicator off
pub const OFF: Rgb = Rgb(0, 0, 0);
/// Running / error color
pub const RED: Rgb = Rgb(255, 0, 0);
/// Success color
pub const GREEN: Rgb = Rgb(0, 255, 0);
/// RAM upload color
pub const BLUE: Rgb = Rgb(0, 0, 255);
/// Bridge activity color
pub const YELLOW: Rgb = Rgb(255, 255, 0);
/// Flash programming color
pub const PURPLE: Rgb = Rgb(255, 0, 255);

/// How an event is rendered: a color shown solid (`blinks == 0`) or
/// flashed the given number of times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pattern {
    /// Color to show
    pub color: Rgb,
    /// Number of flashes, 0 for solid
    pub blinks: u8,
}

impl StatusEvent {
    /// The fixed rendering for this event.
    pub fn pattern(self) -> Pattern {
        let (color, blinks) = match self {
            StatusEvent::Idle => (OFF, 0),
            StatusEvent::BridgeActivity => (YELLOW, 1),
            StatusEvent::RamUpload => (BLUE, 2),
            StatusEvent::FlashWrite => (PURPLE, 2),
            StatusEvent::Success => (GREEN, 0),
            StatusEvent::Error => (RED, 5),
            StatusEvent::Running => (RED, 0),
        };
        Pattern { color, blinks }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_and_success_patterns() {
        assert_eq!(StatusEvent::Error.pattern(), Pattern { color: RED, blinks: 5 });
        assert_eq!(
            StatusEvent::Success.pattern(),
            Pattern {
                color: GREEN,
                blinks: 0
            }
        );
        assert_eq!(StatusEvent::Idle.pattern().color, OFF);
    }
}
