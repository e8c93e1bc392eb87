//! Unified error types for the charger firmware.
//!
//! Every fallible operation funnels into [`Error`] so the Sequencer's
//! per-iteration handling stays uniform.  All variants are `Copy` so they
//! can be passed through the state machine and supervisor without
//! allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Error {
    /// A charge fault latched by the state machine or the safety supervisor.
    Fault(SafetyFault),
    /// A duty-cycle write outside `[0, 1]` was rejected.
    Bounds(BoundsViolation),
    /// The status display could not render a frame.
    Display(DisplayError),
    /// Configuration is invalid or could not be parsed.
    Config(&'static str),
    /// Peripheral initialisation failed.
    Init(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fault(e) => write!(f, "fault: {e}"),
            Self::Bounds(e) => write!(f, "duty: {e}"),
            Self::Display(e) => write!(f, "display: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
        }
    }
}

impl core::error::Error for Error {}

// ---------------------------------------------------------------------------
// Safety faults
// ---------------------------------------------------------------------------

/// Charge faults are terminal for the run: they route the state machine to
/// `Error` with the charge output disabled.  They are accumulated in a
/// bitfield so the Error screen can report every cause at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SafetyFault {
    /// Terminal voltage below the minimum valid threshold: no cell, or a
    /// broken connection.
    BatteryMissing = 0b0000_0001,
    /// Terminal voltage above the alarm threshold while charging.
    OverVoltage = 0b0000_0010,
    /// Charge current above the hard limit while charging.
    OverCurrent = 0b0000_0100,
}

impl SafetyFault {
    pub const ALL: [Self; 3] = [Self::BatteryMissing, Self::OverVoltage, Self::OverCurrent];

    /// Return the bitmask for this fault.
    pub const fn mask(self) -> u8 {
        self as u8
    }

    /// First fault whose bit is set in `flags`, in declaration order.
    pub fn first_in(flags: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|f| flags & f.mask() != 0)
    }
}

impl fmt::Display for SafetyFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BatteryMissing => write!(f, "battery missing"),
            Self::OverVoltage => write!(f, "over voltage"),
            Self::OverCurrent => write!(f, "over current"),
        }
    }
}

impl From<SafetyFault> for Error {
    fn from(e: SafetyFault) -> Self {
        Self::Fault(e)
    }
}

// ---------------------------------------------------------------------------
// Duty bounds
// ---------------------------------------------------------------------------

/// A duty-cycle write outside `[0, 1]`.  The previous duty is retained.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundsViolation {
    pub requested: f64,
}

impl fmt::Display for BoundsViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "requested duty {} outside [0, 1]", self.requested)
    }
}

impl From<BoundsViolation> for Error {
    fn from(e: BoundsViolation) -> Self {
        Self::Bounds(e)
    }
}

// ---------------------------------------------------------------------------
// Display errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayError {
    /// The panel did not acknowledge the frame.
    NotReady,
    /// A line did not fit the frame buffer.
    Overflow,
}

impl fmt::Display for DisplayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotReady => write!(f, "panel not ready"),
            Self::Overflow => write!(f, "frame overflow"),
        }
    }
}

impl From<DisplayError> for Error {
    fn from(e: DisplayError) -> Self {
        Self::Display(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_are_distinct_bits() {
        let mut seen = 0u8;
        for f in SafetyFault::ALL {
            assert_eq!(f.mask().count_ones(), 1);
            assert_eq!(seen & f.mask(), 0);
            seen |= f.mask();
        }
    }

    #[test]
    fn first_in_follows_declaration_order() {
        let flags = SafetyFault::OverCurrent.mask() | SafetyFault::OverVoltage.mask();
        assert_eq!(SafetyFault::first_in(flags), Some(SafetyFault::OverVoltage));
        assert_eq!(SafetyFault::first_in(0), None);
    }

    #[test]
    fn display_wraps_inner_error() {
        let e: Error = BoundsViolation { requested: 1.5 }.into();
        assert_eq!(e.to_string(), "duty: requested duty 1.5 outside [0, 1]");
        let e: Error = SafetyFault::BatteryMissing.into();
        assert_eq!(e.to_string(), "fault: battery missing");
    }
}
