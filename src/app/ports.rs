//! Port traits: the boundary between charge logic and the board.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ Sequencer (domain)
//! ```
//!
//! The [`Sequencer`](super::sequencer::Sequencer) consumes these through
//! generics, so the state machine never touches hardware directly.  On the
//! target they are all implemented by
//! [`HardwareAdapter`](crate::adapters::hardware::HardwareAdapter); host
//! tests substitute a simulated battery plant.
//!
//! Sleeping is not a port of its own: the Sequencer yields through
//! [`embedded_hal::delay::DelayNs`].

use crate::error::DisplayError;

// ───────────────────────────────────────────────────────────────
// Analog input (hardware → domain)
// ───────────────────────────────────────────────────────────────

/// The two sense inputs of the shared analog front end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnalogChannel {
    /// Battery voltage through the resistive divider.
    VoltageSense,
    /// Drop across the low-side sense resistor.
    CurrentSense,
}

pub trait AnalogPort {
    /// One sample, normalised to `[0, 1]` of the ADC reference.
    fn read_channel(&mut self, channel: AnalogChannel) -> f32;
}

// ───────────────────────────────────────────────────────────────
// Actuators (domain → hardware)
// ───────────────────────────────────────────────────────────────

pub trait ActuatorPort {
    /// Drive the charge-path PWM at `duty` (`[0, 1]`).
    fn set_charge_output(&mut self, duty: f32);

    /// Relay position: `false` routes slot 0, `true` routes slot 1.
    fn set_relay(&mut self, energised: bool);
}

// ───────────────────────────────────────────────────────────────
// Indicators
// ───────────────────────────────────────────────────────────────

/// Per-slot indicator LEDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorId {
    Led1,
    Led2,
}

impl IndicatorId {
    pub const fn index(self) -> usize {
        match self {
            Self::Led1 => 0,
            Self::Led2 => 1,
        }
    }
}

/// Written from both the Sequencer and the blink timer callback, hence
/// `&self`: implementations use interior mutability.
pub trait IndicatorPort {
    fn set_indicator(&self, id: IndicatorId, on: bool);
}

// ───────────────────────────────────────────────────────────────
// Status display
// ───────────────────────────────────────────────────────────────

pub trait DisplayPort {
    /// Replace the screen with `lines`.
    fn render_status(&mut self, lines: &[&str]) -> Result<(), DisplayError>;
}

// ───────────────────────────────────────────────────────────────
// Liveness
// ───────────────────────────────────────────────────────────────

pub trait WatchdogPort {
    /// Arm the hardware watchdog for the calling task.
    fn arm(&mut self, timeout_ms: u32);

    /// Feed the watchdog.
    fn reset(&mut self);
}

/// Periodic timer that drives the indicator blink callback.
pub trait TimerPort {
    fn schedule_periodic(&mut self, period_ms: u32);

    /// Change the period; `None` stops the timer.
    fn reschedule_periodic(&mut self, period_ms: Option<u32>);
}

// ───────────────────────────────────────────────────────────────
// Aggregate
// ───────────────────────────────────────────────────────────────

/// Everything the Sequencer needs from the board.
pub trait ChargerHardware:
    AnalogPort + ActuatorPort + IndicatorPort + DisplayPort + WatchdogPort + TimerPort
{
}

impl<T> ChargerHardware for T where
    T: AnalogPort + ActuatorPort + IndicatorPort + DisplayPort + WatchdogPort + TimerPort
{
}
