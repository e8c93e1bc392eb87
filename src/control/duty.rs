//! Duty-cycle controller for the charge path.
//!
//! Integrating controller: every regulation decision nudges the duty by a
//! fixed 0.1 % step.  The electrochemical response of a cell is slow
//! compared with the loop rate, so small steps settle without overshoot.
//!
//! The controller owns the only copy of the duty value.  It never leaves
//! `[0.0, 1.0]`; writes outside that range are rejected and the previous
//! value is kept.

use core::fmt::Write;

use log::debug;

use crate::error::BoundsViolation;

/// Fixed regulation step (fraction of full scale).
pub const DUTY_STEP: f64 = 0.001;

/// Human-readable duty string, e.g. `"PWM DC= 437‰"`.
pub type DutyLabel = heapless::String<24>;

/// Bounded duty-cycle accumulator.
#[derive(Debug, Clone, Default)]
pub struct DutyController {
    duty: f64,
}

impl DutyController {
    /// New controller with the output off.
    pub fn new() -> Self {
        Self { duty: 0.0 }
    }

    /// Set the duty, rejecting anything outside `[0, 1]` (including NaN).
    pub fn try_set_duty(&mut self, duty: f64) -> Result<(), BoundsViolation> {
        if !(0.0..=1.0).contains(&duty) {
            return Err(BoundsViolation { requested: duty });
        }
        self.duty = duty;
        debug!("DC={:.3}", duty);
        Ok(())
    }

    /// Set the duty; `false` means the write was rejected.
    pub fn set_duty(&mut self, duty: f64) -> bool {
        self.try_set_duty(duty).is_ok()
    }

    /// Step up by [`DUTY_STEP`].  `false` when already saturated.
    pub fn increment(&mut self) -> bool {
        self.set_duty(self.duty + DUTY_STEP)
    }

    /// Step down by [`DUTY_STEP`].  `false` when already at zero.
    pub fn decrement(&mut self) -> bool {
        self.set_duty(self.duty - DUTY_STEP)
    }

    /// Step up when `increase` is true, down otherwise.
    pub fn step_toward(&mut self, increase: bool) -> bool {
        if increase {
            self.increment()
        } else {
            self.decrement()
        }
    }

    /// Turn the output off.
    pub fn off(&mut self) {
        self.duty = 0.0;
        debug!("DC=0.000");
    }

    pub fn current_duty(&self) -> f64 {
        self.duty
    }

    /// Duty in whole per-mille (truncated), for the status display.
    pub fn describe(&self) -> DutyLabel {
        let mut s = DutyLabel::new();
        let _ = write!(s, "PWM DC= {}\u{2030}", (self.duty * 1000.0) as i32);
        s
    }
}
