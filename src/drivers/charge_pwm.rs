//! Charge-path PWM driver.
//!
//! Turns the controller's `[0, 1]` duty into LEDC ticks.  Generic over
//! [`SetDutyCycle`] so it runs against a recording mock on the host.
//!
//! The driver is a dumb actuator: bounds are enforced by the duty
//! controller upstream.  Anything outside `[0, 1]` that still reaches it is
//! clamped, and NaN is treated as off.

use embedded_hal::pwm::{Error as _, SetDutyCycle};
use log::warn;

pub struct ChargePwm<P: SetDutyCycle> {
    pwm: P,
    ticks: u16,
}

impl<P: SetDutyCycle> ChargePwm<P> {
    /// Wrap `pwm` and drive it to 0 %.
    pub fn new(pwm: P) -> Self {
        let mut this = Self {
            pwm,
            ticks: 0,
        };
        this.write_ticks(0);
        this
    }

    pub fn set(&mut self, duty: f32) {
        let duty = if duty.is_nan() { 0.0 } else { duty.clamp(0.0, 1.0) };
        let max = self.pwm.max_duty_cycle();
        let ticks = (duty * f32::from(max)).round() as u16;
        if ticks != self.ticks {
            self.write_ticks(ticks);
        }
    }

    #[cfg(test)]
    pub fn ticks(&self) -> u16 {
        self.ticks
    }

    fn write_ticks(&mut self, ticks: u16) {
        match self.pwm.set_duty_cycle(ticks) {
            Ok(()) => self.ticks = ticks,
            Err(e) => warn!("charge PWM: duty write failed ({:?})", e.kind()),
        }
    }
}
