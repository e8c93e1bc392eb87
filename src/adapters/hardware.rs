//! Hardware adapter: bridges the board peripherals to the port traits.
//!
//! Owns every driver and exposes them through the ports the
//! [`Sequencer`](crate::app::Sequencer) consumes.  This is the only module
//! in the system that touches actual hardware.  On non-espidf targets the
//! underlying drivers use cfg-gated simulation stubs.

use crate::app::ports::{
    ActuatorPort, AnalogChannel, AnalogPort, DisplayPort, IndicatorId, IndicatorPort, TimerPort,
    WatchdogPort,
};
use crate::drivers::charge_pwm::ChargePwm;
use crate::drivers::hw_init::{self, GpioOutput, LedcChannel};
use crate::drivers::hw_timer::{BlinkBinding, IndicatorTimer};
use crate::drivers::relay::RelayDriver;
use crate::drivers::status_display::ConsoleDisplay;
use crate::drivers::watchdog::Watchdog;
use crate::error::DisplayError;
use crate::pins;

pub struct HardwareAdapter {
    charge: ChargePwm<LedcChannel>,
    relay: RelayDriver<GpioOutput>,
    display: ConsoleDisplay,
    watchdog: Watchdog,
    timer: IndicatorTimer,
}

impl HardwareAdapter {
    /// Assemble the board.  Peripherals must already be configured by
    /// [`hw_init::init_peripherals`].
    pub fn new(binding: &'static BlinkBinding) -> Self {
        binding.leds.all_off();
        Self {
            charge: ChargePwm::new(LedcChannel::charge()),
            relay: RelayDriver::new(GpioOutput::relay()),
            display: ConsoleDisplay::new(),
            watchdog: Watchdog::new(),
            timer: IndicatorTimer::new(binding),
        }
    }

    pub fn charge(&self) -> &ChargePwm<LedcChannel> {
        &self.charge
    }

    pub fn relay(&self) -> &RelayDriver<GpioOutput> {
        &self.relay
    }

    pub fn display(&self) -> &ConsoleDisplay {
        &self.display
    }

    pub fn watchdog(&self) -> &Watchdog {
        &self.watchdog
    }

    pub fn timer(&self) -> &IndicatorTimer {
        &self.timer
    }
}

// ── AnalogPort ────────────────────────────────────────────────

impl AnalogPort for HardwareAdapter {
    fn read_channel(&mut self, channel: AnalogChannel) -> f32 {
        let ch = match channel {
            AnalogChannel::VoltageSense => pins::VSENSE_ADC_CHANNEL,
            AnalogChannel::CurrentSense => pins::ISENSE_ADC_CHANNEL,
        };
        hw_init::adc1_read_normalised(ch)
    }
}

// ── ActuatorPort ──────────────────────────────────────────────

impl ActuatorPort for HardwareAdapter {
    fn set_charge_output(&mut self, duty: f32) {
        self.charge.set(duty);
    }

    fn set_relay(&mut self, energised: bool) {
        self.relay.set(energised);
    }
}

// ── IndicatorPort ─────────────────────────────────────────────

impl IndicatorPort for HardwareAdapter {
    fn set_indicator(&self, id: IndicatorId, on: bool) {
        self.timer.binding().leds.set_indicator(id, on);
    }
}

// ── DisplayPort ───────────────────────────────────────────────

impl DisplayPort for HardwareAdapter {
    fn render_status(&mut self, lines: &[&str]) -> Result<(), DisplayError> {
        self.display.render_status(lines)
    }
}

// ── Liveness ──────────────────────────────────────────────────

impl WatchdogPort for HardwareAdapter {
    fn arm(&mut self, timeout_ms: u32) {
        self.watchdog.arm(timeout_ms);
    }

    fn reset(&mut self) {
        self.watchdog.feed();
    }
}

impl TimerPort for HardwareAdapter {
    fn schedule_periodic(&mut self, period_ms: u32) {
        self.timer.start(period_ms);
    }

    fn reschedule_periodic(&mut self, period_ms: Option<u32>) {
        match period_ms {
            Some(ms) => self.timer.start(ms),
            None => self.timer.stop(),
        }
    }
}
