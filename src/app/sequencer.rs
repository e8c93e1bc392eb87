//! Sequencer: the cooperative main loop.
//!
//! [`Sequencer`] owns the phase engine, the charge context, the measurement
//! unit and the safety supervisor.  All I/O goes through the port traits,
//! so the whole loop runs on the host against a simulated battery.
//!
//! ```text
//!  AnalogPort ──▶ ┌──────────────────────────────┐ ──▶ ActuatorPort
//!                 │          Sequencer           │ ──▶ IndicatorPort
//! WatchdogPort ◀──│  Measure · Safety · FSM      │ ──▶ DisplayPort
//!                 └──────────────────────────────┘ ──▶ TimerPort
//! ```
//!
//! One iteration is strictly ordered: feed the watchdog, measure, check
//! limits, evaluate the phase, apply outputs.  Nothing in an iteration
//! returns an error; the only way out of the loop is a watchdog reset.

use embedded_hal::delay::DelayNs;
use log::{info, warn};

use crate::config::ChargerConfig;
use crate::error::Result;
use crate::fsm::context::{BlinkCommand, ChargeCommands, ChargeContext, StatusScreen, STATUS_LINES};
use crate::fsm::{ChargePhase, Fsm};
use crate::indicator::{IndicatorSnapshot, IndicatorState};
use crate::safety::SafetySupervisor;
use crate::sensors::{MeasurementUnit, Slot};

use super::ports::{ChargerHardware, DisplayPort, IndicatorId};

pub struct Sequencer<'a> {
    fsm: Fsm,
    ctx: ChargeContext,
    measurement: MeasurementUnit,
    safety: SafetySupervisor,
    indicator: &'a IndicatorState,
    /// Blink period currently programmed into the timer.
    blink_period: Option<u32>,
}

impl<'a> Sequencer<'a> {
    /// Build the loop from a validated configuration.  Does not touch
    /// hardware; call [`start`](Self::start) next.
    pub fn new(config: ChargerConfig, indicator: &'a IndicatorState) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            fsm: Fsm::default(),
            measurement: MeasurementUnit::new(config.calibration),
            safety: SafetySupervisor::new(&config),
            ctx: ChargeContext::new(config),
            indicator,
            blink_period: None,
        })
    }

    /// Arm the watchdog, put the outputs in a safe state and enter
    /// `CheckFault` for slot 0.
    pub fn start(&mut self, hw: &mut impl ChargerHardware) {
        let timing = self.ctx.config.timing;
        hw.arm(timing.watchdog_timeout_ms);
        hw.set_charge_output(0.0);
        hw.set_relay(false);

        self.blink_period = Some(timing.blink_slow_ms);
        self.publish_indicator();
        hw.schedule_periodic(timing.blink_slow_ms);

        self.fsm.start(&mut self.ctx);
        info!(
            "sequencer started (watchdog {} ms, loop {} ms, top-off {})",
            timing.watchdog_timeout_ms,
            timing.loop_interval_ms,
            if self.ctx.config.top_off_enabled { "on" } else { "off" }
        );
    }

    /// Run one iteration and return how long to wait before the next.
    pub fn iterate(&mut self, hw: &mut impl ChargerHardware) -> u32 {
        // 1. Liveness
        hw.reset();

        // 2. Measure the active slot
        let slot = self.ctx.active;
        let reading = self.measurement.measure(hw, slot);
        self.ctx.record(reading);

        // 3. Hard limits
        let charging = self.fsm.current_phase().is_charging();
        let new_faults = self.safety.evaluate(reading, charging, self.ctx.fault_flags);
        if new_faults != 0 {
            warn!("Safety fault! flags=0b{:08b}", new_faults);
            self.ctx.fault_flags |= new_faults;
            self.ctx.duty.off();
            self.fsm.force_transition(ChargePhase::Error, &mut self.ctx);
        }

        // 4. Decide
        let decision = self.fsm.tick(&mut self.ctx);

        // 5. Apply
        self.apply(hw, slot);

        decision.delay_ms
    }

    /// Loop forever.
    pub fn run(&mut self, hw: &mut impl ChargerHardware, delay: &mut impl DelayNs) -> ! {
        loop {
            let ms = self.iterate(hw);
            delay.delay_ms(ms);
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn phase(&self) -> ChargePhase {
        self.fsm.current_phase()
    }

    pub fn active_slot(&self) -> Slot {
        self.ctx.active
    }

    pub fn duty(&self) -> f64 {
        self.ctx.duty.current_duty()
    }

    pub fn fault_flags(&self) -> u8 {
        self.ctx.fault_flags
    }

    pub fn blink_period(&self) -> Option<u32> {
        self.blink_period
    }

    // ── Internal ──────────────────────────────────────────────

    fn apply(&mut self, hw: &mut impl ChargerHardware, measured_slot: Slot) {
        hw.set_charge_output(self.ctx.duty.current_duty() as f32);

        let cmds = core::mem::replace(
            &mut self.ctx.commands,
            ChargeCommands::idle(self.ctx.config.timing.loop_interval_ms),
        );

        // The timer must see the new slot before any latch is written, or
        // it can blink over a freshly latched LED.
        let period = match cmds.blink {
            Some(BlinkCommand::Every(ms)) => Some(ms),
            Some(BlinkCommand::Off) => None,
            None => self.blink_period,
        };
        let period_changed = period != self.blink_period;
        self.blink_period = period;
        if period_changed || self.ctx.active != measured_slot {
            self.publish_indicator();
        }
        if period_changed {
            hw.reschedule_periodic(period);
        }

        if let Some(on) = cmds.relay {
            hw.set_relay(on);
        }
        for (id, latch) in [IndicatorId::Led1, IndicatorId::Led2].into_iter().zip(cmds.latch) {
            if let Some(on) = latch {
                hw.set_indicator(id, on);
            }
        }

        if let Some(screen) = cmds.screen {
            render(hw, &screen);
        }
    }

    fn publish_indicator(&self) {
        let period_ms = self
            .blink_period
            .map(|ms| u16::try_from(ms).unwrap_or(u16::MAX));
        self.indicator
            .publish(IndicatorSnapshot::new(self.ctx.active, period_ms));
    }
}

/// Render a frame.  The display is observational; failures are logged and
/// dropped.
fn render(display: &mut impl DisplayPort, screen: &StatusScreen) {
    let mut lines: heapless::Vec<&str, STATUS_LINES> =
        heapless::Vec::new();
    for line in screen.lines() {
        let _ = lines.push(line);
    }
    if let Err(e) = display.render_status(&lines) {
        warn!("status display: {e}");
    }
}
