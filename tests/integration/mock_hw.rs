//! Simulated charger board for integration tests.
//!
//! [`BatteryPlant`] implements every port the Sequencer needs.  It models
//! two cells behind the relay as an open-circuit voltage plus a series
//! resistance, with the charge PWM sourcing a current proportional to duty.
//! Time only advances through [`SimDelay`], which shares a clock with the
//! plant so charge is integrated over exactly the delays the loop asks for.

use std::cell::Cell;
use std::rc::Rc;

use embedded_hal::delay::DelayNs;
use lipo_charger::app::ports::{
    ActuatorPort, AnalogChannel, AnalogPort, DisplayPort, IndicatorId, IndicatorPort, TimerPort,
    WatchdogPort,
};
use lipo_charger::error::DisplayError;

/// Nanoseconds since boot, shared by the plant and the delay.
pub type SimClock = Rc<Cell<u64>>;

// ── Plant model ───────────────────────────────────────────────

/// Full-scale reference of the analog front end (mV).
const VREF_MV: f64 = 3300.0;
/// Divider ratio of the voltage-sense network (10k over 15k).
const DIVIDER_GAIN: f64 = 25.0 / 15.0;

#[derive(Debug, Clone, Copy)]
pub struct SimCell {
    pub present: bool,
    /// Open-circuit voltage (mV).
    pub ocv_mv: f64,
}

impl SimCell {
    pub fn at(ocv_mv: f64) -> Self {
        Self {
            present: true,
            ocv_mv,
        }
    }

    pub fn missing() -> Self {
        Self {
            present: false,
            ocv_mv: 0.0,
        }
    }
}

pub struct BatteryPlant {
    clock: SimClock,
    last_settle_ns: u64,

    pub cells: [SimCell; 2],
    /// Current at 100 % duty (mA).
    pub full_scale_ma: f64,
    /// Series resistance seen by the sense network (ohm).
    pub series_ohm: f64,
    /// OCV rise per mA·s of charge.
    pub mv_per_mas: f64,
    /// Added to the sensed current, for fault injection.
    pub current_offset_ma: f64,

    // ── Outputs observed ──
    pub duty: f32,
    pub duty_writes: u64,
    pub relay: bool,
    pub relay_writes: Vec<bool>,
    pub leds: Cell<[bool; 2]>,
    pub frames: Vec<Vec<String>>,
    pub fail_display: bool,

    // ── Liveness ──
    pub watchdog_timeout_ms: Option<u32>,
    pub feeds: u64,
    last_feed_ns: Option<u64>,
    /// Longest gap between two feeds (ms).
    pub max_feed_gap_ms: u64,

    // ── Blink timer ──
    pub timer_period: Option<u32>,
    pub timer_changes: Vec<Option<u32>>,
}

#[allow(dead_code)]
impl BatteryPlant {
    pub fn new(clock: SimClock, cells: [SimCell; 2]) -> Self {
        Self {
            last_settle_ns: clock.get(),
            clock,
            cells,
            full_scale_ma: 1500.0,
            series_ohm: 1.0,
            mv_per_mas: 0.003,
            current_offset_ma: 0.0,
            duty: 0.0,
            duty_writes: 0,
            relay: false,
            relay_writes: Vec::new(),
            leds: Cell::new([false; 2]),
            frames: Vec::new(),
            fail_display: false,
            watchdog_timeout_ms: None,
            feeds: 0,
            last_feed_ns: None,
            max_feed_gap_ms: 0,
            timer_period: None,
            timer_changes: Vec::new(),
        }
    }

    /// Two partly discharged cells just below the pre-charge ceiling.
    pub fn standard(clock: SimClock) -> Self {
        Self::new(clock, [SimCell::at(2990.0), SimCell::at(2990.0)])
    }

    fn active(&self) -> usize {
        usize::from(self.relay)
    }

    /// Charge current into the routed cell (mA).
    pub fn current_ma(&self) -> f64 {
        if !self.cells[self.active()].present {
            return 0.0;
        }
        f64::from(self.duty) * self.full_scale_ma + self.current_offset_ma
    }

    /// Terminal voltage of the routed cell (mV).
    pub fn terminal_mv(&self) -> f64 {
        let cell = self.cells[self.active()];
        if !cell.present {
            return 0.0;
        }
        cell.ocv_mv + self.current_ma() * self.series_ohm
    }

    /// Integrate charge over the time elapsed since the last call.
    fn settle(&mut self) {
        let now = self.clock.get();
        let dt_s = (now - self.last_settle_ns) as f64 / 1e9;
        self.last_settle_ns = now;
        let i = self.active();
        if self.cells[i].present {
            self.cells[i].ocv_mv += f64::from(self.duty) * self.full_scale_ma * dt_s * self.mv_per_mas;
        }
    }

    pub fn led(&self, id: IndicatorId) -> bool {
        self.leds.get()[id.index()]
    }

    pub fn last_frame(&self) -> Option<&[String]> {
        self.frames.last().map(Vec::as_slice)
    }

    pub fn frame_titles(&self) -> Vec<&str> {
        self.frames
            .iter()
            .filter_map(|f| f.first().map(String::as_str))
            .collect()
    }
}

// ── Ports ─────────────────────────────────────────────────────

impl AnalogPort for BatteryPlant {
    fn read_channel(&mut self, channel: AnalogChannel) -> f32 {
        self.settle();
        let i = self.current_ma();
        let sample = match channel {
            AnalogChannel::CurrentSense => i / VREF_MV,
            AnalogChannel::VoltageSense => (self.terminal_mv() + i) / DIVIDER_GAIN / VREF_MV,
        };
        sample.clamp(0.0, 1.0) as f32
    }
}

impl ActuatorPort for BatteryPlant {
    fn set_charge_output(&mut self, duty: f32) {
        self.settle();
        assert!((0.0..=1.0).contains(&duty), "charge output out of range: {duty}");
        self.duty = duty;
        self.duty_writes += 1;
    }

    fn set_relay(&mut self, energised: bool) {
        self.settle();
        self.relay = energised;
        self.relay_writes.push(energised);
    }
}

impl IndicatorPort for BatteryPlant {
    fn set_indicator(&self, id: IndicatorId, on: bool) {
        let mut leds = self.leds.get();
        leds[id.index()] = on;
        self.leds.set(leds);
    }
}

impl DisplayPort for BatteryPlant {
    fn render_status(&mut self, lines: &[&str]) -> Result<(), DisplayError> {
        if self.fail_display {
            return Err(DisplayError::NotReady);
        }
        self.frames.push(lines.iter().map(|l| (*l).to_string()).collect());
        Ok(())
    }
}

impl WatchdogPort for BatteryPlant {
    fn arm(&mut self, timeout_ms: u32) {
        self.watchdog_timeout_ms = Some(timeout_ms);
        self.last_feed_ns = Some(self.clock.get());
    }

    fn reset(&mut self) {
        let now = self.clock.get();
        if let Some(prev) = self.last_feed_ns {
            self.max_feed_gap_ms = self.max_feed_gap_ms.max((now - prev) / 1_000_000);
        }
        self.last_feed_ns = Some(now);
        self.feeds += 1;
    }
}

impl TimerPort for BatteryPlant {
    fn schedule_periodic(&mut self, period_ms: u32) {
        self.timer_period = Some(period_ms);
        self.timer_changes.push(Some(period_ms));
    }

    fn reschedule_periodic(&mut self, period_ms: Option<u32>) {
        self.timer_period = period_ms;
        self.timer_changes.push(period_ms);
    }
}

// ── Delay ─────────────────────────────────────────────────────

/// Advances the shared clock instead of sleeping.  Panics once `budget`
/// delays have been taken, which is the only way out of `Sequencer::run`.
pub struct SimDelay {
    clock: SimClock,
    pub calls: u64,
    pub budget: Option<u64>,
}

#[allow(dead_code)]
impl SimDelay {
    pub fn new(clock: SimClock) -> Self {
        Self {
            clock,
            calls: 0,
            budget: None,
        }
    }

    pub fn with_budget(clock: SimClock, budget: u64) -> Self {
        Self {
            budget: Some(budget),
            ..Self::new(clock)
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.clock.get() / 1_000_000
    }
}

impl DelayNs for SimDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.calls += 1;
        if let Some(budget) = self.budget {
            assert!(self.calls <= budget, "delay budget exhausted");
        }
        self.clock.set(self.clock.get() + u64::from(ns));
    }

    fn delay_ms(&mut self, ms: u32) {
        self.calls += 1;
        if let Some(budget) = self.budget {
            assert!(self.calls <= budget, "delay budget exhausted");
        }
        self.clock.set(self.clock.get() + u64::from(ms) * 1_000_000);
    }
}
