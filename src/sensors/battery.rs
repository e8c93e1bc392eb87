//! Battery voltage / current measurement.
//!
//! Both cells share one analog front end: the relay routes the selected
//! cell through a resistive divider (voltage sense) and a low-side sense
//! resistor (current sense).  Each measurement averages four samples per
//! channel, converts to millivolts against the ADC reference, undoes the
//! divider, and subtracts the sense-resistor drop to recover the true
//! terminal voltage.

use crate::app::ports::{AnalogChannel, AnalogPort};
use crate::config::Calibration;

/// Samples averaged per channel for one reading.
pub const SAMPLES_PER_READING: usize = 4;

/// Identity of a battery position on the charger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Slot {
    First = 0,
    Second = 1,
}

impl Slot {
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Slot charged after this one, if any.
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::First => Some(Self::Second),
            Self::Second => None,
        }
    }

    /// 1-based number shown to the operator.
    pub const fn number(self) -> u8 {
        self as u8 + 1
    }
}

/// One calibrated measurement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatteryReading {
    pub voltage_mv: i32,
    pub current_ma: i32,
}

impl BatteryReading {
    pub const fn new(voltage_mv: i32, current_ma: i32) -> Self {
        Self {
            voltage_mv,
            current_ma,
        }
    }
}

/// Last known reading of one battery position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatterySlot {
    pub slot: Slot,
    pub last: BatteryReading,
}

impl BatterySlot {
    pub const fn new(slot: Slot) -> Self {
        Self {
            slot,
            last: BatteryReading::new(0, 0),
        }
    }

    pub fn record(&mut self, reading: BatteryReading) {
        self.last = reading;
    }
}

/// Converts averaged ADC samples into calibrated readings.
pub struct MeasurementUnit {
    calibration: Calibration,
}

impl MeasurementUnit {
    pub fn new(calibration: Calibration) -> Self {
        Self { calibration }
    }

    /// Sample both channels and return the reading for `slot`.
    ///
    /// The slot only tags the reading; the relay has already routed the
    /// selected cell to the shared front end.
    pub fn measure(&self, adc: &mut impl AnalogPort, slot: Slot) -> BatteryReading {
        let mut sum_v = 0.0f64;
        let mut sum_i = 0.0f64;
        for _ in 0..SAMPLES_PER_READING {
            sum_v += f64::from(adc.read_channel(AnalogChannel::VoltageSense));
            sum_i += f64::from(adc.read_channel(AnalogChannel::CurrentSense));
        }
        let reading = self.convert(
            sum_v / SAMPLES_PER_READING as f64,
            sum_i / SAMPLES_PER_READING as f64,
        );
        log::trace!(
            "battery {}: {} mV, {} mA",
            slot.number(),
            reading.voltage_mv,
            reading.current_ma
        );
        reading
    }

    /// Apply the linear calibration to normalised channel averages.
    pub fn convert(&self, avg_voltage: f64, avg_current: f64) -> BatteryReading {
        let cal = &self.calibration;

        let sense_mv = (cal.vref_mv * avg_current).round() as i32;
        let current_ma = sense_mv / cal.sense_resistor_scale;

        let divider_mv = cal.vref_mv * avg_voltage * (cal.divider_top + cal.divider_bottom)
            / cal.divider_bottom;
        let voltage_mv = divider_mv.round() as i32 - current_ma;

        BatteryReading {
            voltage_mv,
            current_ma,
        }
    }
}
