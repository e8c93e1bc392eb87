//! Safety supervisor.
//!
//! Runs every iteration after measurement and before the FSM.  While a
//! charging phase is active it checks the fresh reading against the hard
//! limits and latches a fault bit when one is exceeded.  The Sequencer then
//! cuts the output and forces the FSM into `Error`.
//!
//! The latched mask lives in the charge context; the supervisor only
//! compares a reading against the limits.  `Error` has no exit, so latched
//! bits are never cleared.  Outside the charging phases the
//! output is already off and the checks are skipped; `CheckAlreadyCharged`
//! legitimately sees voltages above the alarm threshold.

use crate::config::ChargerConfig;
use crate::error::SafetyFault;
use crate::sensors::BatteryReading;
use log::error;

pub struct SafetySupervisor {
    alarm_mv: i32,
    overcurrent_limit_ma: i32,
}

impl SafetySupervisor {
    pub fn new(config: &ChargerConfig) -> Self {
        Self {
            alarm_mv: config.thresholds.alarm_mv,
            overcurrent_limit_ma: config.thresholds.overcurrent_limit_ma,
        }
    }

    /// Check `reading` against the hard limits and return the violated
    /// bits not already present in `latched`.
    ///
    /// The caller owns the latched mask and ORs the result into it.
    pub fn evaluate(&self, reading: BatteryReading, charging: bool, latched: u8) -> u8 {
        if !charging {
            return 0;
        }
        let mut violated = 0;
        if reading.voltage_mv > self.alarm_mv {
            violated |= SafetyFault::OverVoltage.mask();
        }
        if reading.current_ma > self.overcurrent_limit_ma {
            violated |= SafetyFault::OverCurrent.mask();
        }
        let new = violated & !latched;
        for fault in [SafetyFault::OverVoltage, SafetyFault::OverCurrent] {
            if new & fault.mask() != 0 {
                error!("SAFETY FAULT SET: {fault}");
            }
        }
        new
    }
}
