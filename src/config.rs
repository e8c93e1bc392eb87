//! Charger configuration parameters
//!
//! Every threshold the state machine compares against lives here, grouped
//! by concern.  The struct is built once at boot, validated, and then
//! handed to the Sequencer by value; nothing mutates it afterwards.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Cell chemistry.  Only affects the float (nominal) voltage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Chemistry {
    /// 4.1 V float.
    LiIon,
    /// 4.2 V float.
    LiPo,
}

impl Chemistry {
    pub const fn nominal_mv(self) -> i32 {
        match self {
            Self::LiIon => 4100,
            Self::LiPo => 4200,
        }
    }
}

/// Voltage and current thresholds driving phase decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thresholds {
    // --- Voltage (mV) ---
    /// Below this the cell is treated as absent / faulty.
    pub min_valid_mv: i32,
    /// Pre-charge runs until the cell reaches this voltage.
    pub precharge_ceiling_mv: i32,
    /// Float voltage held during the constant-voltage stage.
    pub nominal_mv: i32,
    /// Above this at start-up the cell is already charged; above this while
    /// charging is an over-voltage fault.
    pub alarm_mv: i32,
    /// Half-width of the constant-voltage regulation band.
    pub voltage_tolerance_mv: i32,

    // --- Current (mA) ---
    /// Pre-charge conditioning current.
    pub precharge_current_ma: i32,
    /// Constant-current stage target.
    pub fast_charge_current_ma: i32,
    /// Constant-voltage stage ends once current tapers to this.
    pub maintenance_current_ma: i32,
    /// Smallest current considered a live charge.
    pub min_viable_current_ma: i32,
    /// Half-width of the constant-current regulation band.
    pub current_tolerance_ma: i32,
    /// Hard limit; exceeding it while charging is an over-current fault.
    pub overcurrent_limit_ma: i32,
}

impl Thresholds {
    /// Derive thresholds for a pack of the given chemistry and capacity.
    ///
    /// Fast charge runs at 0.5 C with a 2 % regulation band; the hard
    /// current limit sits at 1 C.
    pub const fn for_pack(chemistry: Chemistry, capacity_mah: i32) -> Self {
        let fast = capacity_mah / 2;
        Self {
            min_valid_mv: 1000,
            precharge_ceiling_mv: 3000,
            nominal_mv: chemistry.nominal_mv(),
            alarm_mv: 4600,
            voltage_tolerance_mv: 10,
            precharge_current_ma: 65,
            fast_charge_current_ma: fast,
            maintenance_current_ma: 50,
            min_viable_current_ma: 30,
            current_tolerance_ma: (fast * 2) / 100,
            overcurrent_limit_ma: fast * 2,
        }
    }

    /// Current below which the constant-current stage is still running
    /// even at float voltage (three quarters of the fast-charge target).
    pub const fn fast_charge_exit_ma(&self) -> i32 {
        ((3 * self.fast_charge_current_ma as i64) / 4) as i32
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self::for_pack(Chemistry::LiIon, 1400)
    }
}

/// Analog front-end calibration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    /// ADC full-scale reference (mV).
    pub vref_mv: f64,
    /// Upper resistor of the battery-voltage divider.
    pub divider_top: f64,
    /// Lower resistor of the battery-voltage divider.
    pub divider_bottom: f64,
    /// Integer divisor turning sense-resistor millivolts into milliamps.
    pub sense_resistor_scale: i32,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            vref_mv: 3300.0,
            divider_top: 10.0,
            divider_bottom: 15.0,
            sense_resistor_scale: 1,
        }
    }
}

/// Loop pacing, indicator cadence and watchdog timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timing {
    /// Natural pacing between Sequencer iterations (ms).
    pub loop_interval_ms: u32,
    /// Delay after each regulation step in the CC / CV / top-off stages (ms).
    pub regulation_delay_ms: u32,
    /// Idle delay once both cells are charged (ms).
    pub finished_idle_ms: u32,
    /// Hardware watchdog timeout (ms).
    pub watchdog_timeout_ms: u32,
    /// Indicator period during start-up and pre-charge (ms).
    pub blink_slow_ms: u32,
    /// Indicator period during the constant-current stage (ms).
    pub blink_fast_ms: u32,
    /// Indicator period during the constant-voltage stage (ms).
    pub blink_rapid_ms: u32,
    /// Length of the timed top-off hold (ms).
    pub top_off_duration_ms: u32,
}

impl Timing {
    /// Top-off length expressed in regulation ticks.
    pub const fn top_off_ticks(&self) -> u32 {
        self.top_off_duration_ms / self.regulation_delay_ms
    }
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            loop_interval_ms: 10,
            regulation_delay_ms: 500,
            finished_idle_ms: 2000,
            watchdog_timeout_ms: 5000,
            blink_slow_ms: 1000,
            blink_fast_ms: 500,
            blink_rapid_ms: 100,
            top_off_duration_ms: 50 * 60 * 1000, // 50 min
        }
    }
}

/// Complete charger configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChargerConfig {
    pub thresholds: Thresholds,
    pub calibration: Calibration,
    pub timing: Timing,
    /// Run the timed top-off stage after constant voltage instead of going
    /// straight to `Finished`.
    pub top_off_enabled: bool,
}

impl ChargerConfig {
    /// Configuration for a pack of the given chemistry and capacity.
    pub fn for_pack(chemistry: Chemistry, capacity_mah: i32) -> Self {
        Self {
            thresholds: Thresholds::for_pack(chemistry, capacity_mah),
            ..Self::default()
        }
    }

    /// Parse a JSON override and validate it.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|_| Error::Config("malformed config JSON"))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the state machine cannot run safely.
    ///
    /// Values are rejected, never clamped.
    pub fn validate(&self) -> Result<()> {
        let t = &self.thresholds;
        if !(0 < t.min_valid_mv
            && t.min_valid_mv < t.precharge_ceiling_mv
            && t.precharge_ceiling_mv < t.nominal_mv
            && t.nominal_mv < t.alarm_mv)
        {
            return Err(Error::Config(
                "voltage thresholds must satisfy min_valid < precharge_ceiling < nominal < alarm",
            ));
        }
        if !(0 < t.min_viable_current_ma
            && t.min_viable_current_ma <= t.maintenance_current_ma
            && t.maintenance_current_ma < t.precharge_current_ma
            && t.precharge_current_ma < t.fast_charge_current_ma
            && t.fast_charge_current_ma < t.overcurrent_limit_ma)
        {
            return Err(Error::Config(
                "current thresholds must satisfy min_viable <= maintenance < precharge < fast < overcurrent_limit",
            ));
        }
        if t.voltage_tolerance_mv <= 0 || t.current_tolerance_ma <= 0 {
            return Err(Error::Config("regulation tolerances must be positive"));
        }
        match t.nominal_mv.checked_add(t.voltage_tolerance_mv) {
            Some(top) if top < t.alarm_mv => {}
            _ => {
                return Err(Error::Config(
                    "voltage regulation band reaches the alarm threshold",
                ));
            }
        }
        if t.voltage_tolerance_mv >= t.nominal_mv - t.precharge_ceiling_mv {
            return Err(Error::Config(
                "voltage tolerance must be narrower than the precharge-to-nominal window",
            ));
        }
        if t.current_tolerance_ma >= t.fast_charge_current_ma {
            return Err(Error::Config(
                "current tolerance must be smaller than the fast-charge current",
            ));
        }

        let c = &self.calibration;
        if !(c.vref_mv.is_finite() && c.divider_top.is_finite() && c.divider_bottom.is_finite()) {
            return Err(Error::Config("calibration values must be finite"));
        }
        if c.vref_mv <= 0.0 || c.divider_top < 0.0 || c.divider_bottom <= 0.0 {
            return Err(Error::Config("calibration reference and divider must be positive"));
        }
        if c.sense_resistor_scale <= 0 {
            return Err(Error::Config("sense_resistor_scale must be positive"));
        }

        let tm = &self.timing;
        if tm.loop_interval_ms == 0 || tm.regulation_delay_ms == 0 {
            return Err(Error::Config("loop and regulation delays must be non-zero"));
        }
        let longest_yield = tm
            .loop_interval_ms
            .max(tm.regulation_delay_ms)
            .max(tm.finished_idle_ms);
        if longest_yield >= tm.watchdog_timeout_ms {
            return Err(Error::Config("every loop yield must be shorter than the watchdog timeout"));
        }
        for period in [tm.blink_slow_ms, tm.blink_fast_ms, tm.blink_rapid_ms] {
            if period == 0 || period > u32::from(u16::MAX) {
                return Err(Error::Config("blink periods must be within 1..=65535 ms"));
            }
        }
        if self.top_off_enabled && tm.top_off_ticks() == 0 {
            return Err(Error::Config("top-off duration shorter than one regulation tick"));
        }
        Ok(())
    }
}
