//! GPIO / peripheral pin assignments for the two-cell charger board.
//!
//! Single source of truth: every driver references this module rather than
//! hard-coding pin numbers.

// ---------------------------------------------------------------------------
// Charge path
// ---------------------------------------------------------------------------

/// LEDC PWM output driving the charge-path switch.
pub const CHARGE_PWM_GPIO: i32 = 1;
/// Digital output: relay coil.  LOW routes battery 1, HIGH routes battery 2.
pub const RELAY_GPIO: i32 = 2;

// ---------------------------------------------------------------------------
// Indicators
// ---------------------------------------------------------------------------

/// Battery 1 indicator (active HIGH).
pub const LED1_GPIO: i32 = 3;
/// Battery 2 indicator (active HIGH).
pub const LED2_GPIO: i32 = 4;

// ---------------------------------------------------------------------------
// Analog front end (ADC1)
// ---------------------------------------------------------------------------

/// Battery voltage through the 10k/15k divider.  ADC1 channel 4 (GPIO 5).
pub const VSENSE_ADC_CHANNEL: u32 = 4;

/// Low-side sense resistor.  ADC1 channel 5 (GPIO 6).
pub const ISENSE_ADC_CHANNEL: u32 = 5;

/// Full-scale raw reading at 12-bit resolution.
pub const ADC_FULL_SCALE: u16 = 4095;

// ---------------------------------------------------------------------------
// PWM configuration
// ---------------------------------------------------------------------------

/// LEDC timer resolution (bits).  10-bit gives 0 – 1023 duty levels.
pub const CHARGE_PWM_RESOLUTION_BITS: u32 = 10;
/// Highest LEDC duty value at [`CHARGE_PWM_RESOLUTION_BITS`].
pub const CHARGE_PWM_MAX_DUTY: u16 = (1 << CHARGE_PWM_RESOLUTION_BITS) - 1;
/// LEDC frequency for the charge switch.  80 MHz / 2^10.
pub const CHARGE_PWM_FREQ_HZ: u32 = 78_125;
