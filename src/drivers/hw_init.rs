//! One-shot hardware peripheral initialization and raw pin access.
//!
//! Configures the ADC channels of the analog front end, the relay and LED
//! outputs and the charge-path LEDC timer using raw ESP-IDF sys calls.
//! Called once from `main()` before the charge loop starts.
//!
//! On the host every accessor is backed by atomics so the adapters can be
//! exercised without a board: tests inject ADC samples with
//! [`sim_set_adc`] and read back pin and duty levels.

use core::convert::Infallible;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use log::info;

use crate::pins;

// ── Error type ────────────────────────────────────────────────

/// Errors during one-shot peripheral initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    AdcInitFailed(i32),
    GpioConfigFailed(i32),
    LedcInitFailed(i32),
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::AdcInitFailed(rc) => write!(f, "ADC1 init failed (rc={})", rc),
            Self::GpioConfigFailed(rc) => write!(f, "GPIO config failed (rc={})", rc),
            Self::LedcInitFailed(rc) => write!(f, "LEDC timer/channel config failed (rc={})", rc),
        }
    }
}

impl core::error::Error for HwInitError {}

impl From<HwInitError> for crate::error::Error {
    fn from(e: HwInitError) -> Self {
        match e {
            HwInitError::AdcInitFailed(_) => Self::Init("ADC"),
            HwInitError::GpioConfigFailed(_) => Self::Init("GPIO"),
            HwInitError::LedcInitFailed(_) => Self::Init("LEDC"),
        }
    }
}

#[cfg(target_os = "espidf")]
pub fn init_peripherals() -> Result<(), HwInitError> {
    // SAFETY: Called once from main() before the charge loop; single-threaded.
    unsafe {
        init_adc()?;
        init_gpio_outputs()?;
        init_ledc()?;
    }
    info!("hw_init: all peripherals configured");
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_peripherals() -> Result<(), HwInitError> {
    log::info!("hw_init(sim): peripheral init skipped");
    Ok(())
}

// ── ADC (oneshot) ─────────────────────────────────────────────

#[cfg(target_os = "espidf")]
static mut ADC1_HANDLE: adc_oneshot_unit_handle_t = core::ptr::null_mut();

/// SAFETY: Must be called only from the single-threaded init path or the
/// main-loop ADC read path.
#[cfg(target_os = "espidf")]
unsafe fn adc1_handle() -> adc_oneshot_unit_handle_t {
    unsafe { ADC1_HANDLE }
}

#[cfg(target_os = "espidf")]
unsafe fn init_adc() -> Result<(), HwInitError> {
    let init_cfg = adc_oneshot_unit_init_cfg_t {
        unit_id: adc_unit_t_ADC_UNIT_1,
        ulp_mode: adc_ulp_mode_t_ADC_ULP_MODE_DISABLE,
        ..Default::default()
    };
    // SAFETY: ADC1_HANDLE is only written here, once at boot.
    let ret = unsafe { adc_oneshot_new_unit(&init_cfg, &raw mut ADC1_HANDLE) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::AdcInitFailed(ret));
    }

    // 12 dB attenuation: full 0 – 3.3 V input range.
    let chan_cfg = adc_oneshot_chan_cfg_t {
        atten: adc_atten_t_ADC_ATTEN_DB_12,
        bitwidth: adc_bitwidth_t_ADC_BITWIDTH_12,
    };
    for channel in [pins::VSENSE_ADC_CHANNEL, pins::ISENSE_ADC_CHANNEL] {
        let ret = unsafe { adc_oneshot_config_channel(adc1_handle(), channel, &chan_cfg) };
        if ret != ESP_OK as i32 {
            return Err(HwInitError::AdcInitFailed(ret));
        }
    }

    info!(
        "hw_init: ADC1 configured (CH{}=Vsense, CH{}=Isense)",
        pins::VSENSE_ADC_CHANNEL,
        pins::ISENSE_ADC_CHANNEL
    );
    Ok(())
}

/// Raw 12-bit sample.  A failed conversion reads as 0.
#[cfg(target_os = "espidf")]
pub fn adc1_read(channel: u32) -> u16 {
    let mut raw: i32 = 0;
    // SAFETY: adc1_handle() contract; single-threaded main-loop access only.
    let ret = unsafe { adc_oneshot_read(adc1_handle(), channel, &mut raw) };
    if ret != ESP_OK as i32 {
        return 0;
    }
    raw.clamp(0, i32::from(pins::ADC_FULL_SCALE)) as u16
}

#[cfg(not(target_os = "espidf"))]
pub fn adc1_read(channel: u32) -> u16 {
    sim::ADC[sim::adc_slot(channel)].load(sim::Ordering::Relaxed)
}

/// Sample scaled to `[0, 1]` of the ADC reference.
pub fn adc1_read_normalised(channel: u32) -> f32 {
    f32::from(adc1_read(channel)) / f32::from(pins::ADC_FULL_SCALE)
}

// ── GPIO Outputs ──────────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn init_gpio_outputs() -> Result<(), HwInitError> {
    for pin in [pins::RELAY_GPIO, pins::LED1_GPIO, pins::LED2_GPIO] {
        let cfg = gpio_config_t {
            pin_bit_mask: 1u64 << pin,
            mode: gpio_mode_t_GPIO_MODE_OUTPUT,
            pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
        };
        let ret = unsafe { gpio_config(&cfg) };
        if ret != ESP_OK as i32 {
            return Err(HwInitError::GpioConfigFailed(ret));
        }
        unsafe { gpio_set_level(pin, 0) };
    }

    info!("hw_init: GPIO outputs configured (relay, LED1, LED2)");
    Ok(())
}

/// Drive an output pin.  Safe from both the main task and the esp_timer
/// task: each call is a single register write.
#[cfg(target_os = "espidf")]
pub fn gpio_write(pin: i32, high: bool) {
    // SAFETY: pin was configured as an output in init_gpio_outputs().
    unsafe {
        gpio_set_level(pin, u32::from(high));
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn gpio_write(pin: i32, high: bool) {
    let bit = 1u64 << pin;
    if high {
        sim::GPIO.fetch_or(bit, sim::Ordering::Relaxed);
    } else {
        sim::GPIO.fetch_and(!bit, sim::Ordering::Relaxed);
    }
}

// ── LEDC PWM ─────────────────────────────────────────────────

pub const LEDC_CH_CHARGE: u32 = 0;

#[cfg(target_os = "espidf")]
unsafe fn init_ledc() -> Result<(), HwInitError> {
    // Timer 0: charge switch (78.125 kHz, 10-bit)
    let timer0 = ledc_timer_config_t {
        speed_mode: ledc_mode_t_LEDC_LOW_SPEED_MODE,
        timer_num: ledc_timer_t_LEDC_TIMER_0,
        duty_resolution: ledc_timer_bit_t_LEDC_TIMER_10_BIT,
        freq_hz: pins::CHARGE_PWM_FREQ_HZ,
        clk_cfg: soc_periph_ledc_clk_src_legacy_t_LEDC_AUTO_CLK,
        ..Default::default()
    };
    let ret = unsafe { ledc_timer_config(&timer0) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::LedcInitFailed(ret));
    }

    // Channel 0 starts at 0 % so the cell sees no current before the
    // state machine has looked at it.
    let ret = unsafe {
        ledc_channel_config(&ledc_channel_config_t {
            speed_mode: ledc_mode_t_LEDC_LOW_SPEED_MODE,
            channel: LEDC_CH_CHARGE,
            timer_sel: ledc_timer_t_LEDC_TIMER_0,
            gpio_num: pins::CHARGE_PWM_GPIO,
            duty: 0,
            hpoint: 0,
            ..Default::default()
        })
    };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::LedcInitFailed(ret));
    }

    info!(
        "hw_init: LEDC configured (charge=CH{} @ {} Hz, {}-bit)",
        LEDC_CH_CHARGE,
        pins::CHARGE_PWM_FREQ_HZ,
        pins::CHARGE_PWM_RESOLUTION_BITS
    );
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn ledc_set(channel: u32, duty: u32) {
    // SAFETY: LEDC channels were configured in init_ledc(); only the main
    // loop writes the duty register.
    unsafe {
        ledc_set_duty(ledc_mode_t_LEDC_LOW_SPEED_MODE, channel, duty);
        ledc_update_duty(ledc_mode_t_LEDC_LOW_SPEED_MODE, channel);
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn ledc_set(channel: u32, duty: u32) {
    if channel == LEDC_CH_CHARGE {
        sim::LEDC_CHARGE.store(duty, sim::Ordering::Relaxed);
    }
}

// ── embedded-hal handles ──────────────────────────────────────

/// One LEDC channel behind [`embedded_hal::pwm::SetDutyCycle`].
pub struct LedcChannel {
    channel: u32,
    max_duty: u16,
}

impl LedcChannel {
    pub const fn new(channel: u32, max_duty: u16) -> Self {
        Self { channel, max_duty }
    }

    pub const fn charge() -> Self {
        Self::new(LEDC_CH_CHARGE, pins::CHARGE_PWM_MAX_DUTY)
    }
}

impl embedded_hal::pwm::ErrorType for LedcChannel {
    type Error = Infallible;
}

impl embedded_hal::pwm::SetDutyCycle for LedcChannel {
    fn max_duty_cycle(&self) -> u16 {
        self.max_duty
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Self::Error> {
        ledc_set(self.channel, u32::from(duty.min(self.max_duty)));
        Ok(())
    }
}

/// One push-pull output behind [`embedded_hal::digital::OutputPin`].
pub struct GpioOutput {
    pin: i32,
}

impl GpioOutput {
    pub const fn new(pin: i32) -> Self {
        Self { pin }
    }

    pub const fn relay() -> Self {
        Self::new(pins::RELAY_GPIO)
    }
}

impl embedded_hal::digital::ErrorType for GpioOutput {
    type Error = Infallible;
}

impl embedded_hal::digital::OutputPin for GpioOutput {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        gpio_write(self.pin, false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        gpio_write(self.pin, true);
        Ok(())
    }
}

// ── Host simulation ───────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
mod sim {
    pub use core::sync::atomic::Ordering;
    use core::sync::atomic::{AtomicU16, AtomicU32, AtomicU64};

    use crate::pins;

    pub static ADC: [AtomicU16; 2] = [AtomicU16::new(0), AtomicU16::new(0)];
    pub static GPIO: AtomicU64 = AtomicU64::new(0);
    pub static LEDC_CHARGE: AtomicU32 = AtomicU32::new(0);

    pub fn adc_slot(channel: u32) -> usize {
        usize::from(channel == pins::ISENSE_ADC_CHANNEL)
    }
}

/// Inject a raw ADC sample (host only).
#[cfg(not(target_os = "espidf"))]
pub fn sim_set_adc(channel: u32, raw: u16) {
    sim::ADC[sim::adc_slot(channel)].store(raw.min(pins::ADC_FULL_SCALE), sim::Ordering::Relaxed);
}

/// Current level of an output pin (host only).
#[cfg(not(target_os = "espidf"))]
pub fn sim_gpio_level(pin: i32) -> bool {
    sim::GPIO.load(sim::Ordering::Relaxed) & (1u64 << pin) != 0
}

/// Last duty written to the charge channel (host only).
#[cfg(not(target_os = "espidf"))]
pub fn sim_charge_duty() -> u32 {
    sim::LEDC_CHARGE.load(sim::Ordering::Relaxed)
}
