//! Blink timer built on ESP-IDF's esp_timer API.
//!
//! One periodic timer drives [`IndicatorState::on_timer`].  The callback
//! runs in the esp_timer task (not an ISR) and only touches the atomic
//! indicator snapshot and the LED GPIOs.
//!
//! On simulation targets nothing is scheduled; tests call
//! [`IndicatorTimer::fire`] to run the callback by hand.

use log::info;

use crate::drivers::indicator_led::IndicatorLeds;
use crate::indicator::IndicatorState;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

/// Everything the timer callback needs, with `'static` lifetime so its
/// address can be handed to esp_timer.
pub struct BlinkBinding {
    pub state: &'static IndicatorState,
    pub leds: IndicatorLeds,
}

impl BlinkBinding {
    pub const fn new(state: &'static IndicatorState, leds: IndicatorLeds) -> Self {
        Self { state, leds }
    }

    fn fire(&self) {
        self.state.on_timer(&self.leds);
    }
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn blink_cb(arg: *mut core::ffi::c_void) {
    // SAFETY: `arg` is the `&'static BlinkBinding` registered in start().
    let binding = unsafe { &*(arg as *const BlinkBinding) };
    binding.fire();
}

pub struct IndicatorTimer {
    binding: &'static BlinkBinding,
    period_ms: Option<u32>,
    #[cfg(target_os = "espidf")]
    handle: esp_timer_handle_t,
}

impl IndicatorTimer {
    pub fn new(binding: &'static BlinkBinding) -> Self {
        Self {
            binding,
            period_ms: None,
            #[cfg(target_os = "espidf")]
            handle: core::ptr::null_mut(),
        }
    }

    pub fn binding(&self) -> &'static BlinkBinding {
        self.binding
    }

    /// Period currently running, `None` when stopped.
    pub fn period_ms(&self) -> Option<u32> {
        self.period_ms
    }

    /// Start (or restart) the periodic callback.
    #[cfg(target_os = "espidf")]
    pub fn start(&mut self, period_ms: u32) {
        // SAFETY: the handle is created once here from the main task and the
        // callback argument outlives the timer.
        unsafe {
            if self.handle.is_null() {
                let args = esp_timer_create_args_t {
                    callback: Some(blink_cb),
                    arg: core::ptr::from_ref(self.binding).cast_mut().cast(),
                    dispatch_method: esp_timer_dispatch_t_ESP_TIMER_TASK,
                    name: c"blink".as_ptr(),
                    skip_unhandled_events: true,
                };
                let ret = esp_timer_create(&args, &mut self.handle);
                if ret != ESP_OK {
                    log::error!("hw_timer: blink timer create failed (rc={}), indicators will not blink", ret);
                    self.handle = core::ptr::null_mut();
                    return;
                }
            } else {
                esp_timer_stop(self.handle);
            }
            let ret = esp_timer_start_periodic(self.handle, u64::from(period_ms) * 1_000);
            if ret != ESP_OK {
                log::error!("hw_timer: blink timer start failed (rc={})", ret);
                return;
            }
        }
        self.period_ms = Some(period_ms);
        info!("hw_timer: blink every {} ms", period_ms);
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn start(&mut self, period_ms: u32) {
        self.period_ms = Some(period_ms);
        info!("hw_timer(sim): blink every {} ms (not scheduled)", period_ms);
    }

    #[cfg(target_os = "espidf")]
    pub fn stop(&mut self) {
        if !self.handle.is_null() {
            // SAFETY: handle is valid once created in start().
            unsafe {
                esp_timer_stop(self.handle);
            }
        }
        self.period_ms = None;
        info!("hw_timer: blink stopped");
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn stop(&mut self) {
        self.period_ms = None;
        info!("hw_timer(sim): blink stopped");
    }

    /// Run the callback once, as the timer would (host only).
    #[cfg(not(target_os = "espidf"))]
    pub fn fire(&self) {
        if self.period_ms.is_some() {
            self.binding.fire();
        }
    }
}
