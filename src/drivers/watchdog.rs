//! Task Watchdog Timer (TWDT) driver.
//!
//! Wraps the ESP-IDF TWDT API to reset the device if the charge loop
//! stalls.  The loop feeds it at the top of every iteration; every yield
//! it requests is shorter than the timeout.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

use log::info;

#[derive(Default)]
pub struct Watchdog {
    timeout_ms: Option<u32>,
    feeds: u64,
}

impl Watchdog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure the TWDT and subscribe the calling task.  Panics (and
    /// so resets) on expiry.
    pub fn arm(&mut self, timeout_ms: u32) {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: plain FFI calls on the TWDT, made once from the main
            // task before the loop starts.
            unsafe {
                let cfg = esp_task_wdt_config_t {
                    timeout_ms,
                    idle_core_mask: 0,
                    trigger_panic: true,
                };
                let ret = esp_task_wdt_reconfigure(&cfg);
                if ret != ESP_OK {
                    log::warn!("TWDT reconfigure returned {} (may already be configured)", ret);
                }

                let ret = esp_task_wdt_add(core::ptr::null_mut());
                if ret != ESP_OK {
                    log::warn!("Watchdog: failed to subscribe ({})", ret);
                    return;
                }
            }
        }

        self.timeout_ms = Some(timeout_ms);
        info!("Watchdog: armed ({} ms timeout, panic on trigger)", timeout_ms);
    }

    /// Feed the watchdog.  No-op until armed.
    pub fn feed(&mut self) {
        if self.timeout_ms.is_none() {
            return;
        }
        #[cfg(target_os = "espidf")]
        // SAFETY: the task was subscribed in arm().
        unsafe {
            esp_task_wdt_reset();
        }
        self.feeds += 1;
    }

    pub fn timeout_ms(&self) -> Option<u32> {
        self.timeout_ms
    }

    pub fn feeds(&self) -> u64 {
        self.feeds
    }
}
