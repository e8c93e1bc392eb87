//! Per-slot indicator LEDs.
//!
//! Written from two contexts: the charge loop latches a slot's LED once it
//! is charged, and the blink timer toggles the active slot's LED.  Each
//! write is a single GPIO register store, so the driver takes `&self` and
//! mirrors the levels in an atomic for inspection.

use core::sync::atomic::{AtomicU8, Ordering};

use crate::app::ports::{IndicatorId, IndicatorPort};
use crate::drivers::hw_init;
use crate::pins;

pub struct IndicatorLeds {
    gpios: [i32; 2],
    levels: AtomicU8,
}

impl IndicatorLeds {
    pub const fn new(led1_gpio: i32, led2_gpio: i32) -> Self {
        Self {
            gpios: [led1_gpio, led2_gpio],
            levels: AtomicU8::new(0),
        }
    }

    /// LEDs at their board positions.
    pub const fn board() -> Self {
        Self::new(pins::LED1_GPIO, pins::LED2_GPIO)
    }

    pub fn is_on(&self, id: IndicatorId) -> bool {
        self.levels.load(Ordering::Relaxed) & (1 << id.index()) != 0
    }

    pub fn all_off(&self) {
        self.set_indicator(IndicatorId::Led1, false);
        self.set_indicator(IndicatorId::Led2, false);
    }
}

impl IndicatorPort for IndicatorLeds {
    fn set_indicator(&self, id: IndicatorId, on: bool) {
        let bit = 1u8 << id.index();
        hw_init::gpio_write(self.gpios[id.index()], on);
        if on {
            self.levels.fetch_or(bit, Ordering::Relaxed);
        } else {
            self.levels.fetch_and(!bit, Ordering::Relaxed);
        }
    }
}
