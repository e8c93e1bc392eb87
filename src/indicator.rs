//! Indicator scheduler state.
//!
//! The blink timer runs on its own schedule and may fire at any point of a
//! Sequencer iteration.  Everything it needs from the Sequencer (the active
//! slot and the blink period) is packed into one `AtomicU32`, so the
//! callback always reads a consistent pair.  The blink phase itself is
//! owned by the callback.
//!
//! ```text
//!   bits 31..16   slot index
//!   bits 15..0    period in ms (0 = blinking off)
//! ```

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::app::ports::{IndicatorId, IndicatorPort};
use crate::sensors::Slot;

/// Consistent view of what the indicator should be doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndicatorSnapshot {
    pub slot: Slot,
    /// `None` when blinking is disabled.
    pub period_ms: Option<u16>,
}

impl IndicatorSnapshot {
    pub const fn new(slot: Slot, period_ms: Option<u16>) -> Self {
        Self { slot, period_ms }
    }

    const fn pack(self) -> u32 {
        let period = match self.period_ms {
            Some(p) => p as u32,
            None => 0,
        };
        ((self.slot as u32) << 16) | period
    }

    const fn unpack(word: u32) -> Self {
        let slot = if word >> 16 == 0 { Slot::First } else { Slot::Second };
        let period = (word & 0xFFFF) as u16;
        Self {
            slot,
            period_ms: if period == 0 { None } else { Some(period) },
        }
    }
}

/// Shared between the Sequencer (writer) and the timer callback (reader).
pub struct IndicatorState {
    snapshot: AtomicU32,
    blink: AtomicBool,
}

impl IndicatorState {
    /// Slot 0, blinking off.
    pub const fn new() -> Self {
        Self {
            snapshot: AtomicU32::new(0),
            blink: AtomicBool::new(false),
        }
    }

    pub fn publish(&self, snap: IndicatorSnapshot) {
        self.snapshot.store(snap.pack(), Ordering::Release);
    }

    pub fn snapshot(&self) -> IndicatorSnapshot {
        IndicatorSnapshot::unpack(self.snapshot.load(Ordering::Acquire))
    }

    pub fn blink(&self) -> bool {
        self.blink.load(Ordering::Relaxed)
    }

    /// Timer callback body: toggle the blink phase and drive the active
    /// slot's LED.  Slot 1 leaves LED 1 alone so its "charged" latch
    /// survives.
    pub fn on_timer(&self, leds: &impl IndicatorPort) {
        let snap = self.snapshot();
        if snap.period_ms.is_none() {
            return;
        }
        let blink = !self.blink.fetch_xor(true, Ordering::Relaxed);
        match snap.slot {
            Slot::First => {
                leds.set_indicator(IndicatorId::Led1, blink);
                leds.set_indicator(IndicatorId::Led2, false);
            }
            Slot::Second => leds.set_indicator(IndicatorId::Led2, blink),
        }
    }
}

impl Default for IndicatorState {
    fn default() -> Self {
        Self::new()
    }
}
