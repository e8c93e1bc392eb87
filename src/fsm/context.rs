//! Shared mutable context threaded through every phase handler.
//!
//! `ChargeContext` is the single struct that phase handlers read from and
//! write to: the latest reading of each battery slot, the active slot, the
//! duty controller, the phase-entry flag, the top-off countdown, and the
//! per-tick command block the Sequencer applies to hardware afterwards.

use core::fmt::Write;

use crate::config::ChargerConfig;
use crate::control::DutyController;
use crate::sensors::{BatteryReading, BatterySlot, Slot};

/// Width of one status line.
pub const STATUS_LINE_LEN: usize = 48;
/// Lines per status screen.
pub const STATUS_LINES: usize = 5;

pub type StatusLine = heapless::String<STATUS_LINE_LEN>;

// ---------------------------------------------------------------------------
// Status screen
// ---------------------------------------------------------------------------

/// A frame for the status display, built by phase handlers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusScreen {
    lines: heapless::Vec<StatusLine, STATUS_LINES>,
}

impl StatusScreen {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a line.  Text past the line width or past the last line is
    /// dropped; the display is observational only.
    pub fn line(mut self, args: core::fmt::Arguments<'_>) -> Self {
        let mut l = StatusLine::new();
        let _ = l.write_fmt(args);
        let _ = self.lines.push(l);
        self
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(StatusLine::as_str)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Commands (written by phase handlers; applied by the Sequencer)
// ---------------------------------------------------------------------------

/// Indicator cadence request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlinkCommand {
    /// Blink the active slot's indicator with this period (ms).
    Every(u32),
    /// Stop blinking.
    Off,
}

/// Outputs requested by one phase evaluation.  Reset every tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeCommands {
    /// Change of indicator cadence, if any.
    pub blink: Option<BlinkCommand>,
    /// Relay position change, if any.
    pub relay: Option<bool>,
    /// Latched indicator writes, indexed by slot.
    pub latch: [Option<bool>; 2],
    /// Frame to render, if any.
    pub screen: Option<StatusScreen>,
    /// Requested delay before the next evaluation (ms).
    pub delay_ms: u32,
}

impl ChargeCommands {
    pub fn idle(delay_ms: u32) -> Self {
        Self {
            blink: None,
            relay: None,
            latch: [None; 2],
            screen: None,
            delay_ms,
        }
    }
}

// ---------------------------------------------------------------------------
// ChargeContext
// ---------------------------------------------------------------------------

/// The context passed to every phase handler.
pub struct ChargeContext {
    // -- Configuration --
    pub config: ChargerConfig,

    // -- Battery data --
    /// Slot currently routed to the charge path.
    pub active: Slot,
    /// Last reading of each slot.
    pub slots: [BatterySlot; 2],

    // -- Control --
    pub duty: DutyController,
    /// Phase-entry flag: set on every transition, consumed by
    /// [`take_entry`](Self::take_entry).
    pub entry_pending: bool,
    /// Remaining top-off ticks.
    pub top_off_remaining: u32,

    // -- Safety --
    /// Latched fault bitmask (see `SafetyFault::mask()`).
    pub fault_flags: u8,

    // -- Outputs --
    pub commands: ChargeCommands,
}

impl ChargeContext {
    pub fn new(config: ChargerConfig) -> Self {
        let loop_ms = config.timing.loop_interval_ms;
        Self {
            config,
            active: Slot::First,
            slots: [BatterySlot::new(Slot::First), BatterySlot::new(Slot::Second)],
            duty: DutyController::new(),
            entry_pending: true,
            top_off_remaining: 0,
            fault_flags: 0,
            commands: ChargeCommands::idle(loop_ms),
        }
    }

    /// Store a fresh reading for the active slot.
    pub fn record(&mut self, reading: BatteryReading) {
        self.slots[self.active.index()].record(reading);
    }

    /// Latest reading of the active slot.
    pub fn reading(&self) -> BatteryReading {
        self.slots[self.active.index()].last
    }

    /// Consume the phase-entry flag.  Returns `true` exactly once per
    /// phase visit.
    pub fn take_entry(&mut self) -> bool {
        core::mem::take(&mut self.entry_pending)
    }

    pub fn raise(&mut self, fault: crate::error::SafetyFault) {
        self.fault_flags |= fault.mask();
    }

    /// Request a frame for the display.
    pub fn show(&mut self, screen: StatusScreen) {
        self.commands.screen = Some(screen);
    }

    /// Standard regulation frame: title, voltage, current, duty.
    pub fn show_status(&mut self, title: &str) {
        let r = self.reading();
        let idx = self.active.index();
        let screen = StatusScreen::new()
            .line(format_args!("{title}"))
            .line(format_args!("Vbatt[{idx}]= {}mV", r.voltage_mv))
            .line(format_args!("Ibatt[{idx}]= {}mA", r.current_ma))
            .line(format_args!("{}", self.duty.describe()));
        self.show(screen);
    }

    pub fn set_blink(&mut self, blink: BlinkCommand) {
        self.commands.blink = Some(blink);
    }

    pub fn set_delay(&mut self, delay_ms: u32) {
        self.commands.delay_ms = delay_ms;
    }
}
