//! Function-pointer finite state machine engine for the charge phases.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │  StateTable                                          │
//! │  ┌─────────────────────┬──────────────────────────┐  │
//! │  │ ChargePhase         │ on_update                │  │
//! │  ├─────────────────────┼──────────────────────────┤  │
//! │  │ CheckFault          │ fn(ctx) -> Option<Phase> │  │
//! │  │ CheckAlreadyCharged │ fn(ctx) -> Option<Phase> │  │
//! │  │ PreCharge           │ fn(ctx) -> Option<Phase> │  │
//! │  │ FastCharge          │ fn(ctx) -> Option<Phase> │  │
//! │  │ ConstantVoltageHold │ fn(ctx) -> Option<Phase> │  │
//! │  │ TimedTopOff         │ fn(ctx) -> Option<Phase> │  │
//! │  │ Error               │ fn(ctx) -> Option<Phase> │  │
//! │  │ Finished            │ fn(ctx) -> Option<Phase> │  │
//! │  └─────────────────────┴──────────────────────────┘  │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! Each tick the engine clears the command block, calls `on_update` for the
//! current phase and, if it returns `Some(next)`, moves the current pointer
//! and raises the phase-entry flag.  Entry actions live inside the handlers,
//! gated by [`ChargeContext::take_entry`], so a phase that is re-entered
//! (slot 1 runs the same sequence again) repeats its entry work.
//!
//! Handlers never sleep.  They request a delay through the command block
//! and [`Fsm::tick`] hands it back in the [`Decision`].

pub mod context;
pub mod states;

use context::{ChargeCommands, ChargeContext};
use log::info;

// ---------------------------------------------------------------------------
// Phase identity
// ---------------------------------------------------------------------------

/// Charge phases.  Must stay in sync with [`states::build_state_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ChargePhase {
    CheckFault = 0,
    CheckAlreadyCharged = 1,
    PreCharge = 2,
    FastCharge = 3,
    ConstantVoltageHold = 4,
    TimedTopOff = 5,
    Error = 6,
    Finished = 7,
}

impl ChargePhase {
    pub const COUNT: usize = 8;

    /// Phases in which current is being pushed into the cell.
    pub const fn is_charging(self) -> bool {
        matches!(
            self,
            Self::PreCharge | Self::FastCharge | Self::ConstantVoltageHold | Self::TimedTopOff
        )
    }
}

// ---------------------------------------------------------------------------
// Table row
// ---------------------------------------------------------------------------

/// Per-tick handler.  `Some(next)` requests a transition.
pub type StateUpdateFn = fn(&mut ChargeContext) -> Option<ChargePhase>;

pub struct StateDescriptor {
    pub id: ChargePhase,
    pub name: &'static str,
    pub on_update: StateUpdateFn,
}

// ---------------------------------------------------------------------------
// Decision
// ---------------------------------------------------------------------------

/// Outcome of one tick: the phase the machine is now in and how long the
/// Sequencer should wait before the next evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub phase: ChargePhase,
    pub delay_ms: u32,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct Fsm {
    table: [StateDescriptor; ChargePhase::COUNT],
    current: usize,
}

impl Fsm {
    pub fn new(table: [StateDescriptor; ChargePhase::COUNT], initial: ChargePhase) -> Self {
        Self {
            table,
            current: initial as usize,
        }
    }

    /// Arm the entry flag for the initial phase.  Call once before the
    /// first [`tick`](Self::tick).
    pub fn start(&mut self, ctx: &mut ChargeContext) {
        info!(
            "FSM starting in phase: {} (battery {})",
            self.table[self.current].name,
            ctx.active.number()
        );
        ctx.entry_pending = true;
    }

    /// Evaluate the current phase once.
    pub fn tick(&mut self, ctx: &mut ChargeContext) -> Decision {
        ctx.commands = ChargeCommands::idle(ctx.config.timing.loop_interval_ms);

        if let Some(next) = (self.table[self.current].on_update)(ctx) {
            self.transition(next, ctx);
        }

        Decision {
            phase: self.current_phase(),
            delay_ms: ctx.commands.delay_ms,
        }
    }

    /// Jump straight to `next`, skipping the current handler.  Used by the
    /// safety supervisor.
    pub fn force_transition(&mut self, next: ChargePhase, ctx: &mut ChargeContext) {
        if next as usize != self.current {
            self.transition(next, ctx);
        }
    }

    pub fn current_phase(&self) -> ChargePhase {
        self.table[self.current].id
    }

    fn transition(&mut self, next: ChargePhase, ctx: &mut ChargeContext) {
        let next_idx = next as usize;
        info!(
            "FSM transition: {} -> {}",
            self.table[self.current].name, self.table[next_idx].name
        );
        self.current = next_idx;
        ctx.entry_pending = true;
    }
}

impl Default for Fsm {
    fn default() -> Self {
        Self::new(states::build_state_table(), ChargePhase::CheckFault)
    }
}
