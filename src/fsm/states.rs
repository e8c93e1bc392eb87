//! Phase handlers and table builder.
//!
//! Each phase is a plain `fn` pointer; one-time entry work is gated by the
//! context's phase-entry flag.
//!
//! ```text
//!  CHECK_FAULT ──[V < min]──────────────────────────────▶ ERROR
//!       │
//!       ▼
//!  CHECK_CHARGED ──[V > alarm]──────────────────────────▶ FINISHED
//!       │                                                   ▲  │
//!       ▼                                                   │  │ slot 0:
//!  PRE_CHARGE ──[V ≥ ceiling]──▶ FAST_CHARGE                │  │ advance,
//!                                    │                      │  │ back to
//!                        [V ≥ nom ∧ I ≥ ¾·fast]             │  │ CHECK_FAULT
//!                                    ▼                      │
//!                              CV_HOLD ──[I ≤ maint]────────┤
//!                                    │ (top-off enabled)    │
//!                                    ▼                      │
//!                              TOP_OFF ──[V < nom ∨ t=0]────┘
//! ```

use super::context::{BlinkCommand, ChargeContext, StatusScreen};
use super::{ChargePhase, StateDescriptor};
use crate::error::SafetyFault;
use log::{error, info, warn};

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

pub fn build_state_table() -> [StateDescriptor; ChargePhase::COUNT] {
    [
        StateDescriptor {
            id: ChargePhase::CheckFault,
            name: "CheckFault",
            on_update: check_fault_update,
        },
        StateDescriptor {
            id: ChargePhase::CheckAlreadyCharged,
            name: "CheckAlreadyCharged",
            on_update: check_charged_update,
        },
        StateDescriptor {
            id: ChargePhase::PreCharge,
            name: "PreCharge",
            on_update: precharge_update,
        },
        StateDescriptor {
            id: ChargePhase::FastCharge,
            name: "FastCharge",
            on_update: fast_charge_update,
        },
        StateDescriptor {
            id: ChargePhase::ConstantVoltageHold,
            name: "ConstantVoltageHold",
            on_update: cv_hold_update,
        },
        StateDescriptor {
            id: ChargePhase::TimedTopOff,
            name: "TimedTopOff",
            on_update: top_off_update,
        },
        StateDescriptor {
            id: ChargePhase::Error,
            name: "Error",
            on_update: error_update,
        },
        StateDescriptor {
            id: ChargePhase::Finished,
            name: "Finished",
            on_update: finished_update,
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  Regulation helpers
// ═══════════════════════════════════════════════════════════════════════════

/// Bang-bang step around `target ± tolerance`.  Inside the band the duty is
/// held.
fn regulate_band(ctx: &mut ChargeContext, measured: i32, target: i32, tolerance: i32) {
    if measured < target.saturating_sub(tolerance) {
        step(ctx, true);
    } else if measured > target.saturating_add(tolerance) {
        step(ctx, false);
    }
}

/// One duty step.  A saturated controller keeps its previous value and the
/// phase simply holds for this iteration.
fn step(ctx: &mut ChargeContext, increase: bool) {
    if !ctx.duty.step_toward(increase) {
        warn!(
            "duty saturated at {:.3} ({})",
            ctx.duty.current_duty(),
            if increase { "up" } else { "down" }
        );
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  CHECK_FAULT
// ═══════════════════════════════════════════════════════════════════════════

fn check_fault_update(ctx: &mut ChargeContext) -> Option<ChargePhase> {
    let r = ctx.reading();
    if r.voltage_mv < ctx.config.thresholds.min_valid_mv {
        let n = ctx.active.number();
        let idx = ctx.active.index();
        ctx.show(
            StatusScreen::new()
                .line(format_args!("ERROR BATTERY n° {n}"))
                .line(format_args!("Vbatt[{idx}]= {}mV", r.voltage_mv)),
        );
        ctx.duty.off();
        ctx.raise(SafetyFault::BatteryMissing);
        return Some(ChargePhase::Error);
    }
    Some(ChargePhase::CheckAlreadyCharged)
}

// ═══════════════════════════════════════════════════════════════════════════
//  CHECK_ALREADY_CHARGED
// ═══════════════════════════════════════════════════════════════════════════

fn check_charged_update(ctx: &mut ChargeContext) -> Option<ChargePhase> {
    let r = ctx.reading();
    if r.voltage_mv > ctx.config.thresholds.alarm_mv {
        let n = ctx.active.number();
        let idx = ctx.active.index();
        info!("battery {n} already charged ({} mV)", r.voltage_mv);
        ctx.show(
            StatusScreen::new()
                .line(format_args!("BATTERY n° {n} CHARGED!"))
                .line(format_args!("Vbatt[{idx}]= {}mV", r.voltage_mv)),
        );
        ctx.duty.off();
        ctx.set_blink(BlinkCommand::Off);
        return Some(ChargePhase::Finished);
    }
    Some(ChargePhase::PreCharge)
}

// ═══════════════════════════════════════════════════════════════════════════
//  PRE_CHARGE
// ═══════════════════════════════════════════════════════════════════════════

fn precharge_update(ctx: &mut ChargeContext) -> Option<ChargePhase> {
    let r = ctx.reading();
    let t = ctx.config.thresholds;
    if r.voltage_mv >= t.precharge_ceiling_mv {
        return Some(ChargePhase::FastCharge);
    }

    if ctx.take_entry() {
        let idx = ctx.active.index();
        ctx.show(
            StatusScreen::new()
                .line(format_args!("BATTERY PRE-CHARGE..."))
                .line(format_args!("Vbatt[{idx}]= {}mV", r.voltage_mv)),
        );
        ctx.set_blink(BlinkCommand::Every(ctx.config.timing.blink_slow_ms));
        ctx.duty.off();
    }

    step(ctx, r.current_ma < t.precharge_current_ma);
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  FAST_CHARGE (constant current)
// ═══════════════════════════════════════════════════════════════════════════

const FAST_CHARGE_TITLE: &str = "BATTERY FAST CHARGING: CONST. CURRENT";

fn fast_charge_update(ctx: &mut ChargeContext) -> Option<ChargePhase> {
    let r = ctx.reading();
    let t = ctx.config.thresholds;
    if r.voltage_mv >= t.nominal_mv && r.current_ma >= t.fast_charge_exit_ma() {
        return Some(ChargePhase::ConstantVoltageHold);
    }

    if ctx.take_entry() {
        ctx.set_blink(BlinkCommand::Every(ctx.config.timing.blink_fast_ms));
    }

    regulate_band(
        ctx,
        r.current_ma,
        t.fast_charge_current_ma,
        t.current_tolerance_ma,
    );
    ctx.show_status(FAST_CHARGE_TITLE);
    ctx.set_delay(ctx.config.timing.regulation_delay_ms);
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  CONSTANT_VOLTAGE_HOLD
// ═══════════════════════════════════════════════════════════════════════════

const CV_TITLE: &str = "BATTERY MANT1: CONST. VOLTAGE";

fn cv_hold_update(ctx: &mut ChargeContext) -> Option<ChargePhase> {
    if ctx.take_entry() {
        ctx.set_blink(BlinkCommand::Every(ctx.config.timing.blink_rapid_ms));
    }

    let r = ctx.reading();
    let t = ctx.config.thresholds;
    if r.current_ma <= t.maintenance_current_ma {
        return Some(if ctx.config.top_off_enabled {
            ChargePhase::TimedTopOff
        } else {
            ChargePhase::Finished
        });
    }

    regulate_band(ctx, r.voltage_mv, t.nominal_mv, t.voltage_tolerance_mv);
    ctx.show_status(CV_TITLE);
    ctx.set_delay(ctx.config.timing.regulation_delay_ms);
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  TIMED_TOP_OFF
// ═══════════════════════════════════════════════════════════════════════════

fn top_off_update(ctx: &mut ChargeContext) -> Option<ChargePhase> {
    let r = ctx.reading();
    let t = ctx.config.thresholds;
    let timing = ctx.config.timing;
    if r.voltage_mv < t.nominal_mv {
        return Some(ChargePhase::Finished);
    }

    if ctx.take_entry() {
        ctx.top_off_remaining = timing.top_off_ticks();
        info!(
            "top-off for {} min",
            timing.top_off_duration_ms / 60_000
        );
    }
    if ctx.top_off_remaining == 0 {
        return Some(ChargePhase::Finished);
    }

    step(ctx, r.current_ma <= t.maintenance_current_ma);

    let minutes = u64::from(ctx.top_off_remaining) * u64::from(timing.regulation_delay_ms) / 60_000;
    let idx = ctx.active.index();
    let screen = StatusScreen::new()
        .line(format_args!("BATTERY MANT2"))
        .line(format_args!("Vbatt[{idx}]= {}mV", r.voltage_mv))
        .line(format_args!("Ibatt[{idx}]= {}mA", r.current_ma))
        .line(format_args!("{}", ctx.duty.describe()))
        .line(format_args!("Minutes... {minutes}"));
    ctx.show(screen);

    ctx.top_off_remaining -= 1;
    ctx.set_delay(timing.regulation_delay_ms);
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  ERROR
// ═══════════════════════════════════════════════════════════════════════════

fn error_update(ctx: &mut ChargeContext) -> Option<ChargePhase> {
    if ctx.take_entry() {
        match SafetyFault::first_in(ctx.fault_flags) {
            Some(fault) => error!(
                "battery {}: charge halted, {} (flags=0x{:02x})",
                ctx.active.number(),
                fault,
                ctx.fault_flags
            ),
            None => error!("battery {}: charge halted", ctx.active.number()),
        }
    }
    // No exit.  Output stays off until the board is reset.
    if ctx.duty.current_duty() != 0.0 {
        ctx.duty.off();
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  FINISHED
// ═══════════════════════════════════════════════════════════════════════════

fn finished_update(ctx: &mut ChargeContext) -> Option<ChargePhase> {
    let entry = ctx.take_entry();
    let slot = ctx.active;

    match slot.next() {
        Some(next) => {
            if entry {
                ctx.show(
                    StatusScreen::new()
                        .line(format_args!("BATTERY {} CHARGED!", slot.number())),
                );
            }
            ctx.duty.off();
            ctx.commands.relay = Some(true);
            ctx.commands.latch[slot.index()] = Some(true);
            info!("battery {} charged, moving to battery {}", slot.number(), next.number());
            ctx.active = next;
            Some(ChargePhase::CheckFault)
        }
        None => {
            if entry {
                let r = ctx.reading();
                let idx = slot.index();
                ctx.show(
                    StatusScreen::new()
                        .line(format_args!("BATTERY FULL CHARGED!!!"))
                        .line(format_args!("Vbatt[{idx}]= {}mV", r.voltage_mv))
                        .line(format_args!("Ibatt[{idx}]= {}mA", r.current_ma)),
                );
                ctx.duty.off();
                ctx.commands.relay = Some(false);
                ctx.commands.latch[slot.index()] = Some(true);
                ctx.set_blink(BlinkCommand::Off);
                info!("all batteries charged");
            }
            ctx.set_delay(ctx.config.timing.finished_idle_ms);
            None
        }
    }
}
