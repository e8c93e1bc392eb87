//! End-to-end charge runs against the simulated plant.

use embedded_hal::delay::DelayNs;
use lipo_charger::app::Sequencer;
use lipo_charger::app::ports::IndicatorId;
use lipo_charger::config::ChargerConfig;
use lipo_charger::error::SafetyFault;
use lipo_charger::fsm::ChargePhase;
use lipo_charger::indicator::IndicatorState;
use lipo_charger::sensors::Slot;

use crate::mock_hw::{BatteryPlant, SimCell, SimClock, SimDelay};

/// Generous bound on a full two-cell run (about 4 800 iterations).
const MAX_ITERATIONS: u64 = 20_000;

struct Bench {
    plant: BatteryPlant,
    delay: SimDelay,
}

impl Bench {
    fn new(cells: [SimCell; 2]) -> Self {
        let clock = SimClock::default();
        Self {
            plant: BatteryPlant::new(clock.clone(), cells),
            delay: SimDelay::new(clock),
        }
    }

    fn standard() -> Self {
        Self::new([SimCell::at(2990.0), SimCell::at(2990.0)])
    }

    /// One iteration plus the yield it asked for.
    fn step(&mut self, seq: &mut Sequencer<'_>) -> u32 {
        let ms = seq.iterate(&mut self.plant);
        self.delay.delay_ms(ms);
        ms
    }

    /// Iterate until `done` holds, returning the iteration count.
    fn run_until(
        &mut self,
        seq: &mut Sequencer<'_>,
        mut done: impl FnMut(&Sequencer<'_>) -> bool,
    ) -> u64 {
        for n in 1..=MAX_ITERATIONS {
            self.step(seq);
            if done(seq) {
                return n;
            }
        }
        panic!("condition not reached; stuck in {:?}", seq.phase());
    }
}

fn started<'a>(bench: &mut Bench, config: ChargerConfig, indicator: &'a IndicatorState) -> Sequencer<'a> {
    let mut seq = Sequencer::new(config, indicator).unwrap();
    seq.start(&mut bench.plant);
    seq
}

fn all_charged(seq: &Sequencer<'_>) -> bool {
    seq.phase() == ChargePhase::Finished && seq.active_slot() == Slot::Second
}

// ── Full runs ─────────────────────────────────────────────────

#[test]
fn charges_both_cells_in_sequence() {
    let indicator = IndicatorState::new();
    let mut bench = Bench::standard();
    let mut seq = started(&mut bench, ChargerConfig::default(), &indicator);

    let mut phases = Vec::new();
    let mut max_duty = 0.0f64;
    for _ in 0..MAX_ITERATIONS {
        bench.step(&mut seq);
        max_duty = max_duty.max(seq.duty());
        let key = (seq.active_slot(), seq.phase());
        if phases.last() != Some(&key) {
            phases.push(key);
        }
        if all_charged(&seq) {
            break;
        }
    }

    use ChargePhase::*;
    assert_eq!(
        phases,
        [
            (Slot::First, CheckAlreadyCharged),
            (Slot::First, PreCharge),
            (Slot::First, FastCharge),
            (Slot::First, ConstantVoltageHold),
            (Slot::First, Finished),
            (Slot::Second, CheckFault),
            (Slot::Second, CheckAlreadyCharged),
            (Slot::Second, PreCharge),
            (Slot::Second, FastCharge),
            (Slot::Second, ConstantVoltageHold),
            (Slot::Second, Finished),
        ]
    );
    assert_eq!(seq.fault_flags(), 0);
    assert!(max_duty > 0.0 && max_duty <= 1.0);

    // Both cells end near float voltage.
    for cell in &bench.plant.cells {
        assert!((4050.0..4150.0).contains(&cell.ocv_mv), "ocv {}", cell.ocv_mv);
    }

    // The Finished entry for cell 2 runs on the next iteration.
    bench.step(&mut seq);
    assert_eq!(seq.duty(), 0.0);
    assert_eq!(bench.plant.duty, 0.0);

    // Relay released at start, energised for cell 2, released at the end.
    assert_eq!(bench.plant.relay_writes, [false, true, false]);
    assert!(!bench.plant.relay);

    // Both charged LEDs latched, blink timer stopped.
    assert!(bench.plant.led(IndicatorId::Led1));
    assert!(bench.plant.led(IndicatorId::Led2));
    assert_eq!(
        bench.plant.timer_changes,
        [Some(1000), Some(500), Some(100), Some(1000), Some(500), Some(100), None]
    );
    assert_eq!(seq.blink_period(), None);

    let last = bench.plant.last_frame().unwrap();
    assert_eq!(last[0], "BATTERY FULL CHARGED!!!");
    assert!(last[1].starts_with("Vbatt[1]= "));
    let titles = bench.plant.frame_titles();
    assert!(titles.contains(&"BATTERY 1 CHARGED!"));
    assert!(titles.contains(&"BATTERY PRE-CHARGE..."));
    assert!(titles.contains(&"BATTERY FAST CHARGING: CONST. CURRENT"));
    assert!(titles.contains(&"BATTERY MANT1: CONST. VOLTAGE"));
}

#[test]
fn finished_state_idles_and_keeps_feeding_the_watchdog() {
    let indicator = IndicatorState::new();
    let mut bench = Bench::standard();
    let mut seq = started(&mut bench, ChargerConfig::default(), &indicator);
    bench.run_until(&mut seq, all_charged);
    bench.step(&mut seq);

    let feeds = bench.plant.feeds;
    let frames = bench.plant.frames.len();
    for _ in 0..10 {
        assert_eq!(bench.step(&mut seq), 2000);
    }
    assert_eq!(seq.phase(), ChargePhase::Finished);
    assert_eq!(bench.plant.feeds, feeds + 10);
    // The summary is drawn once on entry.
    assert_eq!(bench.plant.frames.len(), frames);

    assert_eq!(bench.plant.watchdog_timeout_ms, Some(5000));
    assert!(bench.plant.max_feed_gap_ms <= 2000);
}

#[test]
fn timed_top_off_runs_before_finishing() {
    let indicator = IndicatorState::new();
    let mut bench = Bench::standard();
    let mut config = ChargerConfig::default();
    config.top_off_enabled = true;
    config.timing.top_off_duration_ms = 10_000;
    let mut seq = started(&mut bench, config, &indicator);

    bench.run_until(&mut seq, |s| s.phase() == ChargePhase::TimedTopOff);
    assert_eq!(seq.active_slot(), Slot::First);

    let mut top_off_ticks = 0;
    while seq.phase() == ChargePhase::TimedTopOff {
        bench.step(&mut seq);
        top_off_ticks += 1;
        assert!(top_off_ticks <= 21, "top-off did not expire");
    }
    assert_eq!(seq.phase(), ChargePhase::Finished);
    assert!(bench.plant.frame_titles().contains(&"BATTERY MANT2"));

    bench.run_until(&mut seq, all_charged);
    assert_eq!(seq.fault_flags(), 0);
}

// ── Slot handling ─────────────────────────────────────────────

#[test]
fn charged_first_cell_is_skipped() {
    let indicator = IndicatorState::new();
    let mut bench = Bench::new([SimCell::at(4700.0), SimCell::at(2990.0)]);
    let mut seq = started(&mut bench, ChargerConfig::default(), &indicator);

    bench.step(&mut seq); // CheckFault
    bench.step(&mut seq); // CheckAlreadyCharged
    assert_eq!(seq.phase(), ChargePhase::Finished);
    assert_eq!(bench.plant.last_frame().unwrap()[0], "BATTERY n° 1 CHARGED!");
    assert_eq!(bench.plant.timer_period, None);

    bench.step(&mut seq);
    assert_eq!(seq.active_slot(), Slot::Second);
    assert_eq!(seq.phase(), ChargePhase::CheckFault);
    assert!(bench.plant.relay);
    assert!(bench.plant.led(IndicatorId::Led1));

    // Pre-charge on cell 2 restarts the blink timer.
    bench.run_until(&mut seq, |s| s.phase() == ChargePhase::PreCharge);
    bench.step(&mut seq);
    assert_eq!(bench.plant.timer_period, Some(1000));
    assert_eq!(indicator.snapshot().slot, Slot::Second);
    assert_eq!(indicator.snapshot().period_ms, Some(1000));

    bench.run_until(&mut seq, all_charged);
    assert_eq!(seq.fault_flags(), 0);
}

#[test]
fn indicator_snapshot_follows_the_active_slot() {
    let indicator = IndicatorState::new();
    let mut bench = Bench::standard();
    let mut seq = started(&mut bench, ChargerConfig::default(), &indicator);
    assert_eq!(indicator.snapshot().slot, Slot::First);
    assert_eq!(indicator.snapshot().period_ms, Some(1000));

    bench.run_until(&mut seq, |s| s.phase() == ChargePhase::ConstantVoltageHold);
    bench.step(&mut seq);
    assert_eq!(indicator.snapshot().period_ms, Some(100));

    bench.run_until(&mut seq, |s| s.active_slot() == Slot::Second);
    assert_eq!(indicator.snapshot().slot, Slot::Second);

    // Blinking on slot 1 leaves the latched LED 1 alone.
    indicator.on_timer(&bench.plant);
    indicator.on_timer(&bench.plant);
    assert!(bench.plant.led(IndicatorId::Led1));
}

// ── Faults ────────────────────────────────────────────────────

#[test]
fn missing_cell_halts_in_error() {
    let indicator = IndicatorState::new();
    let mut bench = Bench::new([SimCell::missing(), SimCell::at(2990.0)]);
    let mut seq = started(&mut bench, ChargerConfig::default(), &indicator);

    bench.step(&mut seq);
    assert_eq!(seq.phase(), ChargePhase::Error);
    assert_eq!(seq.fault_flags(), SafetyFault::BatteryMissing.mask());
    let frame = bench.plant.last_frame().unwrap();
    assert_eq!(frame[0], "ERROR BATTERY n° 1");
    assert_eq!(frame[1], "Vbatt[0]= 0mV");

    for _ in 0..50 {
        assert_eq!(bench.step(&mut seq), 10);
    }
    assert_eq!(seq.phase(), ChargePhase::Error);
    assert_eq!(seq.active_slot(), Slot::First);
    assert_eq!(bench.plant.duty, 0.0);
    assert!(!bench.plant.relay);
}

#[test]
fn over_current_spike_trips_the_supervisor() {
    let indicator = IndicatorState::new();
    let mut bench = Bench::standard();
    let mut seq = started(&mut bench, ChargerConfig::default(), &indicator);

    bench.run_until(&mut seq, |s| s.phase() == ChargePhase::FastCharge);
    for _ in 0..50 {
        bench.step(&mut seq);
    }
    assert!(bench.plant.duty > 0.0);

    bench.plant.current_offset_ma = 2000.0;
    bench.step(&mut seq);
    assert_eq!(seq.phase(), ChargePhase::Error);
    assert_ne!(seq.fault_flags() & SafetyFault::OverCurrent.mask(), 0);
    assert_eq!(seq.duty(), 0.0);
    assert_eq!(bench.plant.duty, 0.0);

    // Clearing the spike does not recover.
    bench.plant.current_offset_ma = 0.0;
    for _ in 0..20 {
        bench.step(&mut seq);
    }
    assert_eq!(seq.phase(), ChargePhase::Error);
    assert_eq!(bench.plant.duty, 0.0);
}

#[test]
fn over_voltage_during_constant_voltage_trips_the_supervisor() {
    let indicator = IndicatorState::new();
    let mut bench = Bench::standard();
    let mut seq = started(&mut bench, ChargerConfig::default(), &indicator);

    bench.run_until(&mut seq, |s| s.phase() == ChargePhase::ConstantVoltageHold);
    bench.plant.cells[0].ocv_mv = 4700.0;
    bench.step(&mut seq);

    assert_eq!(seq.phase(), ChargePhase::Error);
    assert_ne!(seq.fault_flags() & SafetyFault::OverVoltage.mask(), 0);
    assert_eq!(bench.plant.duty, 0.0);
}

#[test]
fn display_failure_does_not_change_the_charge() {
    let ok_indicator = IndicatorState::new();
    let broken_indicator = IndicatorState::new();
    let mut ok = Bench::standard();
    let mut broken = Bench::standard();
    broken.plant.fail_display = true;

    let mut a = started(&mut ok, ChargerConfig::default(), &ok_indicator);
    let mut b = started(&mut broken, ChargerConfig::default(), &broken_indicator);

    for _ in 0..1500 {
        let da = ok.step(&mut a);
        let db = broken.step(&mut b);
        assert_eq!(da, db);
        assert_eq!(a.phase(), b.phase());
        assert_eq!(a.duty(), b.duty());
    }
    assert!(!ok.plant.frames.is_empty());
    assert!(broken.plant.frames.is_empty());
}

// ── Loop ──────────────────────────────────────────────────────

#[test]
#[should_panic(expected = "delay budget exhausted")]
fn run_yields_between_iterations() {
    let indicator = IndicatorState::new();
    let clock = SimClock::default();
    let mut plant = BatteryPlant::standard(clock.clone());
    let mut delay = SimDelay::with_budget(clock, 100);
    let mut seq = Sequencer::new(ChargerConfig::default(), &indicator).unwrap();
    seq.start(&mut plant);
    seq.run(&mut plant, &mut delay);
}

#[test]
fn invalid_config_is_rejected_before_touching_hardware() {
    let indicator = IndicatorState::new();
    let mut config = ChargerConfig::default();
    config.timing.regulation_delay_ms = 0;
    assert!(Sequencer::new(config, &indicator).is_err());
}
