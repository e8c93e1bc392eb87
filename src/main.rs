//! LiPo Charger Firmware: main entry point
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  HardwareAdapter: ADC · charge PWM · relay · LEDs · TWDT ·     │
//! │                   blink timer · console display                │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              Sequencer (pure logic)                    │    │
//! │  │  Measurement · Safety · FSM · Duty controller          │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::Result;
use log::{error, info, warn};

use lipo_charger::adapters::hardware::HardwareAdapter;
use lipo_charger::app::Sequencer;
use lipo_charger::config::ChargerConfig;
use lipo_charger::drivers::hw_init;
use lipo_charger::drivers::hw_timer::BlinkBinding;
use lipo_charger::drivers::indicator_led::IndicatorLeds;
use lipo_charger::indicator::IndicatorState;

/// Shared with the blink timer callback.
static INDICATOR: IndicatorState = IndicatorState::new();
static BLINK: BlinkBinding = BlinkBinding::new(&INDICATOR, IndicatorLeds::board());

/// Build-time configuration override (JSON), e.g. for a LiPo pack.
const CONFIG_OVERRIDE: Option<&str> = option_env!("LIPO_CHARGER_CONFIG");

fn load_config() -> ChargerConfig {
    match CONFIG_OVERRIDE {
        Some(json) => match ChargerConfig::from_json(json) {
            Ok(cfg) => {
                info!("Config loaded from build override");
                cfg
            }
            Err(e) => {
                warn!("Config override rejected ({}), using defaults", e);
                ChargerConfig::default()
            }
        },
        None => ChargerConfig::default(),
    }
}

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  LiPo Charger v{}                  ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Peripherals ────────────────────────────────────────
    if let Err(e) = hw_init::init_peripherals() {
        // Without the charge path there is nothing safe to do.  Halt with
        // the outputs at their reset state; the watchdog is not armed yet.
        error!("HAL init failed: {}, halting", e);
        loop {
            esp_idf_hal::delay::FreeRtos::delay_ms(1000);
        }
    }
    let mut hw = HardwareAdapter::new(&BLINK);

    // ── 3. Config + sequencer ─────────────────────────────────
    let config = load_config();
    let t = config.thresholds;
    info!(
        "Pack: nominal {} mV, fast {} mA, pre-charge {} mA, maintenance {} mA",
        t.nominal_mv, t.fast_charge_current_ma, t.precharge_current_ma, t.maintenance_current_ma
    );
    let mut sequencer = Sequencer::new(config, &INDICATOR)?;

    // ── 4. Run ────────────────────────────────────────────────
    sequencer.start(&mut hw);
    let mut delay = esp_idf_hal::delay::FreeRtos;
    sequencer.run(&mut hw, &mut delay)
}
