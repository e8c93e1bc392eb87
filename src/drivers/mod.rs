//! Actuator drivers, hardware initialisation, and peripheral helpers.

pub mod charge_pwm;
pub mod hw_init;
pub mod hw_timer;
pub mod indicator_led;
pub mod relay;
pub mod status_display;
pub mod watchdog;
