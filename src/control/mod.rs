//! Charge-path control.

pub mod duty;

pub use duty::{DutyController, DUTY_STEP};
