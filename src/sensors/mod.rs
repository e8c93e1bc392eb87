//! Sensor subsystem: the battery Measurement Unit.
//!
//! Produces one [`BatteryReading`] per Sequencer iteration for the cell
//! currently routed through the relay.

pub mod battery;

pub use battery::{BatteryReading, BatterySlot, MeasurementUnit, Slot};
