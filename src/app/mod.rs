//! Application core: the charge loop and its hardware boundary.
//!
//! All interaction with the board happens through the **port traits** in
//! [`ports`], so the [`Sequencer`](sequencer::Sequencer) runs unchanged on
//! the host against a simulated battery.

pub mod ports;
pub mod sequencer;

pub use sequencer::Sequencer;
