//! Integration test driver for `tests/integration/` submodule.
//!
//! `mock_hw` provides a simulated two-cell board; `sequencer_tests` runs
//! complete charge cycles against it.  All tests run on the host with no
//! real hardware required.

mod mock_hw;
mod sequencer_tests;
