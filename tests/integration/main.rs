//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises the heater service
//! against mock hardware. All tests run on the host with a manual clock;
//! no real pins or sensors are required.

mod heating_flow_tests;
mod mock_hw;
mod service_tests;
