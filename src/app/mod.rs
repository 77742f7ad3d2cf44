//! Application core: heater orchestration with no platform I/O.
//!
//! This module holds the heater-facing business rules: session
//! orchestration, heat-cycle alternation, safety evaluation, telemetry and
//! command handling. All interaction with the platform happens through
//! **port traits** defined in [`ports`], keeping this layer testable
//! without real peripherals.

pub mod commands;
pub mod events;
pub mod mailbox;
pub mod ports;
pub mod service;
