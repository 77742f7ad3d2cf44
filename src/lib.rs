//! Heizbox heater control library.
//!
//! Hardware-independent heater logic: the ZVS duty-cycle engine, the
//! heating session state machine and the contact/infrared temperature
//! pipeline with two-point calibration. Everything talks to hardware
//! through `embedded-hal` traits, so the same code runs on the ESP32 and
//! in host tests. ESP-IDF specific code is gated behind the `espidf`
//! feature.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod calibration;
pub mod config;
pub mod drivers;
pub mod error;
pub mod safety;
pub mod sensors;
pub mod session;

pub use app::service::HeaterService;
pub use config::HeaterConfig;
pub use error::{Error, Result};
pub use session::{HeaterSession, SessionState, StopReason};
