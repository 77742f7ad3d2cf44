//! Unified error types for the heater control core.
//!
//! A single `Error` enum that every subsystem can convert into, keeping the
//! control loop's error handling uniform. All variants are `Copy` so they
//! can be passed through the session and the safety supervisor without
//! allocation.
//!
//! Note that most of the control core never surfaces these: sensor faults
//! degrade to "temperature unknown" and out-of-range settings are clamped.
//! Only a failed heater-pin write escalates, and it does so by moving the
//! session into its `Error` state.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A temperature sensor transaction failed or returned garbage.
    Sensor(SensorError),
    /// The heater output could not be driven.
    Actuator(ActuatorError),
    /// A calibration point could not be recorded.
    Calibration(CalibrationError),
    /// Configuration is invalid.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Actuator(e) => write!(f, "actuator: {e}"),
            Self::Calibration(e) => write!(f, "calibration: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// SPI / I2C transaction failed.
    Bus,
    /// Thermocouple input is open (probe disconnected).
    OpenCircuit,
    /// The device flagged its own reading as invalid.
    InvalidData,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bus => write!(f, "bus transaction failed"),
            Self::OpenCircuit => write!(f, "thermocouple open"),
            Self::InvalidData => write!(f, "device reported invalid data"),
        }
    }
}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Actuator errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorError {
    /// Writing the heater (or indicator) GPIO failed.
    OutputWriteFailed,
    /// The duty-cycle engine is latched faulted and refuses to energize.
    Faulted,
}

impl fmt::Display for ActuatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutputWriteFailed => write!(f, "heater output write failed"),
            Self::Faulted => write!(f, "heater output latched faulted"),
        }
    }
}

impl From<ActuatorError> for Error {
    fn from(e: ActuatorError) -> Self {
        Self::Actuator(e)
    }
}

// ---------------------------------------------------------------------------
// Calibration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationError {
    /// The forced infrared read was rejected or implausible.
    InvalidReading,
    /// A measured point is still empty.
    MissingPoint,
    /// Both measured points are identical; slope is undefined.
    PointsNotDistinct,
}

impl fmt::Display for CalibrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidReading => write!(f, "invalid infrared reading"),
            Self::MissingPoint => write!(f, "measured point missing"),
            Self::PointsNotDistinct => write!(f, "measured points identical"),
        }
    }
}

impl From<CalibrationError> for Error {
    fn from(e: CalibrationError) -> Self {
        Self::Calibration(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
