//! Safety supervisor.
//!
//! Runs every tick after the session update and derives a fault bitmask
//! from the latest temperatures and the heater output state. Faults are
//! re-evaluated each tick and clear themselves once the condition is gone,
//! so several can be active at once.
//!
//! ## Temperature ceiling
//!
//! The ceiling is a policy, not a fixed behaviour:
//!
//! - [`CeilingPolicy::Advisory`]: the session only reports "limit reached"
//!   and the supervisor raises `OverTemperature`. The caller decides.
//! - [`CeilingPolicy::Enforced`]: the session additionally stops heating
//!   (finalized) the moment the limit is reached.

use core::fmt;

use log::{error, info};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CeilingPolicy {
    #[default]
    Advisory,
    Enforced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SafetyFault {
    /// Ceiling temperature reached.
    OverTemperature = 0b0000_0001,
    /// Heating with no valid ceiling temperature.
    SensorUnavailable = 0b0000_0010,
    /// The heater output could not be driven.
    OutputFault = 0b0000_0100,
}

impl SafetyFault {
    pub const fn mask(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for SafetyFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OverTemperature => write!(f, "over temperature"),
            Self::SensorUnavailable => write!(f, "temperature unknown while heating"),
            Self::OutputFault => write!(f, "heater output fault"),
        }
    }
}

/// Per-tick inputs to [`SafetySupervisor::evaluate`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SafetyInputs {
    /// Temperature from the configured ceiling source.
    pub temperature_c: Option<f32>,
    /// Active ceiling, `None` when disabled.
    pub limit_c: Option<f32>,
    pub heating: bool,
    pub output_faulted: bool,
}

/// Whether `temperature` is above `limit`. Sitting exactly on the limit
/// does not count. Unknown temperature or a disabled limit never count as
/// reached.
pub fn limit_reached(temperature_c: Option<f32>, limit_c: Option<f32>) -> bool {
    matches!((temperature_c, limit_c), (Some(t), Some(l)) if t > l)
}

#[derive(Debug, Default)]
pub struct SafetySupervisor {
    faults: u8,
}

impl SafetySupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the updated fault bitmask.
    pub fn evaluate(&mut self, inputs: &SafetyInputs) -> u8 {
        self.eval_fault(
            SafetyFault::OverTemperature,
            limit_reached(inputs.temperature_c, inputs.limit_c),
        );
        self.eval_fault(
            SafetyFault::SensorUnavailable,
            inputs.heating && inputs.temperature_c.is_none(),
        );
        self.eval_fault(SafetyFault::OutputFault, inputs.output_faulted);
        self.faults
    }

    pub fn faults(&self) -> u8 {
        self.faults
    }

    pub fn has_faults(&self) -> bool {
        self.faults != 0
    }

    pub fn has_fault(&self, fault: SafetyFault) -> bool {
        self.faults & fault.mask() != 0
    }

    fn eval_fault(&mut self, fault: SafetyFault, condition: bool) {
        if condition {
            if self.faults & fault.mask() == 0 {
                error!("SAFETY FAULT SET: {fault}");
            }
            self.faults |= fault.mask();
        } else {
            if self.faults & fault.mask() != 0 {
                info!("SAFETY FAULT CLEARED: {fault}");
            }
            self.faults &= !fault.mask();
        }
    }
}
