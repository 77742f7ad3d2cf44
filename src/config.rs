//! Heater configuration parameters
//!
//! All tunable parameters for the heater core. The settings layer owns
//! persistence; this module only defines the shape, the defaults and the
//! range checks applied before a value is persisted.

use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;
use crate::safety::CeilingPolicy;
use crate::sensors::TemperatureSource;

/// Shortest duty-cycle period the engine accepts.
pub const MIN_PERIOD_MS: u32 = 100;

/// A ceiling limit equal to this value disables the temperature ceiling.
pub const CEILING_DISABLED_C: u16 = 420;

/// Complete heater configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeaterConfig {
    pub duty_cycle: DutyCycleSettings,
    pub session: SessionSettings,
    pub sensors: SensorSettings,
    pub calibration: CalibrationPoints,
    pub ceiling: CeilingSettings,
    /// Telemetry emission interval (milliseconds).
    pub telemetry_interval_ms: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DutyCycleSettings {
    /// Length of one on/off cycle in milliseconds.
    pub period_ms: u32,
    /// Quiet time reserved at the tail of the off phase for sensor reads.
    pub sensor_window_ms: u32,
    /// Share of the period spent energized (0-100%).
    pub power_percent: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Heating time after which a session stops by itself.
    pub auto_stop_ms: u32,
    /// How long a pause may last before the cycle is force-finalized.
    pub pause_timeout_ms: u32,
    /// Sessions shorter than this are not counted as cycles.
    pub min_cycle_duration_ms: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorSettings {
    /// Contact (thermocouple) read interval.
    pub contact_read_interval_ms: u32,
    /// Infrared read interval.
    pub infrared_read_interval_ms: u32,
    /// Infrared emissivity in percent (10-100).
    pub emissivity_percent: u8,
    /// Correction applied to the raw infrared value before calibration,
    /// in percent (`raw * (1 + pct / 100)`).
    pub infrared_correction_percent: i16,
    /// Read the contact sensor on its interval even while the heater is
    /// switching, not only inside the sensor window.
    pub always_measure: bool,
    /// Contact temperature that raises the one-shot "click" event.
    pub click_threshold_c: f32,
}

/// Two-point infrared calibration: stored (measured, actual) pairs.
/// A measured value of 0 means "slot empty".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalibrationPoints {
    pub measured_a: u16,
    pub actual_a: u16,
    pub measured_b: u16,
    pub actual_b: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CeilingSettings {
    pub policy: CeilingPolicy,
    pub source: TemperatureSource,
    /// Temperature limit while heat cycle 1 is selected.
    pub limit_cycle_1_c: u16,
    /// Temperature limit while heat cycle 2 is selected.
    pub limit_cycle_2_c: u16,
}

impl CeilingSettings {
    /// Limit for the given heat cycle, or `None` when the ceiling is off.
    pub fn limit_for_cycle(&self, cycle: u8) -> Option<f32> {
        let limit = if cycle == 2 {
            self.limit_cycle_2_c
        } else {
            self.limit_cycle_1_c
        };
        (limit != CEILING_DISABLED_C).then_some(f32::from(limit))
    }
}

impl Default for HeaterConfig {
    fn default() -> Self {
        Self {
            duty_cycle: DutyCycleSettings {
                period_ms: 1000,
                sensor_window_ms: 200,
                power_percent: 100,
            },
            session: SessionSettings {
                auto_stop_ms: 120_000,
                pause_timeout_ms: 5_000,
                min_cycle_duration_ms: 10_000,
            },
            sensors: SensorSettings {
                contact_read_interval_ms: 220,
                infrared_read_interval_ms: 100,
                emissivity_percent: 96,
                infrared_correction_percent: 0,
                always_measure: false,
                click_threshold_c: 190.0,
            },
            calibration: CalibrationPoints {
                measured_a: 0,
                actual_a: 150,
                measured_b: 0,
                actual_b: 200,
            },
            ceiling: CeilingSettings {
                policy: CeilingPolicy::Advisory,
                source: TemperatureSource::Infrared,
                limit_cycle_1_c: 210,
                limit_cycle_2_c: 225,
            },
            telemetry_interval_ms: 1_000,
        }
    }
}

impl HeaterConfig {
    /// Range-check every field.
    ///
    /// The control core clamps silently; this is the stricter gate used by
    /// storage adapters so that a bad value never gets persisted.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let d = &self.duty_cycle;
        if !(MIN_PERIOD_MS..=60_000).contains(&d.period_ms) {
            return Err(ConfigError::ValidationFailed(
                "period_ms must be 100-60000",
            ));
        }
        if d.sensor_window_ms >= d.period_ms {
            return Err(ConfigError::ValidationFailed(
                "sensor_window_ms must be below period_ms",
            ));
        }
        if d.power_percent > 100 {
            return Err(ConfigError::ValidationFailed(
                "power_percent must be 0-100",
            ));
        }

        let s = &self.session;
        if !(1_000..=3_600_000).contains(&s.auto_stop_ms) {
            return Err(ConfigError::ValidationFailed(
                "auto_stop_ms must be 1000-3600000",
            ));
        }
        if !(1_000..=600_000).contains(&s.pause_timeout_ms) {
            return Err(ConfigError::ValidationFailed(
                "pause_timeout_ms must be 1000-600000",
            ));
        }
        if s.min_cycle_duration_ms > s.auto_stop_ms {
            return Err(ConfigError::ValidationFailed(
                "min_cycle_duration_ms must not exceed auto_stop_ms",
            ));
        }

        let n = &self.sensors;
        if !(10..=10_000).contains(&n.contact_read_interval_ms)
            || !(10..=10_000).contains(&n.infrared_read_interval_ms)
        {
            return Err(ConfigError::ValidationFailed(
                "sensor read intervals must be 10-10000",
            ));
        }
        if !(10..=100).contains(&n.emissivity_percent) {
            return Err(ConfigError::ValidationFailed(
                "emissivity_percent must be 10-100",
            ));
        }
        if !(-50..=50).contains(&n.infrared_correction_percent) {
            return Err(ConfigError::ValidationFailed(
                "infrared_correction_percent must be -50..50",
            ));
        }
        if !n.click_threshold_c.is_finite() || !(0.0..=500.0).contains(&n.click_threshold_c) {
            return Err(ConfigError::ValidationFailed(
                "click_threshold_c must be 0-500",
            ));
        }

        let c = &self.ceiling;
        for limit in [c.limit_cycle_1_c, c.limit_cycle_2_c] {
            if !(50..=CEILING_DISABLED_C).contains(&limit) {
                return Err(ConfigError::ValidationFailed(
                    "ceiling limits must be 50-420",
                ));
            }
        }

        if !(100..=60_000).contains(&self.telemetry_interval_ms) {
            return Err(ConfigError::ValidationFailed(
                "telemetry_interval_ms must be 100-60000",
            ));
        }
        Ok(())
    }
}
