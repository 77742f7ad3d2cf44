//! Two-point linear calibration for the infrared sensor.
//!
//! The infrared reading depends on surface emissivity and optics, so the
//! user "clicks" two reference temperatures (known from the contact sensor
//! or the cap's click point) while heating. Each click stores the raw IR
//! value next to the known actual value:
//!
//! ```text
//!   actual = raw * factor * slope + offset
//!   slope  = (actual_b - actual_a) / (measured_b - measured_a)
//!   offset = actual_a - slope * measured_a
//! ```
//!
//! `factor` is the secondary ambient correction (`1 + percent / 100`).

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::config::CalibrationPoints;
use crate::error::CalibrationError;

/// Measured values above this are treated as bogus clicks.
const MAX_PLAUSIBLE_MEASURED: f32 = 1000.0;

const DEFAULT_ACTUAL_A: u16 = 150;
const DEFAULT_ACTUAL_B: u16 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CalibrationPoint {
    /// Raw infrared reading, 0 when the slot is empty.
    pub measured: u16,
    /// Reference temperature the reading corresponds to.
    pub actual: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CalibrationSlot {
    A,
    B,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TwoPointCalibration {
    a: CalibrationPoint,
    b: CalibrationPoint,
    slope: f32,
    offset: f32,
    computable: bool,
    correction_factor: f32,
}

impl Default for TwoPointCalibration {
    fn default() -> Self {
        Self {
            a: CalibrationPoint {
                measured: 0,
                actual: DEFAULT_ACTUAL_A,
            },
            b: CalibrationPoint {
                measured: 0,
                actual: DEFAULT_ACTUAL_B,
            },
            slope: 1.0,
            offset: 0.0,
            computable: false,
            correction_factor: 1.0,
        }
    }
}

impl TwoPointCalibration {
    /// Restore persisted points and derive slope/offset from them.
    pub fn from_points(points: CalibrationPoints, correction_percent: i16) -> Self {
        let mut cal = Self {
            a: CalibrationPoint {
                measured: points.measured_a,
                actual: points.actual_a,
            },
            b: CalibrationPoint {
                measured: points.measured_b,
                actual: points.actual_b,
            },
            ..Self::default()
        };
        cal.set_correction_percent(correction_percent);
        // Incomplete persisted points simply leave the identity mapping.
        let _ = cal.compute();
        cal
    }

    /// Recompute slope/offset from the stored points.
    ///
    /// Leaves the previous mapping in place when a point is missing or the
    /// measured values coincide.
    pub fn compute(&mut self) -> Result<(), CalibrationError> {
        let (ma, mb) = (self.a.measured, self.b.measured);
        if ma == 0 || mb == 0 {
            self.computable = false;
            return Err(CalibrationError::MissingPoint);
        }
        if ma == mb {
            self.computable = false;
            return Err(CalibrationError::PointsNotDistinct);
        }
        let slope = (f32::from(self.b.actual) - f32::from(self.a.actual))
            / (f32::from(mb) - f32::from(ma));
        self.slope = slope;
        self.offset = f32::from(self.a.actual) - slope * f32::from(ma);
        self.computable = true;
        Ok(())
    }

    /// Store a reading for `actual` and recompute.
    ///
    /// Slot choice: the slot whose actual already equals `actual`,
    /// otherwise the first empty slot, preferring A; B when both are
    /// taken.
    pub fn mark(&mut self, measured: f32, actual: u16) -> Result<CalibrationSlot, CalibrationError> {
        if !measured.is_finite() || measured > MAX_PLAUSIBLE_MEASURED {
            warn!("IR calibration: invalid measurement {measured}, ignored");
            return Err(CalibrationError::InvalidReading);
        }
        // Zero marks an empty slot, so anything rounding to it is rejected.
        let rounded = measured.round();
        if rounded < 1.0 {
            warn!("IR calibration: invalid measurement {measured}, ignored");
            return Err(CalibrationError::InvalidReading);
        }
        let measured = rounded as u16;

        let slot = if actual == self.a.actual {
            CalibrationSlot::A
        } else if actual == self.b.actual {
            CalibrationSlot::B
        } else if self.a.measured == 0 {
            CalibrationSlot::A
        } else {
            CalibrationSlot::B
        };
        let point = match slot {
            CalibrationSlot::A => &mut self.a,
            CalibrationSlot::B => &mut self.b,
        };
        *point = CalibrationPoint { measured, actual };
        info!("IR calibration point {slot:?}: measured={measured} actual={actual}");

        match self.compute() {
            Ok(()) => info!(
                "IR calibration: slope={:.4} offset={:.2}",
                self.slope, self.offset
            ),
            Err(e) => info!("IR calibration not updated: {e}"),
        }
        Ok(slot)
    }

    /// Reset both points and return to the identity mapping.
    pub fn clear(&mut self) {
        let correction_factor = self.correction_factor;
        *self = Self {
            correction_factor,
            ..Self::default()
        };
    }

    /// Map a raw reading to a calibrated temperature.
    pub fn apply(&self, raw: f32) -> f32 {
        raw * self.correction_factor * self.slope + self.offset
    }

    pub fn set_correction_percent(&mut self, percent: i16) {
        self.correction_factor = 1.0 + f32::from(percent) / 100.0;
    }

    pub fn slope(&self) -> f32 {
        self.slope
    }

    pub fn offset(&self) -> f32 {
        self.offset
    }

    /// Whether both points are present and distinct.
    pub fn is_computable(&self) -> bool {
        self.computable
    }

    pub fn point(&self, slot: CalibrationSlot) -> CalibrationPoint {
        match slot {
            CalibrationSlot::A => self.a,
            CalibrationSlot::B => self.b,
        }
    }

    /// Points in their persisted shape.
    pub fn points(&self) -> CalibrationPoints {
        CalibrationPoints {
            measured_a: self.a.measured,
            actual_a: self.a.actual,
            measured_b: self.b.measured,
            actual_b: self.b.actual,
        }
    }
}
