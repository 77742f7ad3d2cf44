//! Read throttling and plausibility filtering shared by both temperature
//! sensors.
//!
//! Switching the heater couples noise into the sensor lines, which shows
//! up as single-sample spikes. A reading is rejected when it is NaN,
//! outside the physical range, or jumps too far from the last accepted
//! value. Downward jumps get a much tighter bound than upward ones: the
//! element heats fast but never cools that fast.
//!
//! Five rejections in a row invalidate the last accepted value, so a dead
//! sensor reads "unknown" instead of a stale temperature. With no
//! reference value the jump check is skipped, which lets the filter lock
//! on again once the sensor recovers.

use log::debug;

use crate::error::SensorError;

/// Consecutive rejections after which the value becomes unknown.
pub const MAX_CONSECUTIVE_ERRORS: u8 = 5;

/// A sensor that can perform one raw temperature transaction (°C).
pub trait TemperatureSensor {
    fn read(&mut self) -> Result<f32, SensorError>;
}

impl<T: TemperatureSensor + ?Sized> TemperatureSensor for &mut T {
    fn read(&mut self) -> Result<f32, SensorError> {
        (**self).read()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidationLimits {
    pub min_c: f32,
    pub max_c: f32,
    /// Largest accepted fall from the previous value.
    pub max_drop_c: f32,
    /// Largest accepted rise from the previous value.
    pub max_rise_c: f32,
}

impl Default for ValidationLimits {
    fn default() -> Self {
        Self {
            min_c: -20.0,
            max_c: 500.0,
            max_drop_c: 8.0,
            max_rise_c: 50.0,
        }
    }
}

impl ValidationLimits {
    /// Whether `value` is acceptable given the previous accepted value.
    pub fn accepts(&self, value: f32, last: Option<f32>) -> bool {
        if value.is_nan() || value < self.min_c || value > self.max_c {
            return false;
        }
        match last {
            Some(prev) => {
                let delta = value - prev;
                delta >= -self.max_drop_c && delta <= self.max_rise_c
            }
            None => true,
        }
    }
}

/// A [`TemperatureSensor`] wrapped with interval throttling and validation.
pub struct FilteredSensor<S> {
    sensor: S,
    limits: ValidationLimits,
    interval_ms: u32,
    last_read_ms: Option<u32>,
    last_valid: Option<f32>,
    error_count: u8,
}

impl<S: TemperatureSensor> FilteredSensor<S> {
    pub fn new(sensor: S, interval_ms: u32) -> Self {
        Self::with_limits(sensor, interval_ms, ValidationLimits::default())
    }

    pub fn with_limits(sensor: S, interval_ms: u32, limits: ValidationLimits) -> Self {
        Self {
            sensor,
            limits,
            interval_ms,
            last_read_ms: None,
            last_valid: None,
            error_count: 0,
        }
    }

    /// Read the sensor if the interval elapsed (or `ignore_interval`).
    /// Returns `true` when a new valid value was accepted.
    pub fn update(&mut self, now_ms: u32, ignore_interval: bool) -> bool {
        let due = match self.last_read_ms {
            Some(last) => now_ms.wrapping_sub(last) >= self.interval_ms,
            None => true,
        };
        if !ignore_interval && !due {
            return false;
        }
        self.last_read_ms = Some(now_ms);

        match self.sensor.read() {
            Ok(value) if self.limits.accepts(value, self.last_valid) => {
                self.last_valid = Some(value);
                self.error_count = 0;
                true
            }
            Ok(value) => {
                debug!("Rejected reading {value:.2} (last {:?})", self.last_valid);
                self.reject();
                false
            }
            Err(e) => {
                debug!("Sensor read failed: {e}");
                self.reject();
                false
            }
        }
    }

    /// Last accepted temperature, `None` when unknown.
    pub fn celsius(&self) -> Option<f32> {
        self.last_valid
    }

    pub fn error_count(&self) -> u8 {
        self.error_count
    }

    pub fn interval_ms(&self) -> u32 {
        self.interval_ms
    }

    pub fn set_interval_ms(&mut self, interval_ms: u32) {
        self.interval_ms = interval_ms;
    }

    pub fn sensor(&self) -> &S {
        &self.sensor
    }

    pub fn sensor_mut(&mut self) -> &mut S {
        &mut self.sensor
    }

    fn reject(&mut self) {
        self.error_count = self.error_count.saturating_add(1);
        if self.error_count >= MAX_CONSECUTIVE_ERRORS && self.last_valid.is_some() {
            debug!("{MAX_CONSECUTIVE_ERRORS} consecutive bad readings, value now unknown");
            self.last_valid = None;
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Threshold edge detector
// ───────────────────────────────────────────────────────────────

/// Fires once when a temperature first reaches a threshold; re-arms when
/// it drops below again.
#[derive(Debug, Clone, Copy)]
pub struct ThresholdCrossing {
    threshold: f32,
    above: bool,
}

impl ThresholdCrossing {
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold,
            above: false,
        }
    }

    /// Feed a reading. Returns `true` on the upward crossing only.
    pub fn observe(&mut self, value: Option<f32>) -> bool {
        let Some(v) = value else {
            return false;
        };
        if v >= self.threshold {
            let fired = !self.above;
            self.above = true;
            fired
        } else {
            self.above = false;
            false
        }
    }

    pub fn set_threshold(&mut self, threshold: f32) {
        self.threshold = threshold;
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }
}
