//! Temperature acquisition: drivers, filtering and the aggregating
//! [`TemperaturePipeline`].
//!
//! The pipeline owns both sensor drivers and the infrared calibration.
//! The session drives it from two places: a forced contact read inside the
//! duty-cycle sensor window, and a throttled refresh on every control tick.

pub mod filter;
pub mod infrared;
pub mod thermocouple;

use serde::{Deserialize, Serialize};

use crate::calibration::{CalibrationSlot, TwoPointCalibration};
use crate::config::SensorSettings;
use crate::error::{CalibrationError, Result};
use filter::{FilteredSensor, TemperatureSensor};

/// Which sensor a temperature query refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TemperatureSource {
    /// Thermocouple touching the heating chamber.
    Contact,
    /// Calibrated infrared reading.
    #[default]
    Infrared,
}

pub struct TemperaturePipeline<K: TemperatureSensor, I: TemperatureSensor> {
    contact: FilteredSensor<K>,
    infrared: FilteredSensor<I>,
    calibration: TwoPointCalibration,
    always_measure: bool,
}

impl<K: TemperatureSensor, I: TemperatureSensor> TemperaturePipeline<K, I> {
    pub fn new(
        contact: K,
        infrared: I,
        settings: &SensorSettings,
        calibration: TwoPointCalibration,
    ) -> Self {
        Self {
            contact: FilteredSensor::new(contact, settings.contact_read_interval_ms),
            infrared: FilteredSensor::new(infrared, settings.infrared_read_interval_ms),
            calibration,
            always_measure: settings.always_measure,
        }
    }

    /// Forced contact read; called from inside the sensor window.
    pub fn measure_contact(&mut self, now_ms: u32) -> bool {
        self.contact.update(now_ms, true)
    }

    /// Interval-driven refresh. The contact sensor is only polled here
    /// while the heater is not switching, unless `always_measure` is set.
    pub fn refresh(&mut self, now_ms: u32, switching: bool) {
        self.infrared.update(now_ms, false);
        if !switching || self.always_measure {
            self.contact.update(now_ms, false);
        }
    }

    /// Take a fresh infrared reading and store it as the calibration point
    /// for `actual`.
    pub fn mark_calibration_point(&mut self, now_ms: u32, actual: u16) -> Result<CalibrationSlot> {
        if !self.infrared.update(now_ms, true) {
            return Err(CalibrationError::InvalidReading.into());
        }
        let raw = self
            .infrared
            .celsius()
            .ok_or(CalibrationError::InvalidReading)?;
        Ok(self.calibration.mark(raw, actual)?)
    }

    pub fn clear_calibration(&mut self) {
        self.calibration.clear();
    }

    pub fn apply_settings(&mut self, settings: &SensorSettings) {
        self.contact.set_interval_ms(settings.contact_read_interval_ms);
        self.infrared.set_interval_ms(settings.infrared_read_interval_ms);
        self.calibration
            .set_correction_percent(settings.infrared_correction_percent);
        self.always_measure = settings.always_measure;
    }

    pub fn set_calibration(&mut self, calibration: TwoPointCalibration) {
        self.calibration = calibration;
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn contact_celsius(&self) -> Option<f32> {
        self.contact.celsius()
    }

    /// Uncalibrated infrared value.
    pub fn infrared_raw(&self) -> Option<f32> {
        self.infrared.celsius()
    }

    pub fn infrared_celsius(&self) -> Option<f32> {
        self.infrared.celsius().map(|raw| self.calibration.apply(raw))
    }

    pub fn temperature(&self, source: TemperatureSource) -> Option<f32> {
        match source {
            TemperatureSource::Contact => self.contact_celsius(),
            TemperatureSource::Infrared => self.infrared_celsius(),
        }
    }

    pub fn calibration(&self) -> &TwoPointCalibration {
        &self.calibration
    }

    pub fn contact_sensor_mut(&mut self) -> &mut K {
        self.contact.sensor_mut()
    }

    pub fn infrared_sensor_mut(&mut self) -> &mut I {
        self.infrared.sensor_mut()
    }
}
