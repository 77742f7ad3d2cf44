//! Fuzz target: `FilteredSensor::update`
//!
//! Interprets the input as a stream of raw f32 readings (NaN, infinities
//! and subnormals included) and checks that the filter only ever exposes
//! a finite value inside the plausible range.
//!
//! cargo fuzz run fuzz_sensor_filter

#![no_main]

use heizbox::error::SensorError;
use heizbox::sensors::filter::{FilteredSensor, TemperatureSensor, ValidationLimits};
use libfuzzer_sys::fuzz_target;

struct Replay<'a> {
    words: core::slice::ChunksExact<'a, u8>,
}

impl TemperatureSensor for Replay<'_> {
    fn read(&mut self) -> Result<f32, SensorError> {
        self.words
            .next()
            .map(|w| f32::from_le_bytes([w[0], w[1], w[2], w[3]]))
            .ok_or(SensorError::Bus)
    }
}

fuzz_target!(|data: &[u8]| {
    let limits = ValidationLimits::default();
    let readings = data.len() / 4;
    let mut sensor = FilteredSensor::with_limits(
        Replay {
            words: data.chunks_exact(4),
        },
        0,
        limits,
    );
    for i in 0..readings {
        sensor.update(i as u32, true);
        if let Some(t) = sensor.celsius() {
            assert!(t.is_finite());
            assert!(t >= limits.min_c && t <= limits.max_c);
        }
    }
});
