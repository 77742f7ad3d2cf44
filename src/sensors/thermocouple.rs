//! MAX6675 K-type thermocouple converter (contact sensor).
//!
//! Read-only SPI device: one 16-bit big-endian frame per conversion.
//!
//! ```text
//!  D15    D14..D3          D2            D1   D0
//!  dummy  temperature      open input    id   tri-state
//!         (0.25 °C / LSB)
//! ```

use embedded_hal::spi::SpiDevice;

use crate::error::SensorError;
use crate::sensors::filter::TemperatureSensor;

const OPEN_INPUT_BIT: u16 = 1 << 2;
const DEG_PER_LSB: f32 = 0.25;

pub struct Max6675<S: SpiDevice> {
    spi: S,
}

impl<S: SpiDevice> Max6675<S> {
    pub fn new(spi: S) -> Self {
        Self { spi }
    }

    /// Release the underlying SPI device.
    pub fn release(self) -> S {
        self.spi
    }
}

/// Decode one raw MAX6675 frame into °C.
pub fn decode_frame(frame: u16) -> Result<f32, SensorError> {
    if frame & OPEN_INPUT_BIT != 0 {
        return Err(SensorError::OpenCircuit);
    }
    Ok(f32::from(frame >> 3) * DEG_PER_LSB)
}

impl<S: SpiDevice> TemperatureSensor for Max6675<S> {
    fn read(&mut self) -> Result<f32, SensorError> {
        let mut buf = [0u8; 2];
        self.spi.read(&mut buf).map_err(|_| SensorError::Bus)?;
        decode_frame(u16::from_be_bytes(buf))
    }
}
