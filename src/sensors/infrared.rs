//! MLX90614 non-contact infrared thermometer.
//!
//! SMBus device at 0x5A. RAM and EEPROM words are read as
//! `[lo, hi, pec]`; every transfer is protected by a CRC-8 packet error
//! code (polynomial 0x07) over the full bus transaction, address bytes
//! included.
//!
//! Emissivity lives in EEPROM and must be erased (written as 0) before a
//! new value can be stored. Each EEPROM write needs ~5 ms to settle.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use log::{info, warn};

use crate::error::{Error, SensorError};
use crate::sensors::filter::TemperatureSensor;

pub const DEFAULT_ADDRESS: u8 = 0x5A;

const REG_AMBIENT: u8 = 0x06;
const REG_OBJECT_1: u8 = 0x07;
const REG_EMISSIVITY: u8 = 0x24;

const ERROR_FLAG: u16 = 0x8000;
const KELVIN_PER_LSB: f32 = 0.02;
const EEPROM_WRITE_MS: u32 = 10;

pub struct Mlx90614<I: I2c> {
    i2c: I,
    address: u8,
}

impl<I: I2c> Mlx90614<I> {
    pub fn new(i2c: I) -> Self {
        Self::with_address(i2c, DEFAULT_ADDRESS)
    }

    pub fn with_address(i2c: I, address: u8) -> Self {
        Self { i2c, address }
    }

    /// Object temperature in °C.
    pub fn object_celsius(&mut self) -> Result<f32, SensorError> {
        self.read_temperature(REG_OBJECT_1)
    }

    /// Die (ambient) temperature in °C.
    pub fn ambient_celsius(&mut self) -> Result<f32, SensorError> {
        self.read_temperature(REG_AMBIENT)
    }

    pub fn emissivity(&mut self) -> Result<f32, SensorError> {
        let raw = self.read_word(REG_EMISSIVITY)?;
        Ok(f32::from(raw) / 65535.0)
    }

    /// Store a new emissivity (0.1 to 1.0) in EEPROM.
    pub fn set_emissivity(&mut self, emissivity: f32, delay: &mut impl DelayNs) -> Result<(), Error> {
        if !(0.1..=1.0).contains(&emissivity) {
            warn!("Emissivity {emissivity} out of range, ignored");
            return Err(Error::Config("emissivity must be 0.1-1.0"));
        }
        let raw = (emissivity * 65535.0).round() as u16;

        self.write_word(REG_EMISSIVITY, 0)?;
        delay.delay_ms(EEPROM_WRITE_MS);
        self.write_word(REG_EMISSIVITY, raw)?;
        delay.delay_ms(EEPROM_WRITE_MS);

        info!("IR emissivity set to {emissivity:.2} (raw {raw:#06x})");
        Ok(())
    }

    pub fn release(self) -> I {
        self.i2c
    }

    // ── SMBus framing ─────────────────────────────────────────

    fn read_temperature(&mut self, reg: u8) -> Result<f32, SensorError> {
        let raw = self.read_word(reg)?;
        if raw & ERROR_FLAG != 0 {
            return Err(SensorError::InvalidData);
        }
        Ok(f32::from(raw) * KELVIN_PER_LSB - 273.15)
    }

    fn read_word(&mut self, cmd: u8) -> Result<u16, SensorError> {
        let mut buf = [0u8; 3];
        self.i2c
            .write_read(self.address, &[cmd], &mut buf)
            .map_err(|_| SensorError::Bus)?;
        let pec = crc8(&[self.address << 1, cmd, (self.address << 1) | 1, buf[0], buf[1]]);
        if pec != buf[2] {
            return Err(SensorError::InvalidData);
        }
        Ok(u16::from_le_bytes([buf[0], buf[1]]))
    }

    fn write_word(&mut self, cmd: u8, value: u16) -> Result<(), SensorError> {
        let [lo, hi] = value.to_le_bytes();
        let pec = crc8(&[self.address << 1, cmd, lo, hi]);
        self.i2c
            .write(self.address, &[cmd, lo, hi, pec])
            .map_err(|_| SensorError::Bus)
    }
}

impl<I: I2c> TemperatureSensor for Mlx90614<I> {
    fn read(&mut self) -> Result<f32, SensorError> {
        self.object_celsius()
    }
}

/// SMBus packet error code: CRC-8, polynomial x^8 + x^2 + x + 1, init 0.
pub fn crc8(data: &[u8]) -> u8 {
    let mut crc = 0u8;
    for &byte in data {
        crc ^= byte;
        for _ in 0..8 {
            crc = if crc & 0x80 != 0 {
                (crc << 1) ^ 0x07
            } else {
                crc << 1
            };
        }
    }
    crc
}
