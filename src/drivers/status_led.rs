//! Heater status indicator.
//!
//! A single discrete LED that mirrors the physical heater output while the
//! duty-cycle engine is enabled. Indicator writes are best-effort: a failed
//! LED write is logged and otherwise ignored, since it has no bearing on
//! heater safety.
//!
//! `()` implements [`Indicator`] as a no-op for boards without the LED.

use embedded_hal::digital::OutputPin;
use log::warn;

/// Anything that can show "heater energized".
pub trait Indicator {
    fn set_lit(&mut self, on: bool);
}

impl Indicator for () {
    fn set_lit(&mut self, _on: bool) {}
}

pub struct StatusLed<P: OutputPin> {
    pin: P,
    lit: bool,
    write_failed: bool,
}

impl<P: OutputPin> StatusLed<P> {
    pub fn new(pin: P) -> Self {
        Self {
            pin,
            lit: false,
            write_failed: false,
        }
    }

    pub fn is_lit(&self) -> bool {
        self.lit
    }

    pub fn release(self) -> P {
        self.pin
    }
}

impl<P: OutputPin> Indicator for StatusLed<P> {
    fn set_lit(&mut self, on: bool) {
        let result = if on {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };
        match result {
            Ok(()) => {
                self.lit = on;
                self.write_failed = false;
            }
            Err(_) => {
                // Warn once per failure streak, not every cycle.
                if !self.write_failed {
                    warn!("Status LED write failed");
                }
                self.write_failed = true;
            }
        }
    }
}
