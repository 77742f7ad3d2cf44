//! Clock adapters.
//!
//! - [`MonotonicClock`]: milliseconds since boot. With `espidf` it
//!   wraps `esp_timer_get_time()`, on the host `std::time::Instant`.
//! - [`ManualClock`]: a settable clock for tests and simulation. Clones
//!   share the same time, so a test can keep one handle and give the
//!   other to the session.
//!
//! Both truncate to `u32` milliseconds and therefore wrap after ~49.7
//! days; the core only uses wrapping differences.

use std::cell::Cell;
use std::rc::Rc;

use crate::app::ports::Clock;

pub struct MonotonicClock {
    #[cfg(not(feature = "espidf"))]
    start: std::time::Instant,
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            #[cfg(not(feature = "espidf"))]
            start: std::time::Instant::now(),
        }
    }
}

impl Clock for MonotonicClock {
    #[cfg(feature = "espidf")]
    fn now_ms(&self) -> u32 {
        ((unsafe { esp_idf_svc::sys::esp_timer_get_time() }) / 1_000) as u32
    }

    #[cfg(not(feature = "espidf"))]
    fn now_ms(&self) -> u32 {
        self.start.elapsed().as_millis() as u32
    }
}

#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<u32>>,
}

impl ManualClock {
    pub fn new(start_ms: u32) -> Self {
        Self {
            now: Rc::new(Cell::new(start_ms)),
        }
    }

    pub fn set(&self, now_ms: u32) {
        self.now.set(now_ms);
    }

    /// Move time forward, wrapping like the hardware counter.
    pub fn advance(&self, ms: u32) {
        self.now.set(self.now.get().wrapping_add(ms));
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u32 {
        self.now.get()
    }
}
