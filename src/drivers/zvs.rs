//! ZVS duty-cycle engine.
//!
//! Time-slices a single heater output into fixed-length cycles. Each cycle
//! is an energized `On` span followed by an `Off` span whose tail is a
//! reserved `SensorWindow`: switching noise is absent there, so that is
//! where the temperature measurement happens.
//!
//! ```text
//!  |<--------------- period --------------->|
//!  |====== On ======|---- Off ----|~window~|
//!                                 ^ on_measure() fires once
//! ```
//!
//! All timing is software-driven from a millisecond timestamp passed into
//! [`ZvsDriver::update`]. Elapsed times use `wrapping_sub`, so a counter
//! rollover mid-phase is harmless.
//!
//! ## Config latching
//!
//! `set_power`, `set_period` and `set_sensor_window` only touch the pending
//! configuration. It is latched when the next `On` phase begins, so every
//! cycle runs with one consistent split and `on + off == period` holds.
//!
//! ## Output faults
//!
//! A failed pin write is unrecoverable for the engine: it disables itself,
//! makes a best-effort attempt to drive the pin low, and refuses to enable
//! again until [`ZvsDriver::clear_fault`] is called.

use embedded_hal::digital::OutputPin;
use heapless::Deque;
use log::{debug, error, info};
use serde::Serialize;

use crate::config::MIN_PERIOD_MS;
use crate::drivers::status_led::Indicator;
use crate::error::ActuatorError;

// ───────────────────────────────────────────────────────────────
// Configuration
// ───────────────────────────────────────────────────────────────

/// Period, sensor window and power for one cycle.
///
/// Always normalized: `period_ms >= 100`, `sensor_window_ms < period_ms`,
/// `power <= 100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DutyCycleConfig {
    period_ms: u32,
    sensor_window_ms: u32,
    power: u8,
}

impl DutyCycleConfig {
    pub fn new(period_ms: u32, sensor_window_ms: u32, power: u8) -> Self {
        let period_ms = period_ms.max(MIN_PERIOD_MS);
        Self {
            period_ms,
            sensor_window_ms: sensor_window_ms.min(period_ms - 1),
            power: power.min(100),
        }
    }

    pub fn period_ms(&self) -> u32 {
        self.period_ms
    }

    pub fn sensor_window_ms(&self) -> u32 {
        self.sensor_window_ms
    }

    pub fn power(&self) -> u8 {
        self.power
    }

    /// Energized span. Full power still leaves the sensor window free.
    pub fn on_time_ms(&self) -> u32 {
        if self.power >= 100 {
            self.period_ms - self.sensor_window_ms
        } else {
            (u64::from(self.period_ms) * u64::from(self.power) / 100) as u32
        }
    }

    /// De-energized span, sensor window included.
    pub fn off_time_ms(&self) -> u32 {
        if self.power >= 100 {
            self.sensor_window_ms
        } else {
            self.period_ms - self.on_time_ms()
        }
    }

    /// Offset into the off span at which the sensor window opens.
    fn window_opens_at_ms(&self) -> u32 {
        self.off_time_ms().saturating_sub(self.sensor_window_ms)
    }

    fn with_period(self, period_ms: u32) -> Self {
        Self::new(period_ms, self.sensor_window_ms, self.power)
    }

    fn with_window(self, sensor_window_ms: u32) -> Self {
        Self::new(self.period_ms, sensor_window_ms, self.power)
    }

    fn with_power(self, power: u8) -> Self {
        Self::new(self.period_ms, self.sensor_window_ms, power)
    }
}

impl Default for DutyCycleConfig {
    fn default() -> Self {
        Self::new(1000, 200, 100)
    }
}

// ───────────────────────────────────────────────────────────────
// Phase, statistics, hooks
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DutyCyclePhase {
    Idle,
    On,
    Off,
    SensorWindow,
}

impl core::fmt::Display for DutyCyclePhase {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::On => write!(f, "On"),
            Self::Off => write!(f, "Off"),
            Self::SensorWindow => write!(f, "SensorWindow"),
        }
    }
}

/// Cumulative engine statistics. Only [`ZvsDriver::reset_stats`] clears them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DutyCycleStats {
    /// Total time the output was energized.
    pub on_time_ms: u64,
    /// Total time spent in `Off` and `SensorWindow`.
    pub off_time_ms: u64,
    /// Completed Off -> On transitions.
    pub cycles: u32,
    /// Measurement callbacks fired.
    pub measurements: u32,
}

/// Notifications the engine delivers synchronously from `update()`.
pub trait DutyCycleHooks {
    /// The sensor window just opened; take the measurement now.
    fn on_measure(&mut self, now_ms: u32);

    /// The engine moved to `phase`.
    fn on_phase_change(&mut self, _phase: DutyCyclePhase) {}
}

impl DutyCycleHooks for () {
    fn on_measure(&mut self, _now_ms: u32) {}
}

// ───────────────────────────────────────────────────────────────
// Engine
// ───────────────────────────────────────────────────────────────

pub struct ZvsDriver<P: OutputPin, L: Indicator = ()> {
    pin: P,
    indicator: L,
    /// Split used by the running cycle.
    active: DutyCycleConfig,
    /// Split requested by the settings layer; latched at the next `On`.
    pending: DutyCycleConfig,
    enabled: bool,
    energized: bool,
    faulted: bool,
    phase: DutyCyclePhase,
    /// Last phase delivered to `on_phase_change`.
    reported: DutyCyclePhase,
    /// Phases entered through `set_enabled`, delivered at the next `update()`.
    queued: Deque<DutyCyclePhase, 4>,
    /// Start of `On`, or start of `Off` while in `Off`/`SensorWindow`.
    phase_start_ms: u32,
    measured_this_cycle: bool,
    stats: DutyCycleStats,
}

impl<P: OutputPin> ZvsDriver<P, ()> {
    pub fn new(pin: P, config: DutyCycleConfig) -> Self {
        Self::with_indicator(pin, (), config)
    }
}

impl<P: OutputPin, L: Indicator> ZvsDriver<P, L> {
    pub fn with_indicator(pin: P, indicator: L, config: DutyCycleConfig) -> Self {
        Self {
            pin,
            indicator,
            active: config,
            pending: config,
            enabled: false,
            energized: false,
            faulted: false,
            phase: DutyCyclePhase::Idle,
            reported: DutyCyclePhase::Idle,
            queued: Deque::new(),
            phase_start_ms: 0,
            measured_this_cycle: false,
            stats: DutyCycleStats::default(),
        }
    }

    /// Drive the output to its safe de-energized state.
    pub fn init(&mut self) -> Result<(), ActuatorError> {
        self.enabled = false;
        self.phase = DutyCyclePhase::Idle;
        self.write_output(false)?;
        info!(
            "ZVS engine ready: period={}ms window={}ms power={}%",
            self.pending.period_ms, self.pending.sensor_window_ms, self.pending.power
        );
        Ok(())
    }

    // ── Enable / disable ──────────────────────────────────────

    /// Enabling starts a fresh cycle with the `On` phase. Disabling
    /// de-energizes immediately from any phase.
    pub fn set_enabled(&mut self, enable: bool, now_ms: u32) -> Result<(), ActuatorError> {
        if enable {
            if self.faulted {
                return Err(ActuatorError::Faulted);
            }
            if self.enabled {
                return Ok(());
            }
            self.enabled = true;
            self.begin_on(now_ms)?;
            self.queue_transition();
            debug!("ZVS enabled");
        } else {
            if self.enabled {
                self.close_partial_span(now_ms);
                debug!("ZVS disabled in {}", self.phase);
            }
            self.enabled = false;
            self.phase = DutyCyclePhase::Idle;
            self.measured_this_cycle = false;
            self.queue_transition();
            self.write_output(false)?;
        }
        Ok(())
    }

    // ── Per-tick ──────────────────────────────────────────────

    /// Advance the phase machine. Must be called frequently; never blocks.
    pub fn update(
        &mut self,
        now_ms: u32,
        hooks: &mut impl DutyCycleHooks,
    ) -> Result<(), ActuatorError> {
        // Transitions made by set_enabled() are reported here.
        self.report(hooks);

        if !self.enabled {
            if self.energized {
                self.write_output(false)?;
            }
            return Ok(());
        }

        let elapsed = now_ms.wrapping_sub(self.phase_start_ms);
        match self.phase {
            DutyCyclePhase::Idle => {
                self.begin_on(now_ms)?;
                self.report(hooks);
            }
            DutyCyclePhase::On => {
                if elapsed >= self.active.on_time_ms() {
                    self.begin_off(now_ms)?;
                    self.report(hooks);
                }
            }
            DutyCyclePhase::Off => {
                if !self.measured_this_cycle && elapsed >= self.active.window_opens_at_ms() {
                    self.phase = DutyCyclePhase::SensorWindow;
                    self.measured_this_cycle = true;
                    self.stats.measurements = self.stats.measurements.wrapping_add(1);
                    self.report(hooks);
                    hooks.on_measure(now_ms);
                }
                if elapsed >= self.active.off_time_ms() {
                    self.begin_on(now_ms)?;
                    self.report(hooks);
                }
            }
            DutyCyclePhase::SensorWindow => {
                if elapsed >= self.active.off_time_ms() {
                    self.begin_on(now_ms)?;
                    self.report(hooks);
                }
            }
        }
        Ok(())
    }

    // ── Configuration ─────────────────────────────────────────

    pub fn set_power(&mut self, power: u8) {
        self.pending = self.pending.with_power(power);
        self.latch_if_idle();
    }

    pub fn set_period(&mut self, period_ms: u32) {
        self.pending = self.pending.with_period(period_ms);
        self.latch_if_idle();
    }

    pub fn set_sensor_window(&mut self, sensor_window_ms: u32) {
        self.pending = self.pending.with_window(sensor_window_ms);
        self.latch_if_idle();
    }

    /// Allow enabling again after an output fault.
    pub fn clear_fault(&mut self) {
        if self.faulted {
            info!("ZVS output fault cleared");
        }
        self.faulted = false;
    }

    pub fn reset_stats(&mut self) {
        self.stats = DutyCycleStats::default();
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether the heater output is currently driven high.
    pub fn is_energized(&self) -> bool {
        self.energized
    }

    pub fn is_faulted(&self) -> bool {
        self.faulted
    }

    pub fn phase(&self) -> DutyCyclePhase {
        self.phase
    }

    /// Time spent in the current phase (the off span for `SensorWindow`).
    pub fn phase_elapsed_ms(&self, now_ms: u32) -> u32 {
        if self.enabled {
            now_ms.wrapping_sub(self.phase_start_ms)
        } else {
            0
        }
    }

    /// Configured power; takes effect at the next cycle.
    pub fn power(&self) -> u8 {
        self.pending.power
    }

    pub fn period_ms(&self) -> u32 {
        self.pending.period_ms
    }

    pub fn sensor_window_ms(&self) -> u32 {
        self.pending.sensor_window_ms
    }

    /// Split the running cycle uses.
    pub fn active_config(&self) -> DutyCycleConfig {
        self.active
    }

    pub fn stats(&self) -> DutyCycleStats {
        self.stats
    }

    pub fn pin(&self) -> &P {
        &self.pin
    }

    pub fn indicator(&self) -> &L {
        &self.indicator
    }

    // ── Internal ──────────────────────────────────────────────

    fn begin_on(&mut self, now_ms: u32) -> Result<(), ActuatorError> {
        if matches!(self.phase, DutyCyclePhase::Off | DutyCyclePhase::SensorWindow) {
            let off_span = now_ms.wrapping_sub(self.phase_start_ms);
            self.stats.off_time_ms += u64::from(off_span);
            self.stats.cycles = self.stats.cycles.wrapping_add(1);
        }
        self.active = self.pending;
        self.phase = DutyCyclePhase::On;
        self.phase_start_ms = now_ms;
        self.write_output(self.active.on_time_ms() > 0)
    }

    fn begin_off(&mut self, now_ms: u32) -> Result<(), ActuatorError> {
        if self.energized {
            let on_span = now_ms.wrapping_sub(self.phase_start_ms);
            self.stats.on_time_ms += u64::from(on_span);
        }
        self.phase = DutyCyclePhase::Off;
        self.phase_start_ms = now_ms;
        self.measured_this_cycle = false;
        self.write_output(false)
    }

    fn close_partial_span(&mut self, now_ms: u32) {
        let span = u64::from(now_ms.wrapping_sub(self.phase_start_ms));
        match self.phase {
            DutyCyclePhase::On if self.energized => self.stats.on_time_ms += span,
            DutyCyclePhase::Off | DutyCyclePhase::SensorWindow => self.stats.off_time_ms += span,
            _ => {}
        }
    }

    fn latch_if_idle(&mut self) {
        if !self.enabled {
            self.active = self.pending;
        }
    }

    fn queue_transition(&mut self) {
        let last = self.queued.back().copied().unwrap_or(self.reported);
        if self.phase == last {
            return;
        }
        if self.queued.is_full() {
            self.queued.pop_front();
        }
        let _ = self.queued.push_back(self.phase);
    }

    fn report(&mut self, hooks: &mut impl DutyCycleHooks) {
        while let Some(phase) = self.queued.pop_front() {
            if phase != self.reported {
                self.reported = phase;
                hooks.on_phase_change(phase);
            }
        }
        if self.phase != self.reported {
            self.reported = self.phase;
            hooks.on_phase_change(self.phase);
        }
    }

    fn write_output(&mut self, on: bool) -> Result<(), ActuatorError> {
        let result = if on {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        };
        if result.is_err() {
            self.latch_fault();
            return Err(ActuatorError::OutputWriteFailed);
        }
        self.energized = on;
        self.indicator.set_lit(on && self.enabled);
        Ok(())
    }

    fn latch_fault(&mut self) {
        self.faulted = true;
        self.enabled = false;
        self.phase = DutyCyclePhase::Idle;
        self.measured_this_cycle = false;
        // Best effort; the state of the output is unknown if this fails too.
        let cleared = self.pin.set_low().is_ok();
        self.energized = !cleared;
        self.indicator.set_lit(false);
        error!("Heater output write failed, engine latched off (pin low: {cleared})");
    }
}
