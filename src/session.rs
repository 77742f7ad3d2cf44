//! Heating session state machine.
//!
//! Wraps the duty-cycle engine and the temperature pipeline into the
//! user-facing heater API.
//!
//! ```text
//!            start()              stop(false)
//!   Idle ─────────────▶ Heating ─────────────▶ Paused
//!    ▲                  │  ▲                    │
//!    │  stop(true),     │  └──── start() ───────┘
//!    │  auto-stop,      │                       │
//!    └── ceiling ───────┘◀──── pause timeout ───┘
//!
//!   any ── report_fault() / pin failure ──▶ Error ── clear_error() ──▶ Idle
//! ```
//!
//! Elapsed time excludes pauses: resuming shifts `start_ms` forward by the
//! paused span. A finalized session counts as a cycle only if it lasted at
//! least the configured minimum; a counted cycle raises the one-shot
//! "cycle finished" flag, which the consumer must clear.
//!
//! `stop()` disables the engine first in every state. That de-energize is
//! unconditional.

use core::fmt;

use embedded_hal::digital::OutputPin;
use log::{error, info, warn};
use serde::Serialize;

use crate::app::ports::Clock;
use crate::config::{HeaterConfig, SessionSettings};
use crate::drivers::status_led::Indicator;
use crate::drivers::zvs::{DutyCycleHooks, DutyCyclePhase, DutyCycleStats, ZvsDriver};
use crate::error::ActuatorError;
use crate::safety::{CeilingPolicy, limit_reached};
use crate::sensors::filter::TemperatureSensor;
use crate::sensors::{TemperaturePipeline, TemperatureSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionState {
    Idle,
    Heating,
    Paused,
    /// Hardware fault. Blocks `start()` until `clear_error()`.
    Error,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Heating => write!(f, "Heating"),
            Self::Paused => write!(f, "Paused"),
            Self::Error => write!(f, "Error"),
        }
    }
}

/// Why a session left `Heating`/`Paused` on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StopReason {
    User,
    AutoStop,
    PauseTimeout,
    TemperatureLimit,
    Fault,
}

/// Notifications delivered synchronously from [`HeaterSession::update`].
pub trait SessionObserver {
    fn on_phase_change(&mut self, _phase: DutyCyclePhase) {}

    /// A sensor-window measurement completed.
    fn on_measurement(&mut self, _now_ms: u32, _contact_c: Option<f32>) {}

    /// The session changed state without an API call (auto-stop, pause
    /// timeout, ceiling, output fault).
    fn on_state_change(&mut self, _from: SessionState, _to: SessionState, _reason: StopReason) {}
}

impl SessionObserver for () {}

/// Routes engine hooks into the pipeline and the caller's observer.
struct EngineHooks<'a, K: TemperatureSensor, I: TemperatureSensor, O: SessionObserver> {
    sensors: &'a mut TemperaturePipeline<K, I>,
    observer: &'a mut O,
}

impl<K: TemperatureSensor, I: TemperatureSensor, O: SessionObserver> DutyCycleHooks
    for EngineHooks<'_, K, I, O>
{
    fn on_measure(&mut self, now_ms: u32) {
        self.sensors.measure_contact(now_ms);
        self.observer
            .on_measurement(now_ms, self.sensors.contact_celsius());
    }

    fn on_phase_change(&mut self, phase: DutyCyclePhase) {
        self.observer.on_phase_change(phase);
    }
}

pub struct HeaterSession<C, P, L, K, I>
where
    C: Clock,
    P: OutputPin,
    L: Indicator,
    K: TemperatureSensor,
    I: TemperatureSensor,
{
    clock: C,
    engine: ZvsDriver<P, L>,
    sensors: TemperaturePipeline<K, I>,
    state: SessionState,
    start_ms: u32,
    pause_ms: u32,
    settings: SessionSettings,
    cycle_counter: u32,
    last_cycle_duration_ms: u32,
    cycle_finished: bool,
    ceiling_policy: CeilingPolicy,
    ceiling_source: TemperatureSource,
    ceiling_limit_c: Option<f32>,
}

impl<C, P, L, K, I> HeaterSession<C, P, L, K, I>
where
    C: Clock,
    P: OutputPin,
    L: Indicator,
    K: TemperatureSensor,
    I: TemperatureSensor,
{
    pub fn new(
        clock: C,
        engine: ZvsDriver<P, L>,
        sensors: TemperaturePipeline<K, I>,
        config: &HeaterConfig,
    ) -> Self {
        Self {
            clock,
            engine,
            sensors,
            state: SessionState::Idle,
            start_ms: 0,
            pause_ms: 0,
            settings: config.session,
            cycle_counter: 0,
            last_cycle_duration_ms: 0,
            cycle_finished: false,
            ceiling_policy: config.ceiling.policy,
            ceiling_source: config.ceiling.source,
            ceiling_limit_c: config.ceiling.limit_for_cycle(1),
        }
    }

    /// Put the heater output into its safe state.
    pub fn init(&mut self) -> Result<(), ActuatorError> {
        self.engine.init().inspect_err(|&e| {
            self.fail(e);
        })
    }

    // ── Session control ───────────────────────────────────────

    /// Start from `Idle` or resume from `Paused`. Returns `false` (and does
    /// nothing) from any other state.
    pub fn start(&mut self) -> bool {
        let now = self.clock.now_ms();
        let resumed = match self.state {
            SessionState::Idle => false,
            SessionState::Paused => true,
            SessionState::Heating | SessionState::Error => return false,
        };
        if let Err(e) = self.engine.set_enabled(true, now) {
            self.fail(e);
            return false;
        }
        if resumed {
            let heated = self.pause_ms.wrapping_sub(self.start_ms);
            self.start_ms = now.wrapping_sub(heated);
            info!("Heating resumed after {} ms heating", heated);
        } else {
            self.start_ms = now;
            info!("Heating started");
        }
        self.state = SessionState::Heating;
        true
    }

    /// Disable the engine, then finalize (`true`) or pause (`false`) a
    /// running session. Returns `true` if a `Heating` session was stopped.
    pub fn stop(&mut self, finalize: bool) -> bool {
        let now = self.clock.now_ms();
        if let Err(e) = self.engine.set_enabled(false, now) {
            self.fail(e);
            return false;
        }
        if self.state != SessionState::Heating {
            return false;
        }
        if finalize {
            self.finalize(now.wrapping_sub(self.start_ms));
            self.state = SessionState::Idle;
            info!("Heating stopped (finalized)");
        } else {
            self.pause_ms = now;
            self.state = SessionState::Paused;
            info!("Heating paused");
        }
        true
    }

    /// Drive the engine, refresh temperatures and apply auto-stop, pause
    /// timeout and an enforced ceiling.
    pub fn update(&mut self, observer: &mut impl SessionObserver) {
        let now = self.clock.now_ms();

        let engine_result = {
            let mut hooks = EngineHooks {
                sensors: &mut self.sensors,
                observer: &mut *observer,
            };
            self.engine.update(now, &mut hooks)
        };
        if let Err(e) = engine_result {
            self.fail_and_notify(e, observer);
            return;
        }

        self.sensors.refresh(now, self.engine.is_enabled());

        match self.state {
            SessionState::Heating => {
                let elapsed = now.wrapping_sub(self.start_ms);
                if elapsed >= self.settings.auto_stop_ms {
                    warn!("Auto-stop after {} ms", elapsed);
                    self.finish(now, StopReason::AutoStop, observer);
                } else if self.ceiling_policy == CeilingPolicy::Enforced && self.limit_reached() {
                    warn!(
                        "Temperature limit {:?} reached, stopping",
                        self.ceiling_limit_c
                    );
                    self.finish(now, StopReason::TemperatureLimit, observer);
                }
            }
            SessionState::Paused => {
                if now.wrapping_sub(self.pause_ms) >= self.settings.pause_timeout_ms {
                    warn!("Pause timeout, finalizing cycle");
                    self.finalize(self.pause_ms.wrapping_sub(self.start_ms));
                    self.state = SessionState::Idle;
                    observer.on_state_change(
                        SessionState::Paused,
                        SessionState::Idle,
                        StopReason::PauseTimeout,
                    );
                }
            }
            SessionState::Idle | SessionState::Error => {}
        }
    }

    /// External hardware fault: de-energize and enter `Error`.
    pub fn report_fault(&mut self) {
        let now = self.clock.now_ms();
        // Already heading to Error; a failed disable changes nothing.
        let _ = self.engine.set_enabled(false, now);
        if self.state != SessionState::Error {
            error!("Heater fault reported in {}, entering Error", self.state);
        }
        self.state = SessionState::Error;
    }

    /// Leave `Error` for `Idle`. Returns `false` if not in `Error`.
    pub fn clear_error(&mut self) -> bool {
        if self.state != SessionState::Error {
            return false;
        }
        self.engine.clear_fault();
        self.state = SessionState::Idle;
        info!("Heater error cleared");
        true
    }

    // ── Settings ──────────────────────────────────────────────

    pub fn set_auto_stop_ms(&mut self, ms: u32) {
        self.settings.auto_stop_ms = ms;
    }

    /// Forwarded to the engine; applies from the next duty cycle.
    pub fn set_power(&mut self, power: u8) {
        self.engine.set_power(power);
    }

    pub fn set_ceiling_limit(&mut self, limit_c: Option<f32>) {
        self.ceiling_limit_c = limit_c;
    }

    /// Take over a new configuration. Duty-cycle changes are latched by the
    /// engine at the next cycle; calibration points are left untouched.
    pub fn apply_config(&mut self, config: &HeaterConfig) {
        self.settings = config.session;
        self.engine.set_period(config.duty_cycle.period_ms);
        self.engine.set_sensor_window(config.duty_cycle.sensor_window_ms);
        self.engine.set_power(config.duty_cycle.power_percent);
        self.sensors.apply_settings(&config.sensors);
        self.ceiling_policy = config.ceiling.policy;
        self.ceiling_source = config.ceiling.source;
    }

    /// Consume the "cycle finished" flag.
    pub fn take_cycle_finished(&mut self) -> bool {
        core::mem::take(&mut self.cycle_finished)
    }

    pub fn reset_stats(&mut self) {
        self.engine.reset_stats();
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_heating(&self) -> bool {
        self.state == SessionState::Heating
    }

    /// Heating time of the current session, pauses excluded.
    pub fn elapsed_ms(&self) -> u32 {
        match self.state {
            SessionState::Heating => self.clock.now_ms().wrapping_sub(self.start_ms),
            SessionState::Paused => self.pause_ms.wrapping_sub(self.start_ms),
            SessionState::Idle | SessionState::Error => 0,
        }
    }

    /// Time spent in the current pause.
    pub fn paused_ms(&self) -> u32 {
        if self.state == SessionState::Paused {
            self.clock.now_ms().wrapping_sub(self.pause_ms)
        } else {
            0
        }
    }

    pub fn cycle_count(&self) -> u32 {
        self.cycle_counter
    }

    pub fn last_cycle_duration_ms(&self) -> u32 {
        self.last_cycle_duration_ms
    }

    pub fn is_cycle_finished(&self) -> bool {
        self.cycle_finished
    }

    pub fn auto_stop_ms(&self) -> u32 {
        self.settings.auto_stop_ms
    }

    pub fn power(&self) -> u8 {
        self.engine.power()
    }

    pub fn phase(&self) -> DutyCyclePhase {
        self.engine.phase()
    }

    pub fn stats(&self) -> DutyCycleStats {
        self.engine.stats()
    }

    /// Temperature from the ceiling source.
    pub fn temperature(&self) -> Option<f32> {
        self.sensors.temperature(self.ceiling_source)
    }

    pub fn ceiling_limit(&self) -> Option<f32> {
        self.ceiling_limit_c
    }

    pub fn ceiling_policy(&self) -> CeilingPolicy {
        self.ceiling_policy
    }

    /// Advisory comparison of the ceiling temperature against the limit.
    pub fn limit_reached(&self) -> bool {
        limit_reached(self.temperature(), self.ceiling_limit_c)
    }

    pub fn now_ms(&self) -> u32 {
        self.clock.now_ms()
    }

    pub fn engine(&self) -> &ZvsDriver<P, L> {
        &self.engine
    }

    pub fn sensors(&self) -> &TemperaturePipeline<K, I> {
        &self.sensors
    }

    pub fn sensors_mut(&mut self) -> &mut TemperaturePipeline<K, I> {
        &mut self.sensors
    }

    // ── Internal ──────────────────────────────────────────────

    fn finalize(&mut self, duration_ms: u32) {
        if duration_ms >= self.settings.min_cycle_duration_ms {
            self.cycle_counter = self.cycle_counter.wrapping_add(1);
            self.last_cycle_duration_ms = duration_ms;
            self.cycle_finished = true;
            info!(
                "Cycle #{} counted ({} ms)",
                self.cycle_counter, duration_ms
            );
        } else {
            info!(
                "Session too short to count ({} ms < {} ms)",
                duration_ms, self.settings.min_cycle_duration_ms
            );
        }
    }

    fn finish(&mut self, now: u32, reason: StopReason, observer: &mut impl SessionObserver) {
        if let Err(e) = self.engine.set_enabled(false, now) {
            self.fail_and_notify(e, observer);
            return;
        }
        self.finalize(now.wrapping_sub(self.start_ms));
        self.state = SessionState::Idle;
        observer.on_state_change(SessionState::Heating, SessionState::Idle, reason);
    }

    /// Enter `Error` after an output failure. Returns the previous state.
    fn fail(&mut self, e: ActuatorError) -> SessionState {
        let from = self.state;
        error!("Heater output failure in {}: {}", from, e);
        self.state = SessionState::Error;
        from
    }

    /// Like [`Self::fail`], notifying only on an actual transition.
    fn fail_and_notify(&mut self, e: ActuatorError, observer: &mut impl SessionObserver) {
        let from = self.fail(e);
        if from != SessionState::Error {
            observer.on_state_change(from, SessionState::Error, StopReason::Fault);
        }
    }
}
