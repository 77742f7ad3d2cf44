//! Heater service: the hexagonal core.
//!
//! [`HeaterService`] owns the heating session, the safety supervisor and
//! the live configuration. It turns session activity into
//! [`HeaterEvent`]s, interprets [`HeaterCommand`]s and keeps the config
//! dirty flag for the storage adapter.
//!
//! ```text
//!  HeaterCommand ──▶ ┌──────────────────────────────┐ ──▶ EventSink
//!                    │        HeaterService          │
//!     ConfigPort ◀──│ Session · Safety · HeatCycle  │
//!                    └──────────────────────────────┘
//! ```

use embedded_hal::digital::OutputPin;
use log::{info, warn};

use crate::calibration::TwoPointCalibration;
use crate::config::HeaterConfig;
use crate::drivers::status_led::Indicator;
use crate::drivers::zvs::DutyCyclePhase;
use crate::safety::{SafetyInputs, SafetySupervisor};
use crate::sensors::filter::{TemperatureSensor, ThresholdCrossing};
use crate::session::{HeaterSession, SessionObserver, SessionState, StopReason};

use super::commands::HeaterCommand;
use super::events::{HeaterEvent, TelemetryData};
use super::ports::{Clock, ConfigPort, EventSink};

/// Quiet time after the last config change before it is auto-saved.
const AUTO_SAVE_DELAY_MS: u32 = 5_000;

/// Forwards session notifications into the event sink.
struct EventRelay<'a, S: EventSink> {
    sink: &'a mut S,
}

impl<S: EventSink> SessionObserver for EventRelay<'_, S> {
    fn on_phase_change(&mut self, phase: DutyCyclePhase) {
        self.sink.emit(&HeaterEvent::PhaseChanged(phase));
    }

    fn on_state_change(&mut self, from: SessionState, to: SessionState, reason: StopReason) {
        self.sink.emit(&HeaterEvent::StateChanged {
            from,
            to,
            reason: Some(reason),
        });
    }
}

// ───────────────────────────────────────────────────────────────
// HeaterService
// ───────────────────────────────────────────────────────────────

pub struct HeaterService<C, P, L, K, I>
where
    C: Clock,
    P: OutputPin,
    L: Indicator,
    K: TemperatureSensor,
    I: TemperatureSensor,
{
    session: HeaterSession<C, P, L, K, I>,
    safety: SafetySupervisor,
    config: HeaterConfig,
    click: ThresholdCrossing,
    /// Selected heat cycle (1 or 2); alternates after each counted cycle.
    heat_cycle: u8,
    fault_flags: u8,
    last_telemetry_ms: Option<u32>,
    config_dirty: bool,
    dirty_since_ms: u32,
}

impl<C, P, L, K, I> HeaterService<C, P, L, K, I>
where
    C: Clock,
    P: OutputPin,
    L: Indicator,
    K: TemperatureSensor,
    I: TemperatureSensor,
{
    pub fn new(session: HeaterSession<C, P, L, K, I>, config: HeaterConfig) -> Self {
        let mut session = session;
        session.set_ceiling_limit(config.ceiling.limit_for_cycle(1));
        Self {
            session,
            safety: SafetySupervisor::new(),
            click: ThresholdCrossing::new(config.sensors.click_threshold_c),
            config,
            heat_cycle: 1,
            fault_flags: 0,
            last_telemetry_ms: None,
            config_dirty: false,
            dirty_since_ms: 0,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Put the output into its safe state and announce the service.
    pub fn start(&mut self, sink: &mut impl EventSink) {
        if let Err(e) = self.session.init() {
            warn!("Heater output init failed: {}", e);
        }
        sink.emit(&HeaterEvent::Started(self.session.state()));
        info!("HeaterService started in {}", self.session.state());
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// One control-loop iteration: session → cycle accounting → click →
    /// safety → telemetry.
    pub fn tick(&mut self, sink: &mut impl EventSink) {
        self.session.update(&mut EventRelay { sink: &mut *sink });

        self.process_cycle_finished(sink);

        if self.click.observe(self.session.sensors().contact_celsius()) {
            let temperature_c = self.click.threshold();
            info!("Click temperature {:.0}\u{00b0}C reached", temperature_c);
            sink.emit(&HeaterEvent::ClickReached { temperature_c });
        }

        let faults = self.safety.evaluate(&SafetyInputs {
            temperature_c: self.session.temperature(),
            limit_c: self.session.ceiling_limit(),
            heating: self.session.is_heating(),
            output_faulted: self.session.engine().is_faulted(),
        });
        if faults != self.fault_flags {
            if faults == 0 {
                sink.emit(&HeaterEvent::FaultCleared);
            } else {
                warn!("Safety fault! flags=0b{:08b}", faults);
                sink.emit(&HeaterEvent::FaultDetected(faults));
            }
            self.fault_flags = faults;
        }

        let now = self.session.now_ms();
        let due = self.last_telemetry_ms.is_none_or(|last| {
            now.wrapping_sub(last) >= self.config.telemetry_interval_ms
        });
        if due {
            self.last_telemetry_ms = Some(now);
            sink.emit(&HeaterEvent::Telemetry(self.build_telemetry()));
        }
    }

    // ── Command handling ──────────────────────────────────────

    /// Process an external command (buttons, menu, backend).
    pub fn handle_command(&mut self, cmd: HeaterCommand, sink: &mut impl EventSink) {
        let prev = self.session.state();
        match cmd {
            HeaterCommand::Start => {
                self.session.start();
                self.emit_transition(prev, None, sink);
            }
            HeaterCommand::Pause => {
                self.session.stop(false);
                self.emit_transition(prev, None, sink);
            }
            HeaterCommand::Stop => {
                self.session.stop(true);
                self.emit_transition(prev, Some(StopReason::User), sink);
                self.process_cycle_finished(sink);
            }
            HeaterCommand::SetPower(power) => {
                let power = power.min(100);
                self.session.set_power(power);
                self.config.duty_cycle.power_percent = power;
                self.mark_config_dirty();
            }
            HeaterCommand::SetAutoStop(ms) => {
                let mut candidate = self.config.clone();
                candidate.session.auto_stop_ms = ms;
                if let Err(e) = candidate.validate() {
                    warn!("Rejected auto-stop {} ms: {}", ms, e);
                    return;
                }
                self.session.set_auto_stop_ms(ms);
                self.config.session.auto_stop_ms = ms;
                self.mark_config_dirty();
            }
            HeaterCommand::UpdateConfig(new_config) => {
                if let Err(e) = new_config.validate() {
                    warn!("Rejected config update: {}", e);
                    return;
                }
                self.apply_config(*new_config);
                self.mark_config_dirty();
                info!("Configuration updated at runtime");
            }
            HeaterCommand::MarkCalibration { actual } => {
                let now = self.session.now_ms();
                match self.session.sensors_mut().mark_calibration_point(now, actual) {
                    Ok(slot) => {
                        let calibration = self.session.sensors().calibration();
                        let point = calibration.point(slot);
                        self.config.calibration = calibration.points();
                        self.mark_config_dirty();
                        sink.emit(&HeaterEvent::CalibrationMarked {
                            slot,
                            measured: point.measured,
                            actual: point.actual,
                        });
                    }
                    Err(e) => warn!("Calibration point for {} ignored: {}", actual, e),
                }
            }
            HeaterCommand::ClearCalibration => {
                self.session.sensors_mut().clear_calibration();
                self.config.calibration = self.session.sensors().calibration().points();
                self.mark_config_dirty();
                info!("IR calibration cleared");
            }
            HeaterCommand::ClearFault => {
                self.session.clear_error();
                self.emit_transition(prev, None, sink);
            }
            HeaterCommand::ResetStats => self.session.reset_stats(),
            HeaterCommand::SelectCycle(cycle) => self.select_cycle(cycle),
        }
    }

    /// External hardware fault (e.g. from a supervisor task).
    pub fn report_fault(&mut self, sink: &mut impl EventSink) {
        let prev = self.session.state();
        self.session.report_fault();
        self.emit_transition(prev, Some(StopReason::Fault), sink);
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn build_telemetry(&self) -> TelemetryData {
        let s = &self.session;
        TelemetryData {
            state: s.state(),
            phase: s.phase(),
            elapsed_ms: s.elapsed_ms(),
            power: s.power(),
            heat_cycle: self.heat_cycle,
            contact_c: s.sensors().contact_celsius(),
            infrared_raw_c: s.sensors().infrared_raw(),
            infrared_c: s.sensors().infrared_celsius(),
            limit_reached: s.limit_reached(),
            cycle_count: s.cycle_count(),
            last_cycle_duration_ms: s.last_cycle_duration_ms(),
            stats: s.stats(),
            fault_flags: self.fault_flags,
        }
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn session(&self) -> &HeaterSession<C, P, L, K, I> {
        &self.session
    }

    pub fn heat_cycle(&self) -> u8 {
        self.heat_cycle
    }

    /// Current active fault bitmask (0 = no faults).
    pub fn fault_flags(&self) -> u8 {
        self.fault_flags
    }

    /// Clone of the live configuration.
    pub fn current_config(&self) -> HeaterConfig {
        self.config.clone()
    }

    // ── Internal ──────────────────────────────────────────────

    fn apply_config(&mut self, config: HeaterConfig) {
        self.session.apply_config(&config);
        if config.calibration != self.config.calibration {
            self.session.sensors_mut().set_calibration(TwoPointCalibration::from_points(
                config.calibration,
                config.sensors.infrared_correction_percent,
            ));
        }
        self.click.set_threshold(config.sensors.click_threshold_c);
        self.session
            .set_ceiling_limit(config.ceiling.limit_for_cycle(self.heat_cycle));
        self.config = config;
    }

    fn select_cycle(&mut self, cycle: u8) {
        if !matches!(cycle, 1 | 2) {
            warn!("Ignoring unknown heat cycle {}", cycle);
            return;
        }
        self.heat_cycle = cycle;
        let limit = self.config.ceiling.limit_for_cycle(cycle);
        self.session.set_ceiling_limit(limit);
        info!("Heat cycle {} selected (limit {:?})", cycle, limit);
    }

    /// Consume the session's one-shot flag and advance the heat cycle.
    fn process_cycle_finished(&mut self, sink: &mut impl EventSink) {
        if !self.session.take_cycle_finished() {
            return;
        }
        let finished = self.heat_cycle;
        sink.emit(&HeaterEvent::CycleCompleted {
            duration_ms: self.session.last_cycle_duration_ms(),
            cycle: finished,
            total: self.session.cycle_count(),
        });
        self.select_cycle(if finished == 1 { 2 } else { 1 });
    }

    fn emit_transition(
        &self,
        prev: SessionState,
        reason: Option<StopReason>,
        sink: &mut impl EventSink,
    ) {
        let to = self.session.state();
        if to == prev {
            return;
        }
        let reason = if to == SessionState::Error {
            Some(StopReason::Fault)
        } else if to == SessionState::Idle {
            reason
        } else {
            None
        };
        info!("Session transition: {} -> {}", prev, to);
        sink.emit(&HeaterEvent::StateChanged {
            from: prev,
            to,
            reason,
        });
    }

    // ── Config dirty-flag management ──────────────────────────

    pub fn mark_config_dirty(&mut self) {
        if !self.config_dirty {
            self.config_dirty = true;
            self.dirty_since_ms = self.session.now_ms();
        }
    }

    /// Save once the config has been quiet for 5 s.
    /// Returns `true` if the config was saved.
    pub fn auto_save_if_needed(&mut self, storage: &impl ConfigPort) -> bool {
        if !self.config_dirty {
            return false;
        }
        let quiet = self.session.now_ms().wrapping_sub(self.dirty_since_ms);
        if quiet < AUTO_SAVE_DELAY_MS {
            return false;
        }
        match storage.save(&self.config) {
            Ok(()) => {
                self.config_dirty = false;
                info!("Config auto-saved");
                true
            }
            Err(e) => {
                warn!("Config auto-save failed: {}", e);
                false
            }
        }
    }

    /// Force-save if dirty (call before power-down).
    pub fn force_save_if_dirty(&mut self, storage: &impl ConfigPort) {
        if !self.config_dirty {
            return;
        }
        match storage.save(&self.config) {
            Ok(()) => {
                self.config_dirty = false;
                info!("Config force-saved before shutdown");
            }
            Err(e) => {
                warn!("Config force-save failed: {}", e);
            }
        }
    }

    pub fn is_config_dirty(&self) -> bool {
        self.config_dirty
    }
}
