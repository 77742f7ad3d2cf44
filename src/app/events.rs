//! Outbound heater events.
//!
//! The [`HeaterService`](super::service::HeaterService) emits these through
//! the [`EventSink`](super::ports::EventSink) port. Adapters on the other
//! side decide what to do with them: log to serial, forward as JSON to the
//! backend, update the display.

use serde::Serialize;

use crate::calibration::CalibrationSlot;
use crate::drivers::zvs::{DutyCyclePhase, DutyCycleStats};
use crate::session::{SessionState, StopReason};

/// Structured events emitted by the heater core.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum HeaterEvent {
    /// The service has started (carries initial state).
    Started(SessionState),

    /// The session changed state.
    StateChanged {
        from: SessionState,
        to: SessionState,
        reason: Option<StopReason>,
    },

    /// The duty-cycle engine changed phase.
    PhaseChanged(DutyCyclePhase),

    /// A heating cycle was counted.
    CycleCompleted {
        duration_ms: u32,
        /// Heat cycle (1 or 2) that just finished.
        cycle: u8,
        /// Lifetime counted cycles.
        total: u32,
    },

    /// The contact sensor first reached the click temperature.
    ClickReached { temperature_c: f32 },

    /// An infrared calibration point was stored.
    CalibrationMarked {
        slot: CalibrationSlot,
        measured: u16,
        actual: u16,
    },

    /// One or more safety faults were raised.
    FaultDetected(u8),

    /// All safety faults have been cleared.
    FaultCleared,

    /// Periodic telemetry snapshot.
    Telemetry(TelemetryData),
}

/// A point-in-time telemetry snapshot suitable for logging or transmission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryData {
    pub state: SessionState,
    pub phase: DutyCyclePhase,
    pub elapsed_ms: u32,
    pub power: u8,
    pub heat_cycle: u8,
    pub contact_c: Option<f32>,
    pub infrared_raw_c: Option<f32>,
    pub infrared_c: Option<f32>,
    pub limit_reached: bool,
    pub cycle_count: u32,
    pub last_cycle_duration_ms: u32,
    pub stats: DutyCycleStats,
    pub fault_flags: u8,
}
