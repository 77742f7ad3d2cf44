//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured heater events to the
//! `log` facade (the ESP-IDF logger on the device, UART / USB-CDC).

use log::{info, warn};

use crate::app::events::HeaterEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`HeaterEvent`] to the serial console.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

fn fmt_temp(t: Option<f32>) -> String {
    t.map_or_else(|| "--".to_string(), |v| format!("{v:.1}"))
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &HeaterEvent) {
        match event {
            HeaterEvent::Telemetry(t) => {
                info!(
                    "TELEM | state={} phase={} | t={}s | power={}% | K={}\u{00b0}C \
                     IR={}\u{00b0}C (raw {}) | cycle={} count={} | faults=0b{:08b}",
                    t.state,
                    t.phase,
                    t.elapsed_ms / 1000,
                    t.power,
                    fmt_temp(t.contact_c),
                    fmt_temp(t.infrared_c),
                    fmt_temp(t.infrared_raw_c),
                    t.heat_cycle,
                    t.cycle_count,
                    t.fault_flags,
                );
            }
            HeaterEvent::StateChanged { from, to, reason } => match reason {
                Some(r) => info!("STATE | {} -> {} ({:?})", from, to, r),
                None => info!("STATE | {} -> {}", from, to),
            },
            HeaterEvent::PhaseChanged(_) => {
                // Several per second; the engine logs at debug level.
            }
            HeaterEvent::CycleCompleted {
                duration_ms,
                cycle,
                total,
            } => {
                info!(
                    "CYCLE | #{} finished (heat cycle {}, {:.1}s)",
                    total,
                    cycle,
                    *duration_ms as f32 / 1000.0
                );
            }
            HeaterEvent::ClickReached { temperature_c } => {
                info!("CLICK | {:.0}\u{00b0}C reached", temperature_c);
            }
            HeaterEvent::CalibrationMarked {
                slot,
                measured,
                actual,
            } => {
                info!("CALIB | {:?}: measured={} actual={}", slot, measured, actual);
            }
            HeaterEvent::FaultDetected(flags) => {
                warn!("FAULT | detected, flags=0b{:08b}", flags);
            }
            HeaterEvent::FaultCleared => {
                info!("FAULT | all cleared");
            }
            HeaterEvent::Started(state) => {
                info!("START | initial_state={}", state);
            }
        }
    }
}
