//! Inbound commands to the heater service.
//!
//! These represent actions requested by the outside world (buttons, menu,
//! backend) that the [`HeaterService`](super::service::HeaterService)
//! interprets and acts upon.

use crate::config::HeaterConfig;

/// Commands that external adapters can send into the heater core.
#[derive(Debug, Clone, PartialEq)]
pub enum HeaterCommand {
    /// Start heating, or resume a paused session.
    Start,

    /// Pause a running session (resumable until the pause timeout).
    Pause,

    /// Stop and finalize the running session.
    Stop,

    /// Set heater power (0-100 %); applies from the next duty cycle.
    SetPower(u8),

    /// Change the session auto-stop time.
    SetAutoStop(u32),

    /// Hot-reload configuration.
    UpdateConfig(Box<HeaterConfig>),

    /// Store the current infrared reading as the point for `actual` °C.
    MarkCalibration { actual: u16 },

    /// Reset the infrared calibration to identity.
    ClearCalibration,

    /// Leave the `Error` state.
    ClearFault,

    /// Reset duty-cycle statistics.
    ResetStats,

    /// Select heat cycle 1 or 2 (and its temperature limit).
    SelectCycle(u8),
}
