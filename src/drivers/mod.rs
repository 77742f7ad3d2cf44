//! Output drivers: the ZVS duty-cycle engine and the status indicator.

pub mod status_led;
pub mod zvs;
