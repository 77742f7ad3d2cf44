//! Port traits: the hexagonal boundary between the heater core and the
//! outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ HeaterService (domain)
//! ```
//!
//! Driven adapters (clock, event sinks, storage) implement these traits.
//! The [`HeaterService`](super::service::HeaterService) consumes them via
//! generics, so the domain core never touches the platform directly.
//! Heater pin and sensor buses use the `embedded-hal` traits instead.

use crate::config::HeaterConfig;

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Monotonic millisecond counter. It may wrap; callers only ever use
/// `wrapping_sub` differences.
pub trait Clock {
    fn now_ms(&self) -> u32;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_ms(&self) -> u32 {
        (**self).now_ms()
    }
}

// ───────────────────────────────────────────────────────────────
// Event sink port (domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`HeaterEvent`](super::events::HeaterEvent)s
/// through this port. Adapters decide where they go (serial log, JSON
/// lines for the backend, a display task, ...).
pub trait EventSink {
    fn emit(&mut self, event: &super::events::HeaterEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (domain ↔ persistent settings)
// ───────────────────────────────────────────────────────────────

/// Loads and persists heater configuration.
///
/// Implementations MUST validate before persisting and reject invalid
/// ranges with [`ConfigError::ValidationFailed`]. The control core clamps
/// silently, so storage is the only place a bad value gets caught.
pub trait ConfigPort {
    /// Returns [`HeaterConfig::default()`] if nothing is stored yet.
    fn load(&self) -> Result<HeaterConfig, ConfigError>;

    fn save(&self, config: &HeaterConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// No config found in storage (first boot).
    NotFound,
    /// Stored config failed deserialization.
    Corrupted,
    /// A config field failed range validation.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl std::error::Error for ConfigError {}
