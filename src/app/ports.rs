//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ AppService (domain)
//! ```
//!
//! Driven adapters (UART transport, edge interrupt, value sink, storage)
//! implement these traits. The [`AppService`](super::service::AppService)
//! consumes them via generics, so the domain core never touches hardware
//! directly.
//!
//! The cooperative wait inside the UART exchange uses
//! [`embedded_hal::delay::DelayNs`] rather than a local trait.

use crate::config::SensorConfig;
use crate::error::{SetupError, UartError};

// ───────────────────────────────────────────────────────────────
// Edge notification (interrupt → domain)
// ───────────────────────────────────────────────────────────────

/// Receives pin transitions. May be called from interrupt context, so
/// implementations must not block or allocate.
pub trait EdgeHandler: Sync {
    fn on_edge(&self, is_high: bool, at_ms: u64);
}

/// A digital input that reports both edges to one handler.
pub trait EdgeSource {
    /// Attach `handler`. A source accepts exactly one handler; a second
    /// call fails with [`SetupError::AlreadyRegistered`].
    fn register(&mut self, handler: &'static dyn EdgeHandler) -> Result<(), SetupError>;
}

// ───────────────────────────────────────────────────────────────
// Byte transport (driven adapter: domain ↔ UART)
// ───────────────────────────────────────────────────────────────

/// Raw serial link to the sensor.
pub trait ByteTransport {
    type Error: core::fmt::Debug;

    /// Queue `data` for transmission.
    fn write(&mut self, data: &[u8]) -> Result<(), Self::Error>;

    /// Bytes currently buffered for reading. Never blocks.
    fn available(&mut self) -> usize;

    /// Fill `buf` completely from the receive buffer.
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), Self::Error>;
}

// ───────────────────────────────────────────────────────────────
// Sensor port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Read-side port: the domain calls this to obtain a UART sample.
pub trait SensorPort {
    /// Run one request/response exchange.
    ///
    /// Returns `None` when no transport is wired.
    fn poll_uart(&mut self) -> Option<Result<u16, UartError>>;

    /// Push protocol settings (timeout, checksum policy) down to the driver.
    fn apply_config(&mut self, _config: &SensorConfig) {}
}

// ───────────────────────────────────────────────────────────────
// Value sink (domain → host framework)
// ───────────────────────────────────────────────────────────────

/// Where the arbitrated concentration goes. Called at most once per tick.
pub trait ValueSink {
    fn publish(&mut self, value: f32);
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists sensor configuration.
///
/// Implementations MUST validate before persisting. Invalid ranges are
/// rejected with [`ConfigError::ValidationFailed`], not clamped.
pub trait ConfigPort {
    /// Load configuration from persistent storage.
    /// Returns [`SensorConfig::default()`] if no stored config exists.
    fn load(&self) -> Result<SensorConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &SensorConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Clock
// ───────────────────────────────────────────────────────────────

/// Monotonic milliseconds since boot. Edge timestamps and tick times must
/// come from the same clock.
pub trait Clock {
    fn now_ms(&self) -> u64;
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
    /// Underlying storage is full.
    StorageFull,
    /// Generic I/O error from the storage backend.
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::StorageFull => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}
