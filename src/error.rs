//! Unified error types for the PM1003PH firmware.
//!
//! Each acquisition path has its own small error enum; all of them convert
//! into the top-level [`Error`] so the tick orchestrator and `main` handle
//! failures uniformly. Every variant is `Copy` so errors can be carried
//! inside [`AppEvent`](crate::app::events::AppEvent)s without allocation.
//!
//! Only [`SetupError`] is fatal. UART and PWM errors are transient and
//! simply mean "no reading from that source this tick".

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The UART request/response exchange failed.
    Uart(UartError),
    /// The pulse accumulator has no usable estimate yet.
    Pwm(PwmError),
    /// Component wiring is incomplete; the component must halt.
    Setup(SetupError),
    /// Configuration is invalid.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uart(e) => write!(f, "uart: {e}"),
            Self::Pwm(e) => write!(f, "pwm: {e}"),
            Self::Setup(e) => write!(f, "setup: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// UART acquisition errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UartError {
    /// The transport rejected the request frame.
    WriteFailed,
    /// The transport reported enough bytes but the read itself failed.
    ReadFailed,
    /// Fewer than a full frame arrived before the deadline.
    Timeout { available: usize },
    /// The first three bytes are not the response magic.
    BadHeader { header: [u8; 3] },
    /// The trailing checksum byte does not match the selected policy.
    Checksum { expected: u8, actual: u8 },
}

impl fmt::Display for UartError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WriteFailed => write!(f, "request write failed"),
            Self::ReadFailed => write!(f, "response read failed"),
            Self::Timeout { available } => {
                write!(f, "response timeout ({available}/20 bytes)")
            }
            Self::BadHeader { header } => write!(f, "invalid header {:02X?}", header),
            Self::Checksum { expected, actual } => write!(
                f,
                "checksum mismatch (expected {:02X}, got {:02X})",
                expected, actual
            ),
        }
    }
}

impl From<UartError> for Error {
    fn from(e: UartError) -> Self {
        Self::Uart(e)
    }
}

// ---------------------------------------------------------------------------
// Pulse accumulator errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PwmError {
    /// No completed pulse is inside the retention window.
    NoHistory,
    /// Less than one full measurement window has elapsed since start.
    WarmingUp { remaining_ms: u64 },
}

impl fmt::Display for PwmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoHistory => write!(f, "no pulse history"),
            Self::WarmingUp { remaining_ms } => {
                write!(f, "warming up ({remaining_ms} ms remaining)")
            }
        }
    }
}

impl From<PwmError> for Error {
    fn from(e: PwmError) -> Self {
        Self::Pwm(e)
    }
}

// ---------------------------------------------------------------------------
// Setup errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupError {
    /// Pulse sensing is enabled but no edge source is wired.
    NoEdgeSource,
    /// The edge source already has a handler.
    AlreadyRegistered,
    /// GPIO interrupt service could not be installed (ESP-IDF return code).
    IsrInstall(i32),
}

impl fmt::Display for SetupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoEdgeSource => write!(f, "PWM sensing enabled without an edge source"),
            Self::AlreadyRegistered => write!(f, "edge source already has a handler"),
            Self::IsrInstall(rc) => write!(f, "GPIO ISR install failed (rc={})", rc),
        }
    }
}

impl From<SetupError> for Error {
    fn from(e: SetupError) -> Self {
        Self::Setup(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
