//! Outbound application events.
//!
//! The [`AppService`](super::service::AppService) emits these through the
//! [`EventSink`](super::ports::EventSink) port. Adapters on the other
//! side decide what to do with them.

use crate::error::{PwmError, UartError};
use crate::sensors::Reading;

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// The service has started with these acquisition paths active.
    Started { uart: bool, pwm: bool },

    /// A concentration was handed to the value sink.
    Published(Reading),

    /// The UART exchange produced no value this tick.
    UartUnavailable(UartError),

    /// The pulse accumulator produced no value this tick.
    PwmUnavailable(PwmError),

    /// Edges lost to a full interrupt queue since the last drain.
    EdgesDropped(u32),

    /// Per-tick snapshot of both candidates.
    Telemetry(TelemetryData),
}

/// One tick's acquisition results, for logging or comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryData {
    pub tick: u64,
    pub uart_ug_m3: Option<f32>,
    pub pwm_ug_m3: Option<f32>,
    pub published: Option<Reading>,
    pub history_len: usize,
    pub open_pulse: bool,
}
