//! Sensor subsystem: the two PM1003PH acquisition paths.
//!
//! - [`uart`]: request/response binary protocol.
//! - [`pulse`]: duty-cycle estimate from the PWM output.
//! - [`edge`]: interrupt-safe queue feeding [`pulse`].
//!
//! Both paths yield µg/m³; the service picks one per tick and tags it
//! with its [`Source`].

pub mod edge;
pub mod pulse;
pub mod uart;

/// Which acquisition path produced a reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Uart,
    Pwm,
}

/// One published PM2.5 concentration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    /// µg/m³
    pub value: f32,
    pub source: Source,
}

impl Reading {
    pub const fn uart(value: f32) -> Self {
        Self {
            value,
            source: Source::Uart,
        }
    }

    pub const fn pwm(value: f32) -> Self {
        Self {
            value,
            source: Source::Pwm,
        }
    }
}
