//! Sensor configuration parameters
//!
//! All tunable parameters for the PM1003PH component. Defaults match the
//! sensor's native protocol; values can be overridden via NVS.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Which pin level the sensor holds while a measured pulse is in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PulsePolarity {
    /// Pulse opens on the falling edge and closes on the rising edge.
    ActiveLow,
    /// Pulse opens on the rising edge and closes on the falling edge.
    ActiveHigh,
}

impl PulsePolarity {
    /// Pin level that opens a pulse.
    pub const fn active_level(self) -> bool {
        matches!(self, Self::ActiveHigh)
    }
}

/// How the trailing byte of a UART response frame is checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChecksumPolicy {
    /// Accept any checksum byte; mismatches are only logged.
    Ignore,
    /// Byte 19 equals the sum of bytes 0..19, mod 256.
    Sum,
    /// All 20 bytes sum to zero mod 256 (two's-complement checksum).
    Complement,
}

/// Core sensor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorConfig {
    // --- Acquisition paths ---
    /// Run the UART request/response exchange each tick.
    pub enable_uart: bool,
    /// Compute the pulse-derived concentration each tick.
    pub enable_pwm: bool,

    // --- PWM ---
    pub pulse_polarity: PulsePolarity,
    /// Trailing window over which the duty cycle is computed (ms).
    pub measurement_window_ms: u32,
    /// Maximum age of a pulse record before eviction (ms).
    pub retention_window_ms: u32,
    /// Concentration reported at 100 % duty (µg/m³).
    pub full_scale_ug_m3: f32,

    // --- UART ---
    pub checksum_policy: ChecksumPolicy,
    /// Upper bound on the wait for a full response frame (ms).
    pub uart_timeout_ms: u32,

    // --- Timing ---
    /// Poll interval between published readings (ms).
    pub update_interval_ms: u32,
    /// How often the main loop drains queued edge events (ms).
    pub edge_drain_interval_ms: u32,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            enable_uart: true,
            enable_pwm: true,

            pulse_polarity: PulsePolarity::ActiveLow,
            measurement_window_ms: 30_000,
            retention_window_ms: 70_000,
            full_scale_ug_m3: 1000.0,

            checksum_policy: ChecksumPolicy::Ignore,
            uart_timeout_ms: 50,

            update_interval_ms: 30_000,
            edge_drain_interval_ms: 100,
        }
    }
}

impl SensorConfig {
    /// Range-check every field. Invalid values are rejected, never clamped.
    pub fn validate(&self) -> Result<()> {
        if !self.enable_uart && !self.enable_pwm {
            return Err(Error::Config("at least one of enable_uart/enable_pwm must be set"));
        }
        if !(1_000..=3_600_000).contains(&self.update_interval_ms) {
            return Err(Error::Config("update_interval_ms must be 1000–3600000"));
        }
        if !(10..=1_000).contains(&self.uart_timeout_ms) {
            return Err(Error::Config("uart_timeout_ms must be 10–1000"));
        }
        if self.uart_timeout_ms >= self.update_interval_ms {
            return Err(Error::Config("uart_timeout_ms must be < update_interval_ms"));
        }
        if self.retention_window_ms > 600_000 {
            return Err(Error::Config("retention_window_ms must be <= 600000"));
        }
        if self.measurement_window_ms < 1_000 || self.measurement_window_ms > self.retention_window_ms {
            return Err(Error::Config(
                "measurement_window_ms must be 1000–retention_window_ms",
            ));
        }
        if !(self.full_scale_ug_m3 > 0.0 && self.full_scale_ug_m3.is_finite()) {
            return Err(Error::Config("full_scale_ug_m3 must be a positive number"));
        }
        if self.edge_drain_interval_ms < 10 || self.edge_drain_interval_ms > self.update_interval_ms {
            return Err(Error::Config("edge_drain_interval_ms must be 10–update_interval_ms"));
        }
        Ok(())
    }
}
