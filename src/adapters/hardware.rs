//! Hardware adapter: bridges the sensor's UART link to [`SensorPort`].
//!
//! Owns the optional [`Pm1003Uart`] driver. With no transport wired,
//! [`SensorPort::poll_uart`] reports `None` and the service falls back to
//! the PWM path. Generic over the transport and delay so the same adapter
//! runs on target (`EspUartTransport` + `FreeRtos`) and in host tests.

use embedded_hal::delay::DelayNs;

use crate::app::ports::{ByteTransport, SensorPort};
use crate::config::SensorConfig;
use crate::error::UartError;
use crate::sensors::uart::Pm1003Uart;

/// Concrete adapter that puts the PM1003PH UART behind the port trait.
pub struct HardwareAdapter<T, D> {
    uart: Option<Pm1003Uart<T, D>>,
}

impl<T: ByteTransport, D: DelayNs> HardwareAdapter<T, D> {
    pub fn new(uart: Option<Pm1003Uart<T, D>>) -> Self {
        Self { uart }
    }

    /// Adapter for a wired transport, configured from `config`.
    pub fn with_transport(transport: T, delay: D, config: &SensorConfig) -> Self {
        let mut adapter = Self::new(Some(Pm1003Uart::new(transport, delay)));
        adapter.apply_config(config);
        adapter
    }

    pub fn has_uart(&self) -> bool {
        self.uart.is_some()
    }

    /// Hand back the transport and delay, if a UART was wired.
    pub fn release(self) -> Option<(T, D)> {
        self.uart.map(Pm1003Uart::release)
    }
}

// ── SensorPort implementation ─────────────────────────────────

impl<T: ByteTransport, D: DelayNs> SensorPort for HardwareAdapter<T, D> {
    fn poll_uart(&mut self) -> Option<Result<u16, UartError>> {
        self.uart.as_mut().map(Pm1003Uart::read_pm2_5)
    }

    fn apply_config(&mut self, config: &SensorConfig) {
        if let Some(uart) = self.uart.as_mut() {
            uart.set_timeout_ms(config.uart_timeout_ms);
            uart.set_checksum_policy(config.checksum_policy);
        }
    }
}
