//! ESP-IDF UART transport for the PM1003PH.
//!
//! Wraps [`UartDriver`] as a [`ByteTransport`]. All calls are
//! non-blocking; the bounded wait lives in
//! [`Pm1003Uart`](crate::sensors::uart::Pm1003Uart).

use esp_idf_hal::delay::{BLOCK, NON_BLOCK};
use esp_idf_hal::gpio::{InputPin, OutputPin};
use esp_idf_hal::peripheral::Peripheral;
use esp_idf_hal::prelude::*;
use esp_idf_hal::uart::{Uart, UartConfig, UartDriver};
use esp_idf_svc::sys::EspError;
use log::info;

use crate::app::ports::ByteTransport;
use crate::pins;

#[derive(Debug)]
pub enum LinkError {
    Esp(EspError),
    /// `remaining_read` promised more bytes than `read` delivered.
    ShortRead { wanted: usize, got: usize },
}

impl From<EspError> for LinkError {
    fn from(e: EspError) -> Self {
        Self::Esp(e)
    }
}

pub struct EspUartTransport<'d> {
    uart: UartDriver<'d>,
}

impl<'d> EspUartTransport<'d> {
    pub fn new(uart: UartDriver<'d>) -> Self {
        Self { uart }
    }

    /// Open the UART at the sensor's fixed 9600 8N1.
    pub fn open(
        uart: impl Peripheral<P = impl Uart> + 'd,
        tx: impl Peripheral<P = impl OutputPin> + 'd,
        rx: impl Peripheral<P = impl InputPin> + 'd,
    ) -> Result<Self, EspError> {
        let cfg = UartConfig::new().baudrate(pins::PM_UART_BAUD.Hz());
        let uart = UartDriver::new(
            uart,
            tx,
            rx,
            None::<esp_idf_hal::gpio::AnyIOPin>,
            None::<esp_idf_hal::gpio::AnyIOPin>,
            &cfg,
        )?;
        info!("uart: PM1003PH link at {} baud", pins::PM_UART_BAUD);
        Ok(Self::new(uart))
    }
}

impl ByteTransport for EspUartTransport<'_> {
    type Error = LinkError;

    fn write(&mut self, data: &[u8]) -> Result<(), LinkError> {
        let mut sent = 0;
        while sent < data.len() {
            sent += self.uart.write(&data[sent..])?;
        }
        self.uart.wait_tx_done(BLOCK)?;
        Ok(())
    }

    fn available(&mut self) -> usize {
        self.uart.remaining_read().unwrap_or(0)
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), LinkError> {
        let mut got = 0;
        while got < buf.len() {
            let n = self.uart.read(&mut buf[got..], NON_BLOCK)?;
            if n == 0 {
                return Err(LinkError::ShortRead {
                    wanted: buf.len(),
                    got,
                });
            }
            got += n;
        }
        Ok(())
    }
}
