//! PM1003PH UART protocol driver.
//!
//! Request/response over a raw byte transport (9600 8N1):
//!
//! ```text
//! host → sensor   11 02 0B 01 E1                       (5 bytes, fixed)
//! sensor → host   16 11 0B xx xx [PM2.5 hi] [PM2.5 lo] ... [cs]   (20 bytes)
//!                 └─header─┘      offset 5    offset 6       19
//! ```
//!
//! PM2.5 is a big-endian `u16` in µg/m³ at offsets 5–6. Earlier sensor
//! firmware placed it at 2–3 and 6–7; only the 5–6 layout is supported.
//!
//! The checksum byte is checked according to [`ChecksumPolicy`]. The
//! default is [`ChecksumPolicy::Ignore`] because the sum-of-bytes rule
//! rejects real sensor output, while the request frame follows a
//! two's-complement rule ([`ChecksumPolicy::Complement`]).
//!
//! The response wait is bounded by summing the requested delay steps, not
//! by reading a clock. On target each step is a FreeRTOS delay rounded to
//! the scheduler tick, so the real wait can differ from `uart_timeout_ms`
//! by up to one tick per step.

use embedded_hal::delay::DelayNs;
use log::{debug, warn};

use crate::app::ports::ByteTransport;
use crate::config::ChecksumPolicy;
use crate::error::UartError;

/// Fixed "read particle measurement" request.
pub const REQUEST_FRAME: [u8; 5] = [0x11, 0x02, 0x0B, 0x01, 0xE1];

/// Response length in bytes.
pub const FRAME_LEN: usize = 20;

/// Response magic at offsets 0..3.
pub const RESPONSE_HEADER: [u8; 3] = [0x16, 0x11, 0x0B];

/// Offset of the big-endian PM2.5 field.
pub const PM2_5_OFFSET: usize = 5;

/// Interval between `available()` polls while waiting for a response.
pub const POLL_STEP_MS: u32 = 10;

pub const DEFAULT_TIMEOUT_MS: u32 = 50;

/// Sum of `bytes`, mod 256.
pub fn sum8(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

/// One raw 20-byte response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame(pub [u8; FRAME_LEN]);

impl Frame {
    pub fn header(&self) -> [u8; 3] {
        [self.0[0], self.0[1], self.0[2]]
    }

    pub fn has_valid_header(&self) -> bool {
        self.header() == RESPONSE_HEADER
    }

    /// Trailing checksum byte as received.
    pub fn checksum_byte(&self) -> u8 {
        self.0[FRAME_LEN - 1]
    }

    /// Checksum byte the given policy expects, or `None` for `Ignore`.
    pub fn expected_checksum(&self, policy: ChecksumPolicy) -> Option<u8> {
        let body = sum8(&self.0[..FRAME_LEN - 1]);
        match policy {
            ChecksumPolicy::Ignore => None,
            ChecksumPolicy::Sum => Some(body),
            ChecksumPolicy::Complement => Some(body.wrapping_neg()),
        }
    }

    /// PM2.5 concentration in µg/m³, unscaled.
    pub fn pm2_5(&self) -> u16 {
        u16::from_be_bytes([self.0[PM2_5_OFFSET], self.0[PM2_5_OFFSET + 1]])
    }

    /// Header check followed by the checksum policy.
    pub fn validate(&self, policy: ChecksumPolicy) -> Result<(), UartError> {
        if !self.has_valid_header() {
            return Err(UartError::BadHeader {
                header: self.header(),
            });
        }

        let actual = self.checksum_byte();
        match self.expected_checksum(policy) {
            Some(expected) if expected != actual => Err(UartError::Checksum { expected, actual }),
            Some(_) => Ok(()),
            None => {
                let sum = sum8(&self.0[..FRAME_LEN - 1]);
                if sum != actual && sum.wrapping_neg() != actual {
                    debug!(
                        "PM1003 checksum not verified: sum={:02X}, got {:02X}",
                        sum, actual
                    );
                }
                Ok(())
            }
        }
    }
}

/// Parse and validate a raw buffer, returning the PM2.5 value.
pub fn decode(buf: &[u8; FRAME_LEN], policy: ChecksumPolicy) -> Result<u16, UartError> {
    let frame = Frame(*buf);
    frame.validate(policy)?;
    Ok(frame.pm2_5())
}

/// PM1003PH sensor on a byte transport.
pub struct Pm1003Uart<T, D> {
    transport: T,
    delay: D,
    timeout_ms: u32,
    checksum: ChecksumPolicy,
}

impl<T: ByteTransport, D: DelayNs> Pm1003Uart<T, D> {
    pub fn new(transport: T, delay: D) -> Self {
        Self {
            transport,
            delay,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            checksum: ChecksumPolicy::Ignore,
        }
    }

    pub fn set_timeout_ms(&mut self, timeout_ms: u32) {
        self.timeout_ms = timeout_ms;
    }

    pub fn set_checksum_policy(&mut self, policy: ChecksumPolicy) {
        self.checksum = policy;
    }

    /// Request a sample and return the decoded PM2.5 value.
    pub fn read_pm2_5(&mut self) -> Result<u16, UartError> {
        let frame = self.request_and_read()?;
        debug!("PM1003 frame: {:02X?}", frame.0);
        if let Err(e) = frame.validate(self.checksum) {
            warn!("PM1003 frame rejected: {}", e);
            return Err(e);
        }
        Ok(frame.pm2_5())
    }

    /// Send the request and wait (bounded, yielding) for a full frame.
    pub fn request_and_read(&mut self) -> Result<Frame, UartError> {
        self.discard_stale();

        self.transport
            .write(&REQUEST_FRAME)
            .map_err(|_| UartError::WriteFailed)?;

        let mut waited_ms = 0;
        loop {
            let available = self.transport.available();
            if available >= FRAME_LEN {
                break;
            }
            if waited_ms >= self.timeout_ms {
                return Err(UartError::Timeout { available });
            }
            let step = POLL_STEP_MS.min(self.timeout_ms - waited_ms);
            self.delay.delay_ms(step);
            waited_ms += step;
        }

        let mut buf = [0u8; FRAME_LEN];
        self.transport
            .read_exact(&mut buf)
            .map_err(|_| UartError::ReadFailed)?;
        Ok(Frame(buf))
    }

    /// Drop bytes left over from a late or partial earlier response.
    fn discard_stale(&mut self) {
        let mut scratch = [0u8; FRAME_LEN];
        let mut stale = self.transport.available();
        while stale > 0 {
            let n = stale.min(FRAME_LEN);
            if self.transport.read_exact(&mut scratch[..n]).is_err() {
                break;
            }
            stale -= n;
        }
    }

    pub fn release(self) -> (T, D) {
        (self.transport, self.delay)
    }
}
