//! Fuzz target: PM1003PH response decoding
//!
//! Feeds arbitrary bytes through a scripted transport into `Pm1003Uart`
//! and straight into `decode`, asserting that neither panics and that an
//! accepted frame always carries the response header.
//!
//! cargo fuzz run fuzz_frame_decoder

#![no_main]

use embedded_hal::delay::DelayNs;
use libfuzzer_sys::fuzz_target;
use pm1003ph::app::ports::ByteTransport;
use pm1003ph::config::ChecksumPolicy;
use pm1003ph::sensors::uart::{decode, Pm1003Uart, FRAME_LEN, RESPONSE_HEADER};

struct Replay<'a> {
    data: &'a [u8],
    pos: usize,
    sent: bool,
}

impl ByteTransport for Replay<'_> {
    type Error = ();

    fn write(&mut self, _data: &[u8]) -> Result<(), ()> {
        self.sent = true;
        Ok(())
    }

    fn available(&mut self) -> usize {
        if self.sent { self.data.len() - self.pos } else { 0 }
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), ()> {
        let end = self.pos + buf.len();
        if end > self.data.len() {
            return Err(());
        }
        buf.copy_from_slice(&self.data[self.pos..end]);
        self.pos = end;
        Ok(())
    }
}

struct NoDelay;

impl DelayNs for NoDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}

fuzz_target!(|data: &[u8]| {
    if data.len() >= FRAME_LEN {
        let mut frame = [0u8; FRAME_LEN];
        frame.copy_from_slice(&data[..FRAME_LEN]);
        for policy in [ChecksumPolicy::Ignore, ChecksumPolicy::Sum, ChecksumPolicy::Complement] {
            if decode(&frame, policy).is_ok() {
                assert_eq!(frame[..3], RESPONSE_HEADER);
            }
        }
    }

    let transport = Replay { data, pos: 0, sent: false };
    let mut dev = Pm1003Uart::new(transport, NoDelay);
    let _ = dev.read_pm2_5();
});
