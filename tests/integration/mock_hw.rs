//! Mock adapters for integration tests.
//!
//! Records every port call so tests can assert on the full history
//! without touching real UART or GPIO registers.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

use embedded_hal::delay::DelayNs;
use pm1003ph::app::events::AppEvent;
use pm1003ph::app::ports::{
    ByteTransport, ConfigError, ConfigPort, EdgeHandler, EdgeSource, EventSink, SensorPort,
    ValueSink,
};
use pm1003ph::config::SensorConfig;
use pm1003ph::error::{SetupError, UartError};
use pm1003ph::sensors::edge::EdgeQueue;

/// Fresh queue per test; tests run in parallel.
pub fn leak_queue() -> &'static EdgeQueue {
    Box::leak(Box::new(EdgeQueue::new()))
}

// ── MockSensor ────────────────────────────────────────────────

/// `SensorPort` that returns a fixed UART outcome every tick.
pub struct MockSensor {
    pub uart: Option<Result<u16, UartError>>,
    pub polls: u32,
    pub applied: Vec<SensorConfig>,
}

#[allow(dead_code)]
impl MockSensor {
    pub fn new(uart: Option<Result<u16, UartError>>) -> Self {
        Self {
            uart,
            polls: 0,
            applied: Vec::new(),
        }
    }

    pub fn unwired() -> Self {
        Self::new(None)
    }
}

impl SensorPort for MockSensor {
    fn poll_uart(&mut self) -> Option<Result<u16, UartError>> {
        self.polls += 1;
        self.uart
    }

    fn apply_config(&mut self, config: &SensorConfig) {
        self.applied.push(config.clone());
    }
}

// ── Sinks ─────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingValues {
    pub published: Vec<f32>,
}

impl ValueSink for RecordingValues {
    fn publish(&mut self, value: f32) {
        self.published.push(value);
    }
}

#[derive(Default)]
pub struct LogSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for LogSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── Edge sources ──────────────────────────────────────────────

/// Edge source whose ISR install always fails.
pub struct BrokenEdgeSource;

impl EdgeSource for BrokenEdgeSource {
    fn register(&mut self, _handler: &'static dyn EdgeHandler) -> Result<(), SetupError> {
        Err(SetupError::IsrInstall(-1))
    }
}

// ── MockNvs ───────────────────────────────────────────────────

#[derive(Default)]
pub struct MockNvs {
    pub stored: RefCell<Option<SensorConfig>>,
    pub saves: Cell<u32>,
}

impl ConfigPort for MockNvs {
    fn load(&self) -> Result<SensorConfig, ConfigError> {
        Ok(self.stored.borrow().clone().unwrap_or_default())
    }

    fn save(&self, config: &SensorConfig) -> Result<(), ConfigError> {
        self.saves.set(self.saves.get() + 1);
        *self.stored.borrow_mut() = Some(config.clone());
        Ok(())
    }
}

// ── Scripted UART ─────────────────────────────────────────────

/// Byte transport that answers every request with the next scripted reply.
pub struct ScriptedUart {
    replies: VecDeque<Vec<u8>>,
    rx: VecDeque<u8>,
    pub requests: u32,
}

#[allow(dead_code)]
impl ScriptedUart {
    pub fn new(replies: impl IntoIterator<Item = Vec<u8>>) -> Self {
        Self {
            replies: replies.into_iter().collect(),
            rx: VecDeque::new(),
            requests: 0,
        }
    }
}

impl ByteTransport for ScriptedUart {
    type Error = ();

    fn write(&mut self, _data: &[u8]) -> Result<(), ()> {
        self.requests += 1;
        if let Some(reply) = self.replies.pop_front() {
            self.rx.extend(reply);
        }
        Ok(())
    }

    fn available(&mut self) -> usize {
        self.rx.len()
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), ()> {
        if self.rx.len() < buf.len() {
            return Err(());
        }
        for b in buf.iter_mut() {
            *b = self.rx.pop_front().ok_or(())?;
        }
        Ok(())
    }
}

pub struct NoDelay;

impl DelayNs for NoDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}

/// Delay that only records how long it was asked to wait.
#[derive(Default)]
pub struct CountingDelay {
    pub total_ns: u64,
}

impl DelayNs for CountingDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ns += u64::from(ns);
    }
}

/// Valid 20-byte response carrying `pm`.
#[allow(dead_code)]
pub fn pm_frame(pm: u16) -> Vec<u8> {
    let mut f = vec![0u8; 20];
    f[..3].copy_from_slice(&[0x16, 0x11, 0x0B]);
    f[5..7].copy_from_slice(&pm.to_be_bytes());
    f[19] = f[..19].iter().fold(0u8, |a, b| a.wrapping_add(*b));
    f
}

/// Response with a correct header and a checksum byte that matches
/// neither the sum nor the complement rule.
#[allow(dead_code)]
pub fn pm_frame_bad_checksum(pm: u16) -> Vec<u8> {
    let mut f = pm_frame(pm);
    f[19] = f[19].wrapping_add(1);
    f
}
