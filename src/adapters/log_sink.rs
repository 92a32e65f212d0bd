//! Log-based sink adapters.
//!
//! [`LogEventSink`] implements [`EventSink`] by writing structured
//! application events to the ESP-IDF logger (UART / USB-CDC in
//! production). [`LogValueSink`] stands in for the host framework's
//! sensor state when the firmware runs standalone.

use log::{debug, info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::{EventSink, ValueSink};

fn fmt_opt(v: Option<f32>) -> heapless::String<16> {
    use core::fmt::Write;
    let mut s = heapless::String::new();
    let _ = match v {
        Some(v) => write!(s, "{:.1}", v),
        None => write!(s, "--"),
    };
    s
}

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Telemetry(t) => {
                info!(
                    "TELEM | tick={} | uart={} pwm={} ug/m3 | published={} | \
                     pulses={} open={}",
                    t.tick,
                    fmt_opt(t.uart_ug_m3),
                    fmt_opt(t.pwm_ug_m3),
                    match t.published {
                        Some(r) => match r.source {
                            crate::sensors::Source::Uart => "uart",
                            crate::sensors::Source::Pwm => "pwm",
                        },
                        None => "none",
                    },
                    t.history_len,
                    t.open_pulse,
                );
            }
            AppEvent::Published(r) => {
                debug!("PUB   | {:.1} ug/m3 via {:?}", r.value, r.source);
            }
            AppEvent::UartUnavailable(e) => {
                debug!("UART  | {}", e);
            }
            AppEvent::PwmUnavailable(e) => {
                debug!("PWM   | {}", e);
            }
            AppEvent::EdgesDropped(n) => {
                warn!("EDGE  | {} dropped", n);
            }
            AppEvent::Started { uart, pwm } => {
                info!("START | uart={} pwm={}", uart, pwm);
            }
        }
    }
}

/// Publishes the arbitrated concentration to the log and keeps the last one.
#[derive(Default)]
pub struct LogValueSink {
    last: Option<f32>,
    count: u32,
}

impl LogValueSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self) -> Option<f32> {
        self.last
    }

    pub fn count(&self) -> u32 {
        self.count
    }
}

impl ValueSink for LogValueSink {
    fn publish(&mut self, value: f32) {
        self.last = Some(value);
        self.count = self.count.wrapping_add(1);
        info!("PM2.5 | {:.1} ug/m3", value);
    }
}
