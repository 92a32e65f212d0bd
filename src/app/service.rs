//! Application service: the hexagonal core.
//!
//! [`AppService`] owns the pulse accumulator and the live configuration.
//! Once per tick it collects a UART sample and a PWM estimate, picks one
//! with [`arbitrate`], and publishes it. All I/O flows through port traits
//! injected at call sites, making the entire service testable with mock
//! adapters.
//!
//! ```text
//!  EdgeQueue ──▶ ┌────────────────────────┐ ──▶ ValueSink
//!                │       AppService        │
//! SensorPort ──▶ │ pulses · arbitration    │ ──▶ EventSink
//!                └────────────────────────┘
//! ```

use log::{debug, error, info, warn};

use crate::config::SensorConfig;
use crate::error::{Error, Result, SetupError};
use crate::sensors::edge::EdgeQueue;
use crate::sensors::pulse::{PulseAccumulator, PulseWindow};
use crate::sensors::Reading;

use super::commands::AppCommand;
use super::events::{AppEvent, TelemetryData};
use super::ports::{ConfigPort, EdgeSource, EventSink, SensorPort, ValueSink};

/// Pick the value to publish: UART wins, PWM is the fallback.
pub fn arbitrate(uart: Option<f32>, pwm: Option<f32>) -> Option<Reading> {
    match (uart, pwm) {
        (Some(v), _) => Some(Reading::uart(v)),
        (None, Some(v)) => Some(Reading::pwm(v)),
        (None, None) => None,
    }
}

// ───────────────────────────────────────────────────────────────
// AppService
// ───────────────────────────────────────────────────────────────

pub struct AppService {
    config: SensorConfig,
    pulses: PulseAccumulator,
    edges: &'static EdgeQueue,
    edge_source_wired: bool,
    tick_count: u64,
    config_dirty: bool,
    last: Option<Reading>,
}

impl AppService {
    /// Construct the service. Does **not** attach the edge source; call
    /// [`start`](Self::start) next.
    pub fn new(config: SensorConfig, edges: &'static EdgeQueue) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            pulses: PulseAccumulator::from_config(0, &config),
            config,
            edges,
            edge_source_wired: false,
            tick_count: 0,
            config_dirty: false,
            last: None,
        })
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Wire the edge source and start the warm-up window at `now_ms`.
    ///
    /// Fails with [`SetupError::NoEdgeSource`] when PWM sensing is enabled
    /// but `source` is `None`; the caller must treat that as fatal.
    pub fn start(
        &mut self,
        now_ms: u64,
        source: Option<&mut dyn EdgeSource>,
        sink: &mut impl EventSink,
    ) -> core::result::Result<(), SetupError> {
        match source {
            Some(src) => {
                src.register(self.edges)?;
                self.edge_source_wired = true;
            }
            None if self.config.enable_pwm => {
                error!("PWM sensing enabled but no edge source is wired");
                return Err(SetupError::NoEdgeSource);
            }
            None => {}
        }

        // Edges queued before start belong to no measurement window.
        self.edges.drain(|_| {});
        self.edges.take_dropped();
        self.pulses = PulseAccumulator::from_config(now_ms, &self.config);

        let uart = self.config.enable_uart;
        let pwm = self.pwm_active();
        sink.emit(&AppEvent::Started { uart, pwm });
        info!("AppService started (uart={}, pwm={})", uart, pwm);
        Ok(())
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Move queued edges into the pulse history. Safe to call between
    /// ticks as often as the loop likes.
    pub fn process_edges(&mut self, sink: &mut impl EventSink) -> usize {
        let pulses = &mut self.pulses;
        let n = self.edges.drain(|e| pulses.on_edge(e.is_high, e.at_ms));

        let dropped = self.edges.take_dropped();
        if dropped > 0 {
            warn!("{} PWM edges dropped (queue full)", dropped);
            sink.emit(&AppEvent::EdgesDropped(dropped));
        }
        n
    }

    /// Run one acquisition cycle: edges → UART → PWM → arbitrate → publish.
    ///
    /// `out.publish` is called exactly once when a value is available and
    /// not at all otherwise.
    pub fn tick(
        &mut self,
        now_ms: u64,
        hw: &mut impl SensorPort,
        out: &mut impl ValueSink,
        sink: &mut impl EventSink,
    ) -> Option<Reading> {
        self.tick_count += 1;
        self.process_edges(sink);

        let uart = if self.config.enable_uart {
            match hw.poll_uart() {
                Some(Ok(raw)) => Some(f32::from(raw)),
                Some(Err(e)) => {
                    warn!("UART reading unavailable: {}", e);
                    sink.emit(&AppEvent::UartUnavailable(e));
                    None
                }
                None => None,
            }
        } else {
            None
        };

        let pwm = if self.pwm_active() {
            match self.pulses.try_compute(now_ms) {
                Ok(v) => Some(v),
                Err(e) => {
                    debug!("PWM reading unavailable: {}", e);
                    sink.emit(&AppEvent::PwmUnavailable(e));
                    None
                }
            }
        } else {
            None
        };

        let reading = arbitrate(uart, pwm);
        if let Some(r) = reading {
            out.publish(r.value);
            sink.emit(&AppEvent::Published(r));
        }
        self.last = reading;

        sink.emit(&AppEvent::Telemetry(TelemetryData {
            tick: self.tick_count,
            uart_ug_m3: uart,
            pwm_ug_m3: pwm,
            published: reading,
            history_len: self.pulses.len(),
            open_pulse: self.pulses.has_open_pulse(),
        }));

        reading
    }

    // ── Command handling ──────────────────────────────────────

    /// Process an external command.
    pub fn handle_command(&mut self, cmd: AppCommand, hw: &mut impl SensorPort) -> Result<()> {
        match cmd {
            AppCommand::UpdateConfig(new_config) => {
                new_config.validate()?;
                if new_config.enable_pwm && !self.edge_source_wired {
                    return Err(Error::Setup(SetupError::NoEdgeSource));
                }

                self.pulses.set_polarity(new_config.pulse_polarity);
                self.pulses.set_window(PulseWindow::from_config(&new_config));
                hw.apply_config(&new_config);
                self.config = new_config;
                self.config_dirty = true;
                info!("Configuration updated at runtime");
            }
            AppCommand::ClearHistory => {
                self.pulses.clear();
                info!("Pulse history cleared");
            }
        }
        Ok(())
    }

    // ── Queries ───────────────────────────────────────────────

    fn pwm_active(&self) -> bool {
        self.config.enable_pwm && self.edge_source_wired
    }

    pub fn config(&self) -> &SensorConfig {
        &self.config
    }

    pub fn pulses(&self) -> &PulseAccumulator {
        &self.pulses
    }

    /// Most recent published reading (`None` if the last tick had none).
    pub fn last_reading(&self) -> Option<Reading> {
        self.last
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    // ── Config persistence ────────────────────────────────────

    /// Persist the configuration if a runtime update changed it.
    /// Returns `true` if it was saved.
    pub fn save_if_dirty(&mut self, storage: &impl ConfigPort) -> bool {
        if !self.config_dirty {
            return false;
        }
        match storage.save(&self.config) {
            Ok(()) => {
                self.config_dirty = false;
                info!("Config saved to NVS");
                true
            }
            Err(e) => {
                warn!("Config save failed: {}", e);
                false
            }
        }
    }

    pub fn is_config_dirty(&self) -> bool {
        self.config_dirty
    }
}
