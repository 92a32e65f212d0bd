//! PWM pulse accumulator for the PM1003PH duty-cycle output.
//!
//! The sensor encodes particulate density as the fraction of time its PWM
//! pin spends at the active level. Every edge is fed to [`PulseAccumulator::on_edge`];
//! completed pulses are kept in a bounded, time-ordered history and
//! [`PulseAccumulator::compute_concentration`] sums the pulse widths that
//! fall inside the trailing measurement window.
//!
//! ```text
//!   pin ──┐      ┌────┐         ┌──────
//!         └──────┘    └─────────┘
//!         ^open  ^close
//!         |<-d1->|    |<--d2--->|
//! ```
//!
//! The history never resets on read: it is self-windowing, bounded both
//! by age (retention window) and by count ([`HISTORY_CAP`]).

use heapless::Deque;
use log::trace;

use crate::config::{PulsePolarity, SensorConfig};
use crate::error::PwmError;

/// Hard cap on stored pulse records.
pub const HISTORY_CAP: usize = 1000;

/// One completed pulse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PulseRecord {
    /// Time the pulse closed (ms since boot).
    pub timestamp_ms: u64,
    /// Pulse width (ms).
    pub duration_ms: u64,
}

/// Window parameters, copied out of [`SensorConfig`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PulseWindow {
    pub measurement_ms: u64,
    pub retention_ms: u64,
    pub full_scale_ug_m3: f32,
}

impl Default for PulseWindow {
    fn default() -> Self {
        Self::from_config(&SensorConfig::default())
    }
}

impl PulseWindow {
    pub fn from_config(cfg: &SensorConfig) -> Self {
        Self {
            measurement_ms: u64::from(cfg.measurement_window_ms),
            retention_ms: u64::from(cfg.retention_window_ms),
            full_scale_ug_m3: cfg.full_scale_ug_m3,
        }
    }
}

/// Streaming duty-cycle estimator.
pub struct PulseAccumulator {
    history: Deque<PulseRecord, HISTORY_CAP>,
    /// Start of the currently open pulse, if any.
    pulse_start_ms: Option<u64>,
    measurement_start_ms: u64,
    polarity: PulsePolarity,
    window: PulseWindow,
}

impl PulseAccumulator {
    /// `now_ms` becomes the measurement start used by the warm-up gate.
    pub fn new(now_ms: u64, polarity: PulsePolarity, window: PulseWindow) -> Self {
        Self {
            history: Deque::new(),
            pulse_start_ms: None,
            measurement_start_ms: now_ms,
            polarity,
            window,
        }
    }

    pub fn from_config(now_ms: u64, cfg: &SensorConfig) -> Self {
        Self::new(now_ms, cfg.pulse_polarity, PulseWindow::from_config(cfg))
    }

    /// Feed one pin transition. Must be called in arrival order.
    pub fn on_edge(&mut self, is_high: bool, now_ms: u64) {
        if is_high == self.polarity.active_level() {
            // A repeated opening edge (bounce) restarts the pulse.
            self.pulse_start_ms = Some(now_ms);
            return;
        }

        let Some(start) = self.pulse_start_ms.take() else {
            trace!("pulse: closing edge at {} ms with no open pulse", now_ms);
            return;
        };

        self.evict_stale(now_ms);
        if self.history.is_full() {
            self.history.pop_front();
        }
        let record = PulseRecord {
            timestamp_ms: now_ms,
            duration_ms: now_ms.saturating_sub(start),
        };
        // Cannot fail: a slot was freed above.
        let _ = self.history.push_back(record);
    }

    /// Duty-cycle concentration over the trailing measurement window.
    pub fn compute_concentration(&mut self, now_ms: u64) -> Option<f32> {
        self.try_compute(now_ms).ok()
    }

    /// Like [`compute_concentration`](Self::compute_concentration), but says
    /// why no value is available.
    pub fn try_compute(&mut self, now_ms: u64) -> Result<f32, PwmError> {
        self.evict_stale(now_ms);
        if self.history.is_empty() {
            return Err(PwmError::NoHistory);
        }

        let window = self.window.measurement_ms;
        let summed_ms: u64 = self
            .history
            .iter()
            .filter(|r| now_ms.saturating_sub(r.timestamp_ms) <= window)
            .map(|r| r.duration_ms)
            .sum();

        let elapsed = now_ms.saturating_sub(self.measurement_start_ms);
        if elapsed < window {
            return Err(PwmError::WarmingUp {
                remaining_ms: window - elapsed,
            });
        }

        let duty = summed_ms as f32 / window as f32;
        Ok(duty * self.window.full_scale_ug_m3)
    }

    /// Drop records older than the retention window (front first).
    fn evict_stale(&mut self, now_ms: u64) {
        while let Some(oldest) = self.history.front() {
            if now_ms.saturating_sub(oldest.timestamp_ms) > self.window.retention_ms {
                self.history.pop_front();
            } else {
                break;
            }
        }
    }

    /// Switch the measured level. Any open pulse is discarded.
    pub fn set_polarity(&mut self, polarity: PulsePolarity) {
        if polarity != self.polarity {
            self.polarity = polarity;
            self.pulse_start_ms = None;
        }
    }

    pub fn set_window(&mut self, window: PulseWindow) {
        self.window = window;
    }

    /// Forget every record and the open pulse. The warm-up gate is kept.
    pub fn clear(&mut self) {
        self.history.clear();
        self.pulse_start_ms = None;
    }

    pub fn records(&self) -> impl Iterator<Item = &PulseRecord> {
        self.history.iter()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn has_open_pulse(&self) -> bool {
        self.pulse_start_ms.is_some()
    }

    pub fn measurement_start_ms(&self) -> u64 {
        self.measurement_start_ms
    }
}
