//! Console command adapter.
//!
//! A reader thread collects text lines from stdin (the ESP-IDF console on
//! target, the terminal on host) and hands them to the polling loop over a
//! bounded channel. The loop parses each line against the live
//! configuration and feeds the resulting [`AppCommand`] to
//! [`AppService::handle_command`].
//!
//! ```text
//!   clear                      drop the pulse history
//!   set <key> <value>          update one config field
//!
//!   keys: uart pwm            on | off
//!         polarity            low | high
//!         checksum            ignore | sum | complement
//!         window retention    ms
//!         timeout interval    ms
//!         drain               ms
//!         full_scale          ug/m3
//! ```

use std::io::BufRead;
use std::sync::mpsc::{Receiver, SyncSender, sync_channel};

use log::{info, warn};

use crate::app::commands::AppCommand;
use crate::app::ports::SensorPort;
use crate::app::service::AppService;
use crate::config::{ChecksumPolicy, PulsePolarity, SensorConfig};

/// Lines buffered between the reader thread and the loop.
pub const LINE_QUEUE_DEPTH: usize = 4;

const READER_STACK_SIZE: usize = 4096;
const READER_IDLE_MS: u64 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    Empty,
    UnknownCommand,
    UnknownKey,
    MissingValue,
    BadValue,
}

impl core::fmt::Display for ParseError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Empty => write!(f, "empty line"),
            Self::UnknownCommand => write!(f, "unknown command (try `clear` or `set`)"),
            Self::UnknownKey => write!(f, "unknown config key"),
            Self::MissingValue => write!(f, "missing value"),
            Self::BadValue => write!(f, "value does not parse for this key"),
        }
    }
}

fn parse_switch(v: &str) -> Result<bool, ParseError> {
    match v {
        "on" | "true" | "1" => Ok(true),
        "off" | "false" | "0" => Ok(false),
        _ => Err(ParseError::BadValue),
    }
}

fn parse_ms(v: &str) -> Result<u32, ParseError> {
    v.parse().map_err(|_| ParseError::BadValue)
}

/// Turn one console line into a command. `set` starts from `current` so
/// only the named field changes; range checks are left to
/// [`SensorConfig::validate`].
pub fn parse_command(line: &str, current: &SensorConfig) -> Result<AppCommand, ParseError> {
    let mut words = line.split_whitespace();
    match words.next() {
        None => Err(ParseError::Empty),
        Some("clear") => Ok(AppCommand::ClearHistory),
        Some("set") => {
            let key = words.next().ok_or(ParseError::MissingValue)?;
            let value = words.next().ok_or(ParseError::MissingValue)?;
            let mut cfg = current.clone();
            match key {
                "uart" => cfg.enable_uart = parse_switch(value)?,
                "pwm" => cfg.enable_pwm = parse_switch(value)?,
                "polarity" => {
                    cfg.pulse_polarity = match value {
                        "low" => PulsePolarity::ActiveLow,
                        "high" => PulsePolarity::ActiveHigh,
                        _ => return Err(ParseError::BadValue),
                    }
                }
                "checksum" => {
                    cfg.checksum_policy = match value {
                        "ignore" => ChecksumPolicy::Ignore,
                        "sum" => ChecksumPolicy::Sum,
                        "complement" => ChecksumPolicy::Complement,
                        _ => return Err(ParseError::BadValue),
                    }
                }
                "window" => cfg.measurement_window_ms = parse_ms(value)?,
                "retention" => cfg.retention_window_ms = parse_ms(value)?,
                "timeout" => cfg.uart_timeout_ms = parse_ms(value)?,
                "interval" => cfg.update_interval_ms = parse_ms(value)?,
                "drain" => cfg.edge_drain_interval_ms = parse_ms(value)?,
                "full_scale" => {
                    cfg.full_scale_ug_m3 = value.parse().map_err(|_| ParseError::BadValue)?;
                }
                _ => return Err(ParseError::UnknownKey),
            }
            Ok(AppCommand::UpdateConfig(cfg))
        }
        Some(_) => Err(ParseError::UnknownCommand),
    }
}

/// Inbound side of the console: owns the receiving end of the line channel.
pub struct ConsoleCommands {
    lines: Receiver<String>,
}

impl ConsoleCommands {
    /// Channel pair without a reader thread. The sender side is what the
    /// stdin reader (or a test) pushes lines into.
    pub fn with_channel() -> (Self, SyncSender<String>) {
        let (tx, rx) = sync_channel(LINE_QUEUE_DEPTH);
        (Self { lines: rx }, tx)
    }

    /// Start the stdin reader thread.
    pub fn spawn_stdin() -> std::io::Result<Self> {
        let (console, tx) = Self::with_channel();
        std::thread::Builder::new()
            .name("console".into())
            .stack_size(READER_STACK_SIZE)
            .spawn(move || read_stdin(&tx))?;
        info!("console: reading commands from stdin");
        Ok(console)
    }

    /// Apply every line received since the last call. Returns how many
    /// commands the service accepted.
    pub fn poll(&mut self, app: &mut AppService, hw: &mut impl SensorPort) -> usize {
        let mut accepted = 0;
        while let Ok(line) = self.lines.try_recv() {
            let cmd = match parse_command(&line, app.config()) {
                Ok(cmd) => cmd,
                Err(ParseError::Empty) => continue,
                Err(e) => {
                    warn!("console: `{}`: {}", line.trim(), e);
                    continue;
                }
            };
            match app.handle_command(cmd, hw) {
                Ok(()) => accepted += 1,
                Err(e) => warn!("console: `{}` rejected: {}", line.trim(), e),
            }
        }
        accepted
    }
}

/// Reader thread body. An idle console reports EOF or `WouldBlock` on the
/// ESP-IDF VFS, so the loop backs off and retries instead of exiting. A
/// partial line stays buffered until its newline arrives.
fn read_stdin(tx: &SyncSender<String>) {
    let stdin = std::io::stdin();
    let mut line = String::new();
    loop {
        match stdin.lock().read_line(&mut line) {
            Ok(n) if n > 0 && line.ends_with('\n') => {
                if tx.send(line.trim().to_owned()).is_err() {
                    return;
                }
                line.clear();
            }
            _ => std::thread::sleep(std::time::Duration::from_millis(READER_IDLE_MS)),
        }
    }
}
