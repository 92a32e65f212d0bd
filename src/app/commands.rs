//! Inbound commands to the application service.
//!
//! These represent actions requested by the outside world (console,
//! provisioning, tests) that the [`AppService`](super::service::AppService)
//! interprets and acts upon.

use crate::config::SensorConfig;

/// Commands that external adapters can send into the application core.
#[derive(Debug, Clone)]
pub enum AppCommand {
    /// Hot-reload configuration. Validated before it takes effect.
    UpdateConfig(SensorConfig),

    /// Drop every stored pulse record and the open pulse.
    ClearHistory,
}
