//! PM1003PH Firmware: Main Entry Point
//!
//! Hexagonal architecture with a fixed-rate polling loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  HardwareAdapter   GpioEdgeSource  LogEventSink   NvsAdapter   │
//! │  (SensorPort)      (EdgeSource)    (EventSink)    (ConfigPort) │
//! │  LogValueSink      Esp32Time       ConsoleCommands             │
//! │  (ValueSink)       (Clock)         (AppCommand in)             │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              AppService (pure logic)                   │    │
//! │  │  pulse history · UART decode · arbitration             │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::Result;
use esp_idf_hal::delay::FreeRtos;
use esp_idf_hal::gpio::AnyIOPin;
use esp_idf_hal::peripherals::Peripherals;
use log::{error, info, warn};

use pm1003ph::adapters::console::ConsoleCommands;
use pm1003ph::adapters::gpio_edge::GpioEdgeSource;
use pm1003ph::adapters::hardware::HardwareAdapter;
use pm1003ph::adapters::log_sink::{LogEventSink, LogValueSink};
use pm1003ph::adapters::nvs::NvsAdapter;
use pm1003ph::adapters::time::Esp32TimeAdapter;
use pm1003ph::adapters::uart::EspUartTransport;
use pm1003ph::app::ports::{Clock, ConfigPort, EdgeSource};
use pm1003ph::app::service::AppService;
use pm1003ph::config::SensorConfig;
use pm1003ph::drivers::hw_init;
use pm1003ph::pins;
use pm1003ph::sensors::edge::PWM_EDGES;

/// Park the main task forever. The task watchdog is not subscribed, so the
/// device stays up with the failure visible in the log.
fn halt() -> ! {
    loop {
        FreeRtos::delay_ms(1_000);
    }
}

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("PM1003PH firmware v{}", env!("CARGO_PKG_VERSION"));

    // ── 2. Initialise hardware peripherals ────────────────────
    if let Err(e) = hw_init::init_peripherals() {
        error!("HAL init failed: {}, halting", e);
        halt();
    }

    // ── 3. Load config from NVS (or defaults) ─────────────────
    let nvs = match NvsAdapter::new() {
        Ok(n) => Some(n),
        Err(e) => {
            warn!("NVS init failed ({}), running with defaults and no persistence", e);
            None
        }
    };
    let config = match nvs.as_ref().map(|n| n.load()) {
        Some(Ok(cfg)) => cfg,
        Some(Err(e)) => {
            warn!("NVS config load failed ({}), using defaults", e);
            SensorConfig::default()
        }
        None => SensorConfig::default(),
    };

    let clock = Esp32TimeAdapter::new();

    // ── 4. UART link ──────────────────────────────────────────
    let peripherals = Peripherals::take()?;
    let transport = if config.enable_uart {
        // SAFETY: the UART pins are used by nothing else on this board.
        let (tx, rx) = unsafe {
            (
                AnyIOPin::new(pins::PM_UART_TX_GPIO),
                AnyIOPin::new(pins::PM_UART_RX_GPIO),
            )
        };
        match EspUartTransport::open(peripherals.uart1, tx, rx) {
            Ok(t) => Some(t),
            Err(e) => {
                warn!("UART open failed ({}), continuing without UART", e);
                None
            }
        }
    } else {
        None
    };
    let mut hw = match transport {
        Some(t) => HardwareAdapter::with_transport(t, FreeRtos, &config),
        None => HardwareAdapter::new(None),
    };

    // ── 5. PWM edge source ────────────────────────────────────
    let mut edge_source = if config.enable_pwm {
        match hw_init::init_isr_service() {
            Ok(()) => Some(GpioEdgeSource::new(pins::PM_PWM_GPIO)),
            Err(e) => {
                error!("ISR service init failed: {}", e);
                None
            }
        }
    } else {
        None
    };

    // ── 6. Service ────────────────────────────────────────────
    let mut log_sink = LogEventSink::new();
    let mut values = LogValueSink::new();

    let mut app = AppService::new(config, &PWM_EDGES)?;
    let source = edge_source.as_mut().map(|s| s as &mut dyn EdgeSource);
    if let Err(e) = app.start(clock.now_ms(), source, &mut log_sink) {
        error!("Setup failed: {}, halting", e);
        halt();
    }

    let mut console = match ConsoleCommands::spawn_stdin() {
        Ok(c) => Some(c),
        Err(e) => {
            warn!("Console reader not started ({}), runtime commands disabled", e);
            None
        }
    };

    info!("System ready. Entering polling loop.");

    // ── 7. Polling loop ───────────────────────────────────────
    let mut next_tick_ms = clock.now_ms();
    loop {
        app.process_edges(&mut log_sink);

        if let Some(c) = console.as_mut() {
            c.poll(&mut app, &mut hw);
        }

        let now = clock.now_ms();
        if now >= next_tick_ms {
            app.tick(now, &mut hw, &mut values, &mut log_sink);
            next_tick_ms = now + u64::from(app.config().update_interval_ms);

            if let Some(store) = nvs.as_ref() {
                app.save_if_dirty(store);
            }
        }

        FreeRtos::delay_ms(app.config().edge_drain_interval_ms);
    }
}
