//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter      | Implements          | Connects to               |
//! |--------------|---------------------|---------------------------|
//! | `console`    | (inbound commands)  | stdin / ESP-IDF console   |
//! | `gpio_edge`  | EdgeSource          | ESP32 GPIO any-edge ISR   |
//! | `hardware`   | SensorPort          | PM1003PH UART driver      |
//! | `log_sink`   | EventSink           | Serial log output         |
//! |              | ValueSink           |                           |
//! | `nvs`        | ConfigPort          | NVS / in-memory store     |
//! | `time`       | Clock               | ESP32 system timer        |
//! | `uart`       | ByteTransport       | ESP-IDF UART driver       |

pub mod console;
pub mod gpio_edge;
pub mod hardware;
pub mod log_sink;
pub mod nvs;
pub mod time;
#[cfg(target_os = "espidf")]
pub mod uart;
