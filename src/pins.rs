//! GPIO / peripheral pin assignments for the PM1003PH sensor board.
//!
//! Single source of truth: every driver references this module rather than
//! hard-coding pin numbers.

// ---------------------------------------------------------------------------
// PM1003PH UART (9600 8N1)
// ---------------------------------------------------------------------------

/// ESP32 TX → sensor RX.
pub const PM_UART_TX_GPIO: i32 = 17;
/// Sensor TX → ESP32 RX.
pub const PM_UART_RX_GPIO: i32 = 18;
pub const PM_UART_BAUD: u32 = 9_600;

// ---------------------------------------------------------------------------
// PM1003PH PWM output
// ---------------------------------------------------------------------------

/// Duty-cycle output, interrupt on both edges.
pub const PM_PWM_GPIO: i32 = 6;
