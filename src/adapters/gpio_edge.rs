//! GPIO edge source for the PM1003PH PWM output.
//!
//! - **`target_os = "espidf"`**: any-edge interrupt on the configured pin.
//!   The ISR reads the pin level, timestamps with `esp_timer_get_time()`
//!   and forwards to the registered [`EdgeHandler`].
//! - **`not(target_os = "espidf")`**: no interrupt; tests and simulation
//!   inject edges with [`GpioEdgeSource::sim_fire`].

use log::info;

use crate::app::ports::{EdgeHandler, EdgeSource};
use crate::error::SetupError;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

/// Per-pin state handed to the ISR as its argument. Leaked on
/// registration; lives for the rest of the program.
#[cfg(target_os = "espidf")]
struct IsrContext {
    pin: i32,
    handler: &'static dyn EdgeHandler,
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn pwm_edge_isr(arg: *mut core::ffi::c_void) {
    // SAFETY: `arg` is the leaked `IsrContext` installed in `register`.
    let ctx = unsafe { &*(arg as *const IsrContext) };
    // SAFETY: esp_timer_get_time is an RTC counter read; safe in ISR context.
    let at_ms = (unsafe { esp_timer_get_time() } / 1_000) as u64;
    let is_high = crate::drivers::hw_init::gpio_read(ctx.pin);
    ctx.handler.on_edge(is_high, at_ms);
}

/// Map an ESP-IDF return code onto the registration error.
#[cfg_attr(not(target_os = "espidf"), allow(dead_code))]
fn esp_check(code: i32) -> Result<(), SetupError> {
    if code == 0 {
        Ok(())
    } else {
        Err(SetupError::IsrInstall(code))
    }
}

pub struct GpioEdgeSource {
    pin: i32,
    handler: Option<&'static dyn EdgeHandler>,
}

impl GpioEdgeSource {
    /// The pin must already be configured as an input and the ISR service
    /// installed (see [`hw_init`](crate::drivers::hw_init)).
    pub fn new(pin: i32) -> Self {
        Self { pin, handler: None }
    }

    pub fn pin(&self) -> i32 {
        self.pin
    }

    pub fn is_registered(&self) -> bool {
        self.handler.is_some()
    }

    /// Deliver an edge as if the pin had changed. Returns `false` when no
    /// handler is attached.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_fire(&self, is_high: bool, at_ms: u64) -> bool {
        match self.handler {
            Some(h) => {
                h.on_edge(is_high, at_ms);
                true
            }
            None => false,
        }
    }
}

impl EdgeSource for GpioEdgeSource {
    #[cfg(target_os = "espidf")]
    fn register(&mut self, handler: &'static dyn EdgeHandler) -> Result<(), SetupError> {
        if self.handler.is_some() {
            return Err(SetupError::AlreadyRegistered);
        }

        // SAFETY: the ISR service is installed by hw_init.
        esp_check(unsafe { gpio_set_intr_type(self.pin, gpio_int_type_t_GPIO_INTR_ANYEDGE) })?;

        let ctx = Box::into_raw(Box::new(IsrContext {
            pin: self.pin,
            handler,
        }));

        // SAFETY: `ctx` is reclaimed only when the handler is not left
        // attached; otherwise it lives for the rest of the program.
        unsafe {
            let added = gpio_isr_handler_add(self.pin, Some(pwm_edge_isr), ctx.cast());
            if let Err(e) = esp_check(added) {
                drop(Box::from_raw(ctx));
                return Err(e);
            }
            if let Err(e) = esp_check(gpio_intr_enable(self.pin)) {
                gpio_isr_handler_remove(self.pin);
                drop(Box::from_raw(ctx));
                return Err(e);
            }
        }

        self.handler = Some(handler);
        info!("gpio_edge: any-edge ISR on GPIO{}", self.pin);
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn register(&mut self, handler: &'static dyn EdgeHandler) -> Result<(), SetupError> {
        if self.handler.is_some() {
            return Err(SetupError::AlreadyRegistered);
        }
        self.handler = Some(handler);
        info!("gpio_edge(sim): handler attached to GPIO{}", self.pin);
        Ok(())
    }
}
