//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements [`ConfigPort`] for the PM1003PH firmware. The
//! [`SensorConfig`] is stored as one `postcard` blob.
//!
//! - Config validation: all fields are range-checked before persistence.
//! - A missing, unreadable or out-of-range blob loads as defaults.
//! - Atomic writes: ESP-IDF NVS commits are atomic per `nvs_commit()`.
//!
//! On host builds the backend is an in-memory map.

use log::{info, warn};

use crate::app::ports::{ConfigError, ConfigPort};
use crate::config::SensorConfig;
use crate::error::Error;

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
const CONFIG_NAMESPACE: &[u8] = b"pm1003ph\0";
#[cfg(target_os = "espidf")]
const CONFIG_KEY_C: &[u8] = b"sensorcfg\0";
#[cfg(not(target_os = "espidf"))]
const CONFIG_KEY: &str = "pm1003ph::sensorcfg";

#[cfg(target_os = "espidf")]
const MAX_BLOB_SIZE: usize = 256;

pub struct NvsAdapter {
    #[cfg(not(target_os = "espidf"))]
    store: std::cell::RefCell<HashMap<String, Vec<u8>>>,
}

impl NvsAdapter {
    /// Create a new NvsAdapter and initialise NVS flash.
    ///
    /// Returns `Err(ConfigError::IoError)` if flash initialisation fails
    /// unrecoverably. On first boot or after a version mismatch the NVS
    /// partition is erased and re-initialised automatically.
    pub fn new() -> Result<Self, ConfigError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: nvs_flash_init / nvs_flash_erase are called from the
            // single main-task context before any concurrent NVS access.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES as i32 || ret == ESP_ERR_NVS_NEW_VERSION_FOUND as i32 {
                warn!("NVS: erasing and re-initialising flash partition");
                if unsafe { nvs_flash_erase() } != ESP_OK as i32 {
                    return Err(ConfigError::IoError);
                }
                if unsafe { nvs_flash_init() } != ESP_OK as i32 {
                    return Err(ConfigError::IoError);
                }
            } else if ret != ESP_OK as i32 {
                return Err(ConfigError::IoError);
            }
            info!("NvsAdapter: ESP-IDF NVS initialised");
        }

        #[cfg(not(target_os = "espidf"))]
        info!("NvsAdapter: simulation backend");

        Ok(Self {
            #[cfg(not(target_os = "espidf"))]
            store: std::cell::RefCell::new(HashMap::new()),
        })
    }

    /// Open the config namespace, execute a closure with the handle, then close.
    #[cfg(target_os = "espidf")]
    fn with_nvs_handle<F, T>(write: bool, f: F) -> Result<T, i32>
    where
        F: FnOnce(nvs_handle_t) -> Result<T, i32>,
    {
        let mut handle: nvs_handle_t = 0;
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };

        // SAFETY: namespace is a NUL-terminated static.
        let ret = unsafe { nvs_open(CONFIG_NAMESPACE.as_ptr() as *const _, mode, &mut handle) };
        if ret != ESP_OK as i32 {
            return Err(ret);
        }

        let result = f(handle);
        unsafe {
            nvs_close(handle);
        }
        result
    }

    #[cfg(target_os = "espidf")]
    fn read_blob() -> Result<Option<Vec<u8>>, i32> {
        let result = Self::with_nvs_handle(false, |handle| {
            let mut size: usize = 0;

            // First call: get size
            let ret = unsafe {
                nvs_get_blob(
                    handle,
                    CONFIG_KEY_C.as_ptr() as *const _,
                    core::ptr::null_mut(),
                    &mut size,
                )
            };
            if ret != ESP_OK as i32 {
                return Err(ret);
            }
            if size == 0 || size > MAX_BLOB_SIZE {
                return Err(ESP_ERR_NVS_INVALID_LENGTH as i32);
            }

            let mut buf = vec![0u8; size];
            let ret = unsafe {
                nvs_get_blob(
                    handle,
                    CONFIG_KEY_C.as_ptr() as *const _,
                    buf.as_mut_ptr() as *mut _,
                    &mut size,
                )
            };
            if ret != ESP_OK as i32 {
                return Err(ret);
            }
            Ok(buf)
        });

        match result {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e == ESP_ERR_NVS_NOT_FOUND as i32 => Ok(None),
            Err(e) => Err(e),
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_blob(&self) -> Option<Vec<u8>> {
        self.store.borrow().get(CONFIG_KEY).cloned()
    }

    /// Overwrite the stored blob without validation (simulation only).
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_put_raw(&self, bytes: &[u8]) {
        self.store
            .borrow_mut()
            .insert(CONFIG_KEY.to_string(), bytes.to_vec());
    }

    fn decode(bytes: &[u8]) -> SensorConfig {
        match postcard::from_bytes::<SensorConfig>(bytes) {
            Ok(cfg) => match cfg.validate() {
                Ok(()) => {
                    info!("NvsAdapter: loaded config ({} bytes)", bytes.len());
                    cfg
                }
                Err(e) => {
                    warn!("NvsAdapter: stored config rejected ({}), using defaults", e);
                    SensorConfig::default()
                }
            },
            Err(_) => {
                warn!("NvsAdapter: stored config corrupted, using defaults");
                SensorConfig::default()
            }
        }
    }
}

fn validate_config(cfg: &SensorConfig) -> Result<(), ConfigError> {
    cfg.validate().map_err(|e| match e {
        Error::Config(msg) => ConfigError::ValidationFailed(msg),
        _ => ConfigError::ValidationFailed("invalid configuration"),
    })
}

impl ConfigPort for NvsAdapter {
    fn load(&self) -> Result<SensorConfig, ConfigError> {
        #[cfg(not(target_os = "espidf"))]
        let blob = self.read_blob();

        #[cfg(target_os = "espidf")]
        let blob = match Self::read_blob() {
            Ok(b) => b,
            Err(e) => {
                warn!("NvsAdapter: NVS read error {}, using defaults", e);
                None
            }
        };

        match blob {
            Some(bytes) => Ok(Self::decode(&bytes)),
            None => {
                info!("NvsAdapter: no stored config, using defaults");
                Ok(SensorConfig::default())
            }
        }
    }

    fn save(&self, config: &SensorConfig) -> Result<(), ConfigError> {
        validate_config(config)?;
        let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;

        #[cfg(not(target_os = "espidf"))]
        {
            self.sim_put_raw(&bytes);
            info!("NvsAdapter: config saved (simulation)");
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let result = Self::with_nvs_handle(true, |handle| {
                let ret = unsafe {
                    nvs_set_blob(
                        handle,
                        CONFIG_KEY_C.as_ptr() as *const _,
                        bytes.as_ptr() as *const _,
                        bytes.len(),
                    )
                };
                if ret != ESP_OK as i32 {
                    return Err(ret);
                }
                let ret = unsafe { nvs_commit(handle) };
                if ret != ESP_OK as i32 {
                    return Err(ret);
                }
                Ok(())
            });
            match result {
                Ok(()) => {
                    info!("NvsAdapter: config saved to NVS ({} bytes)", bytes.len());
                    Ok(())
                }
                Err(e) if e == ESP_ERR_NVS_NOT_ENOUGH_SPACE as i32 => Err(ConfigError::StorageFull),
                Err(e) => {
                    warn!("NvsAdapter: NVS write error {}", e);
                    Err(ConfigError::IoError)
                }
            }
        }
    }
}
