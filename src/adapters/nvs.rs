//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements [`ConfigPort`] and [`StoragePort`].  The node keeps two
//! things in NVS: the validated [`NodeConfig`] blob and the five WiFi
//! credential slots written by [`CredentialStore`](crate::credentials::CredentialStore).
//!
//! - Every `nvs_set_blob` is followed by `nvs_commit`, which is atomic
//!   per key.  A power cut leaves a slot either old or new.
//! - The simulation backend is a `HashMap` keyed by `namespace::key`.

use log::{info, warn};

use crate::app::ports::{ConfigError, ConfigPort, StorageError, StoragePort};
use crate::config::NodeConfig;

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

const CONFIG_NAMESPACE: &str = "crackwatch";
const CONFIG_KEY: &str = "nodecfg";

/// NVS limits namespace and key names to 15 characters.
const NVS_NAME_MAX: usize = 15;
#[cfg_attr(not(target_os = "espidf"), allow(dead_code))]
const MAX_BLOB_SIZE: usize = 1024;

pub struct NvsAdapter {
    #[cfg(not(target_os = "espidf"))]
    store: std::cell::RefCell<HashMap<std::string::String, std::vec::Vec<u8>>>,
}

/// NUL-terminated copy of an NVS name, truncated to the NVS limit.
#[cfg_attr(not(target_os = "espidf"), allow(dead_code))]
fn nvs_name(name: &str) -> [u8; NVS_NAME_MAX + 1] {
    let mut buf = [0u8; NVS_NAME_MAX + 1];
    let n = name.len().min(NVS_NAME_MAX);
    buf[..n].copy_from_slice(&name.as_bytes()[..n]);
    buf
}

impl NvsAdapter {
    /// Initialise NVS flash.
    ///
    /// A partition with no free pages or from a newer IDF version is
    /// erased and re-initialised; stored credentials are lost in that case.
    pub fn new() -> Result<Self, ConfigError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: called once from the main task before any other NVS use.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES || ret == ESP_ERR_NVS_NEW_VERSION_FOUND {
                warn!("NVS: erasing and re-initialising flash partition");
                if unsafe { nvs_flash_erase() } != ESP_OK || unsafe { nvs_flash_init() } != ESP_OK {
                    return Err(ConfigError::IoError);
                }
            } else if ret != ESP_OK {
                return Err(ConfigError::IoError);
            }
            info!("NVS: flash initialised");
        }

        #[cfg(not(target_os = "espidf"))]
        info!("NVS: simulation backend");

        Ok(Self {
            #[cfg(not(target_os = "espidf"))]
            store: std::cell::RefCell::new(HashMap::new()),
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn composite_key(namespace: &str, key: &str) -> std::string::String {
        format!("{}::{}", namespace, key)
    }

    /// Open a namespace, run `f` with the handle, close it again.
    #[cfg(target_os = "espidf")]
    fn with_handle<T>(
        namespace: &str,
        write: bool,
        f: impl FnOnce(nvs_handle_t) -> Result<T, esp_err_t>,
    ) -> Result<T, esp_err_t> {
        let ns = nvs_name(namespace);
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };
        let mut handle: nvs_handle_t = 0;
        let ret = unsafe { nvs_open(ns.as_ptr() as *const _, mode, &mut handle) };
        if ret != ESP_OK {
            return Err(ret);
        }
        let result = f(handle);
        unsafe { nvs_close(handle) };
        result
    }

    #[cfg(target_os = "espidf")]
    fn commit(handle: nvs_handle_t, ret: esp_err_t) -> Result<(), esp_err_t> {
        if ret != ESP_OK {
            return Err(ret);
        }
        match unsafe { nvs_commit(handle) } {
            ESP_OK => Ok(()),
            e => Err(e),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Config validation
// ───────────────────────────────────────────────────────────────

/// Smallest log the queue accepts; a few thousand samples.
const MIN_QUEUE_BYTES: u64 = 4096;

fn validate_config(cfg: &NodeConfig) -> Result<(), ConfigError> {
    if cfg.broker_host.is_empty() {
        return Err(ConfigError::ValidationFailed("broker_host must not be empty"));
    }
    if cfg.broker_port == 0 {
        return Err(ConfigError::ValidationFailed("broker_port must be non-zero"));
    }
    if cfg.telemetry_topic.is_empty() || cfg.command_topic.is_empty() {
        return Err(ConfigError::ValidationFailed("topics must not be empty"));
    }
    if cfg.telemetry_topic == cfg.command_topic {
        return Err(ConfigError::ValidationFailed(
            "telemetry_topic and command_topic must differ",
        ));
    }
    if cfg.start_token.is_empty() {
        return Err(ConfigError::ValidationFailed("start_token must not be empty"));
    }
    if !(100..=60_000).contains(&cfg.sample_interval_ms) {
        return Err(ConfigError::ValidationFailed(
            "sample_interval_ms must be 100–60000",
        ));
    }
    if cfg.send_interval_ms < 1000 {
        return Err(ConfigError::ValidationFailed("send_interval_ms must be >= 1000"));
    }
    if cfg.reconnect_delay_ms == 0 || cfg.wifi_retry_interval_ms == 0 || cfg.halt_retry_ms == 0 {
        return Err(ConfigError::ValidationFailed("retry delays must be non-zero"));
    }
    if cfg.association_timeout_ms == 0 {
        return Err(ConfigError::ValidationFailed(
            "association_timeout_ms must be non-zero",
        ));
    }
    if cfg.samples_per_reading == 0 {
        return Err(ConfigError::ValidationFailed("samples_per_reading must be >= 1"));
    }
    if cfg.max_records_per_pass == 0 {
        return Err(ConfigError::ValidationFailed("max_records_per_pass must be >= 1"));
    }
    if cfg.queue_capacity_bytes < MIN_QUEUE_BYTES {
        return Err(ConfigError::ValidationFailed(
            "queue_capacity_bytes must be >= 4096",
        ));
    }
    Ok(())
}

// ───────────────────────────────────────────────────────────────
// ConfigPort
// ───────────────────────────────────────────────────────────────

impl ConfigPort for NvsAdapter {
    fn load(&self) -> Result<NodeConfig, ConfigError> {
        let mut buf = [0u8; 1024];
        let len = match self.read(CONFIG_NAMESPACE, CONFIG_KEY, &mut buf) {
            Ok(n) => n,
            Err(StorageError::NotFound) => {
                info!("NVS: no stored config, using defaults");
                return Ok(NodeConfig::default());
            }
            Err(e) => {
                warn!("NVS: config read failed ({}), using defaults", e);
                return Ok(NodeConfig::default());
            }
        };
        let cfg: NodeConfig = postcard::from_bytes(&buf[..len]).map_err(|_| ConfigError::Corrupted)?;
        validate_config(&cfg)?;
        info!("NVS: loaded config ({} bytes)", len);
        Ok(cfg)
    }

    fn save(&self, config: &NodeConfig) -> Result<(), ConfigError> {
        validate_config(config)?;
        let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;

        #[cfg(not(target_os = "espidf"))]
        {
            self.store
                .borrow_mut()
                .insert(Self::composite_key(CONFIG_NAMESPACE, CONFIG_KEY), bytes);
            info!("NVS: config saved (simulation)");
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let key = nvs_name(CONFIG_KEY);
            Self::with_handle(CONFIG_NAMESPACE, true, |h| {
                let ret = unsafe {
                    nvs_set_blob(h, key.as_ptr() as *const _, bytes.as_ptr() as *const _, bytes.len())
                };
                Self::commit(h, ret)
            })
            .map_err(|e| {
                warn!("NVS: config write error {}", e);
                ConfigError::IoError
            })?;
            info!("NVS: config saved ({} bytes)", bytes.len());
            Ok(())
        }
    }
}

// ───────────────────────────────────────────────────────────────
// StoragePort
// ───────────────────────────────────────────────────────────────

impl StoragePort for NvsAdapter {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            match self.store.borrow().get(&Self::composite_key(namespace, key)) {
                Some(data) => {
                    let len = data.len().min(buf.len());
                    buf[..len].copy_from_slice(&data[..len]);
                    Ok(len)
                }
                None => Err(StorageError::NotFound),
            }
        }

        #[cfg(target_os = "espidf")]
        {
            let k = nvs_name(key);
            let cap = buf.len().min(MAX_BLOB_SIZE);
            Self::with_handle(namespace, false, |h| {
                let mut size = cap;
                match unsafe {
                    nvs_get_blob(h, k.as_ptr() as *const _, buf.as_mut_ptr() as *mut _, &mut size)
                } {
                    ESP_OK => Ok(size),
                    e => Err(e),
                }
            })
            .map_err(|e| match e {
                ESP_ERR_NVS_NOT_FOUND => StorageError::NotFound,
                _ => StorageError::IoError,
            })
        }
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            self.store
                .borrow_mut()
                .insert(Self::composite_key(namespace, key), data.to_vec());
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let k = nvs_name(key);
            Self::with_handle(namespace, true, |h| {
                let ret = unsafe {
                    nvs_set_blob(h, k.as_ptr() as *const _, data.as_ptr() as *const _, data.len())
                };
                Self::commit(h, ret)
            })
            .map_err(|e| match e {
                ESP_ERR_NVS_NOT_ENOUGH_SPACE => StorageError::Full,
                _ => StorageError::IoError,
            })
        }
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            self.store
                .borrow_mut()
                .remove(&Self::composite_key(namespace, key));
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let k = nvs_name(key);
            let result = Self::with_handle(namespace, true, |h| {
                let ret = match unsafe { nvs_erase_key(h, k.as_ptr() as *const _) } {
                    ESP_ERR_NVS_NOT_FOUND => ESP_OK,
                    r => r,
                };
                Self::commit(h, ret)
            });
            match result {
                // The namespace itself does not exist yet: nothing to delete.
                Ok(()) | Err(ESP_ERR_NVS_NOT_FOUND) => Ok(()),
                Err(_) => Err(StorageError::IoError),
            }
        }
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        #[cfg(not(target_os = "espidf"))]
        {
            self.store
                .borrow()
                .contains_key(&Self::composite_key(namespace, key))
        }

        #[cfg(target_os = "espidf")]
        {
            let k = nvs_name(key);
            Self::with_handle(namespace, false, |h| {
                Ok(unsafe { nvs_find_key(h, k.as_ptr() as *const _, core::ptr::null_mut()) } == ESP_OK)
            })
            .unwrap_or(false)
        }
    }
}
