//! NVS (Non-Volatile Storage) config adapter.
//!
//! Implements [`ConfigPort`] on the ESP32 default NVS partition. The
//! config is stored as a single `postcard` blob under `heizbox::cfg`;
//! NVS commits are atomic per write, so a power loss leaves either the
//! old or the new blob.

use core::cell::RefCell;

use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs, NvsDefault};
use log::{info, warn};

use crate::app::ports::{ConfigError, ConfigPort};
use crate::config::HeaterConfig;

const CONFIG_NAMESPACE: &str = "heizbox";
const CONFIG_KEY: &str = "cfg";
const MAX_BLOB_SIZE: usize = 512;

pub struct NvsConfigStore {
    nvs: RefCell<EspNvs<NvsDefault>>,
}

impl NvsConfigStore {
    /// Open the config namespace on the default partition.
    pub fn new(partition: EspDefaultNvsPartition) -> Result<Self, ConfigError> {
        let nvs = EspNvs::new(partition, CONFIG_NAMESPACE, true).map_err(|e| {
            warn!("NVS: cannot open namespace '{}': {}", CONFIG_NAMESPACE, e);
            ConfigError::IoError
        })?;
        info!("NvsConfigStore: namespace '{}' open", CONFIG_NAMESPACE);
        Ok(Self {
            nvs: RefCell::new(nvs),
        })
    }
}

impl ConfigPort for NvsConfigStore {
    fn load(&self) -> Result<HeaterConfig, ConfigError> {
        let mut buf = [0u8; MAX_BLOB_SIZE];
        let nvs = self.nvs.borrow();
        match nvs.get_raw(CONFIG_KEY, &mut buf) {
            Ok(Some(bytes)) => {
                let cfg: HeaterConfig =
                    postcard::from_bytes(bytes).map_err(|_| ConfigError::Corrupted)?;
                info!("NvsConfigStore: loaded config ({} bytes)", bytes.len());
                Ok(cfg)
            }
            Ok(None) => Err(ConfigError::NotFound),
            Err(e) => {
                warn!("NvsConfigStore: read error {}", e);
                Err(ConfigError::IoError)
            }
        }
    }

    fn save(&self, config: &HeaterConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;
        if bytes.len() > MAX_BLOB_SIZE {
            return Err(ConfigError::IoError);
        }
        self.nvs
            .borrow_mut()
            .set_raw(CONFIG_KEY, &bytes)
            .map_err(|e| {
                warn!("NvsConfigStore: write error {}", e);
                ConfigError::IoError
            })?;
        info!("NvsConfigStore: config saved ({} bytes)", bytes.len());
        Ok(())
    }
}
