//! In-memory configuration store.
//!
//! Implements [`ConfigPort`] by keeping the config as a `postcard` blob,
//! the same encoding the NVS store writes. Used on the host for tests and
//! simulation.

use std::cell::RefCell;

use log::info;

use crate::app::ports::{ConfigError, ConfigPort};
use crate::config::HeaterConfig;

#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    blob: RefCell<Option<Vec<u8>>>,
    saves: RefCell<u32>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful saves (for tests).
    pub fn save_count(&self) -> u32 {
        *self.saves.borrow()
    }

    /// Overwrite the raw stored bytes (for corruption tests).
    pub fn set_raw(&self, bytes: Vec<u8>) {
        *self.blob.borrow_mut() = Some(bytes);
    }
}

impl ConfigPort for MemoryConfigStore {
    fn load(&self) -> Result<HeaterConfig, ConfigError> {
        match self.blob.borrow().as_deref() {
            Some(bytes) => {
                let cfg: HeaterConfig =
                    postcard::from_bytes(bytes).map_err(|_| ConfigError::Corrupted)?;
                info!("MemoryConfigStore: loaded config ({} bytes)", bytes.len());
                Ok(cfg)
            }
            None => {
                info!("MemoryConfigStore: no stored config, using defaults");
                Ok(HeaterConfig::default())
            }
        }
    }

    fn save(&self, config: &HeaterConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;
        *self.blob.borrow_mut() = Some(bytes);
        *self.saves.borrow_mut() += 1;
        info!("MemoryConfigStore: config saved");
        Ok(())
    }
}
