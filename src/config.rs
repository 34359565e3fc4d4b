use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, DelegateError};
use crate::flash::{DEFAULT_PARTITION_ENTRIES, FlashDelegate};
use crate::store::{DEFAULT_NAMESPACE, KeyValueStore, WriteContract};
use crate::traits::{Limits, MAX_VALUE_LENGTH, NvsDelegate};

/// Flash partition settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlashConfig {
    /// Partition image file.
    pub path: PathBuf,

    /// Usable 32-byte entries in the partition.
    pub partition_entries: usize,

    /// Exclusive upper bound on value length, terminator included.
    pub max_value_len: usize,
}

impl Default for FlashConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("nvs.redb"),
            partition_entries: DEFAULT_PARTITION_ENTRIES,
            max_value_len: MAX_VALUE_LENGTH,
        }
    }
}

impl FlashConfig {
    pub fn limits(&self) -> Limits {
        Limits {
            value_len: self.max_value_len,
            ..Limits::default()
        }
    }

    pub fn mount(&self) -> Result<FlashDelegate, DelegateError> {
        FlashDelegate::mount(&self.path, self.partition_entries, self.limits())
    }
}

/// Store configuration file.
///
/// ```toml
/// namespace = "settings"
/// contract = "insert-update"
///
/// [flash]
/// path = "/var/lib/device/nvs.redb"
/// partition_entries = 504
/// max_value_len = 4000
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub namespace: String,
    pub contract: WriteContract,
    pub flash: FlashConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            contract: WriteContract::default(),
            flash: FlashConfig::default(),
        }
    }
}

impl StoreConfig {
    /// Load config from disk, or return the default if the file doesn't exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Io(e.to_string()))?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| ConfigError::Io(e.to_string()))
    }

    /// Mount the partition and bind a store to the configured namespace.
    pub fn open_store(&self) -> Result<KeyValueStore, ConfigError> {
        let flash: Arc<dyn NvsDelegate> = Arc::new(self.flash.mount()?);
        Ok(KeyValueStore::with_contract(
            Some(flash),
            &self.namespace,
            self.contract,
        ))
    }
}
