//! Store configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, RevIndexError};

pub const DEFAULT_DATA_FILE: &str = "reverse_index_data.dat";
pub const DEFAULT_DIRECTORY_FILE: &str = "reverse_index_index.idx";
pub const DEFAULT_MIN_GROWTH_BYTES: u64 = 64 * 1024;

/// Options for opening an [`InvertedStore`](crate::store::InvertedStore).
///
/// Every field has a default, so a partial JSON document is a valid config:
///
/// ```rust
/// use revindex::StoreConfig;
///
/// let config = StoreConfig::from_json(r#"{ "checksum": false }"#).unwrap();
/// assert!(!config.checksum);
/// assert_eq!(config.data_file, "reverse_index_data.dat");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Name of the append-only data file inside the base directory.
    pub data_file: String,
    /// Name of the directory sidecar file inside the base directory.
    pub directory_file: String,
    /// Append a CRC32 to every record and validate it on read.
    ///
    /// Only applies to fresh stores; a reopened store keeps the framing it
    /// was created with.
    pub checksum: bool,
    /// Smallest number of bytes the mapped window grows by on a remap.
    pub min_growth_bytes: u64,
    /// Flush each record to disk before its directory entry is published.
    pub sync_on_append: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_file: DEFAULT_DATA_FILE.to_string(),
            directory_file: DEFAULT_DIRECTORY_FILE.to_string(),
            checksum: true,
            min_growth_bytes: DEFAULT_MIN_GROWTH_BYTES,
            sync_on_append: false,
        }
    }
}

impl StoreConfig {
    pub fn builder() -> StoreConfigBuilder {
        StoreConfigBuilder::default()
    }

    /// Parse a config from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: StoreConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if self.data_file.is_empty() {
            return Err(RevIndexError::invalid_config("data_file must not be empty"));
        }
        if self.directory_file.is_empty() {
            return Err(RevIndexError::invalid_config(
                "directory_file must not be empty",
            ));
        }
        if self.data_file == self.directory_file {
            return Err(RevIndexError::invalid_config(format!(
                "data_file and directory_file must differ, both are '{}'",
                self.data_file
            )));
        }
        if self.min_growth_bytes == 0 {
            return Err(RevIndexError::invalid_config(
                "min_growth_bytes must be greater than zero",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct StoreConfigBuilder {
    config: StoreConfig,
}

impl StoreConfigBuilder {
    pub fn data_file(mut self, name: impl Into<String>) -> Self {
        self.config.data_file = name.into();
        self
    }

    pub fn directory_file(mut self, name: impl Into<String>) -> Self {
        self.config.directory_file = name.into();
        self
    }

    pub fn checksum(mut self, enabled: bool) -> Self {
        self.config.checksum = enabled;
        self
    }

    pub fn min_growth_bytes(mut self, bytes: u64) -> Self {
        self.config.min_growth_bytes = bytes;
        self
    }

    pub fn sync_on_append(mut self, enabled: bool) -> Self {
        self.config.sync_on_append = enabled;
        self
    }

    pub fn build(self) -> Result<StoreConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
