//! Configuration for the persistence layer

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the persistence layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Base directory for blob files
    pub data_dir: PathBuf,

    /// Extension appended to every key when mapped to a file
    pub file_extension: String,

    /// Write through a temporary file and rename it into place
    pub atomic_writes: bool,

    /// Call fsync before the rename
    pub fsync_on_write: bool,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            file_extension: "json".to_string(),
            atomic_writes: true,
            fsync_on_write: false, // Balance between performance and durability
        }
    }
}

impl PersistenceConfig {
    /// Create a new configuration with custom data directory
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self { data_dir: data_dir.into(), ..Default::default() }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.data_dir.as_os_str().is_empty() {
            return Err("data_dir must not be empty".to_string());
        }

        if self.file_extension.is_empty() || self.file_extension.contains(['/', '\\', '.']) {
            return Err(format!("invalid file_extension: {:?}", self.file_extension));
        }

        Ok(())
    }
}
