//! # Configuration Management
//!
//! Configuration structures and management for the analytics pipeline.

use crate::error::AnalyticsError;
use crate::range::MAX_RANGE_DAYS;
use crate::summary::Period;
use farm_persistence::PersistenceConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration for the analytics pipeline
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Storage configuration
    pub storage: StorageConfig,
    /// Read cache configuration
    pub cache: CacheConfig,
    /// Ingestion configuration
    pub ingestion: IngestionConfig,
    /// Query configuration
    pub query: QueryConfig,
    /// Sample data bootstrap configuration
    pub seed: SeedConfig,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the blob files
    pub base_path: PathBuf,
    /// Key the whole metric collection is stored under
    pub collection_key: String,
    /// Write through a temporary file and rename it into place
    pub atomic_writes: bool,
    /// Call fsync before publishing a write
    pub fsync_on_write: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from("./analytics_data"),
            collection_key: "farm_analytics_metrics".to_string(),
            atomic_writes: true,
            fsync_on_write: false,
        }
    }
}

impl StorageConfig {
    /// Backend configuration for the local blob store
    pub fn persistence_config(&self) -> PersistenceConfig {
        PersistenceConfig {
            data_dir: self.base_path.clone(),
            atomic_writes: self.atomic_writes,
            fsync_on_write: self.fsync_on_write,
            ..PersistenceConfig::default()
        }
    }
}

/// Read cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Enable the read cache
    pub enabled: bool,
    /// Time-to-live of every cache entry (seconds)
    pub ttl_secs: u64,
    /// Most cached queries kept at once
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: 300, // 5 minutes
            max_entries: 256,
        }
    }
}

impl CacheConfig {
    /// Effective TTL; zero when the cache is disabled
    pub fn ttl(&self) -> Duration {
        if self.enabled {
            Duration::from_secs(self.ttl_secs)
        } else {
            Duration::ZERO
        }
    }
}

/// Ingestion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionConfig {
    /// Buffered events that trigger an immediate flush, and the most one flush persists
    pub batch_size: usize,
    /// Delay before a scheduled flush (milliseconds)
    pub flush_interval_ms: u64,
    /// Maximum number of buffered events
    pub buffer_capacity: usize,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self { batch_size: 10, flush_interval_ms: 30_000, buffer_capacity: 10_000 }
    }
}

impl IngestionConfig {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }
}

/// Query configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Widest date range a query may cover (days)
    pub max_range_days: i64,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self { max_range_days: MAX_RANGE_DAYS }
    }
}

/// Sample data bootstrap configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedConfig {
    /// Seed sample records the first time an empty store is read
    pub enabled: bool,
    /// Number of days of sample records
    pub days: u32,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self { enabled: true, days: 30 }
    }
}

impl AnalyticsConfig {
    /// Load configuration from file
    pub fn load_from_file(path: &str) -> Result<Self, anyhow::Error> {
        let content = std::fs::read_to_string(path)?;
        let config: AnalyticsConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save_to_file(&self, path: &str) -> Result<(), anyhow::Error> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply overrides from environment variables
    pub fn with_env_overrides(mut self) -> Result<Self, AnalyticsError> {
        if let Ok(dir) = std::env::var("ANALYTICS_DATA_DIR") {
            self.storage.base_path = PathBuf::from(dir);
        }

        if let Ok(value) = std::env::var("ANALYTICS_BATCH_SIZE") {
            self.ingestion.batch_size = value
                .parse()
                .map_err(|_| AnalyticsError::config("Invalid ANALYTICS_BATCH_SIZE"))?;
        }

        if let Ok(value) = std::env::var("ANALYTICS_FLUSH_INTERVAL_MS") {
            self.ingestion.flush_interval_ms = value
                .parse()
                .map_err(|_| AnalyticsError::config("Invalid ANALYTICS_FLUSH_INTERVAL_MS"))?;
        }

        if let Ok(value) = std::env::var("ANALYTICS_CACHE_TTL_SECS") {
            self.cache.ttl_secs = value
                .parse()
                .map_err(|_| AnalyticsError::config("Invalid ANALYTICS_CACHE_TTL_SECS"))?;
        }

        Ok(self)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), AnalyticsError> {
        if self.storage.collection_key.is_empty() {
            return Err(AnalyticsError::config("storage.collection_key must not be empty"));
        }

        if self.ingestion.batch_size == 0 {
            return Err(AnalyticsError::config("ingestion.batch_size must be greater than 0"));
        }

        if self.ingestion.buffer_capacity < self.ingestion.batch_size {
            return Err(AnalyticsError::config(
                "ingestion.buffer_capacity must be at least ingestion.batch_size",
            ));
        }

        let longest_window = Period::Month.window().num_days();
        if self.query.max_range_days < longest_window {
            return Err(AnalyticsError::config(format!(
                "query.max_range_days must be at least {longest_window} to cover monthly growth"
            )));
        }

        if self.cache.max_entries == 0 {
            return Err(AnalyticsError::config("cache.max_entries must be greater than 0"));
        }

        Ok(())
    }

    /// Get storage path for the config
    pub fn storage_path(&self) -> &PathBuf {
        &self.storage.base_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = AnalyticsConfig::default();
        assert_eq!(config.ingestion.batch_size, 10);
        assert_eq!(config.ingestion.flush_interval(), Duration::from_secs(30));
        assert_eq!(config.cache.ttl(), Duration::from_secs(300));
        assert_eq!(config.query.max_range_days, 365);
        assert_eq!(config.seed.days, 30);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_disabled_cache_has_zero_ttl() {
        let cache = CacheConfig { enabled: false, ..Default::default() };
        assert_eq!(cache.ttl(), Duration::ZERO);
    }

    #[test]
    fn test_validation() {
        let mut config = AnalyticsConfig::default();
        config.ingestion.batch_size = 0;
        assert!(matches!(config.validate(), Err(AnalyticsError::Config(_))));

        let mut config = AnalyticsConfig::default();
        config.ingestion.buffer_capacity = 5;
        assert!(config.validate().is_err());

        let mut config = AnalyticsConfig::default();
        config.query.max_range_days = 0;
        assert!(config.validate().is_err());

        let mut config = AnalyticsConfig::default();
        config.cache.max_entries = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_max_range_must_cover_monthly_growth() {
        let mut config = AnalyticsConfig::default();
        config.query.max_range_days = 29;
        assert!(matches!(config.validate(), Err(AnalyticsError::Config(_))));

        config.query.max_range_days = 30;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: AnalyticsConfig = toml::from_str(
            r#"
            [ingestion]
            batch_size = 25

            [seed]
            enabled = false
            "#,
        )
        .unwrap();

        assert_eq!(config.ingestion.batch_size, 25);
        assert_eq!(config.ingestion.flush_interval_ms, 30_000);
        assert!(!config.seed.enabled);
        assert_eq!(config.storage.collection_key, "farm_analytics_metrics");
    }

    #[test]
    fn test_save_and_load_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("analytics.toml");
        let path = path.to_str().unwrap();

        let mut config = AnalyticsConfig::default();
        config.cache.ttl_secs = 60;
        config.save_to_file(path).unwrap();

        let loaded = AnalyticsConfig::load_from_file(path).unwrap();
        assert_eq!(loaded.cache.ttl_secs, 60);
        assert_eq!(loaded.storage.base_path, config.storage.base_path);
    }

    #[test]
    fn test_persistence_config_mapping() {
        let storage = StorageConfig { fsync_on_write: true, ..Default::default() };
        let persistence = storage.persistence_config();
        assert_eq!(persistence.data_dir, storage.base_path);
        assert!(persistence.fsync_on_write);
        assert!(persistence.validate().is_ok());
    }
}
