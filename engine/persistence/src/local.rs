//! Local file-based persistence implementation

use crate::backend::LocalBlobStore;
use crate::config::PersistenceConfig;
use crate::error::Result;

/// Create a new local blob store with default configuration
pub fn create_local_store(data_dir: impl Into<std::path::PathBuf>) -> Result<LocalBlobStore> {
    LocalBlobStore::with_default_config(data_dir)
}

/// Create a new local blob store with custom configuration
pub fn create_local_store_with_config(config: PersistenceConfig) -> Result<LocalBlobStore> {
    LocalBlobStore::new(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BlobStore;
    use crate::error::PersistenceError;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_local_store_creation() {
        let temp_dir = TempDir::new().unwrap();
        let data_dir = temp_dir.path().join("blobs");

        let store = create_local_store(&data_dir).unwrap();
        assert_eq!(store.data_dir(), data_dir.as_path());
        assert!(data_dir.exists());
    }

    #[tokio::test]
    async fn test_missing_key_reads_none() {
        let temp_dir = TempDir::new().unwrap();
        let store = create_local_store(temp_dir.path()).unwrap();

        assert_eq!(store.read("nothing_here").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let temp_dir = TempDir::new().unwrap();
        let store = create_local_store(temp_dir.path()).unwrap();

        store.write("metrics", r#"{"records":[]}"#).await.unwrap();
        assert_eq!(store.read("metrics").await.unwrap().as_deref(), Some(r#"{"records":[]}"#));
        assert!(temp_dir.path().join("metrics.json").exists());

        store.write("metrics", r#"{"records":[1]}"#).await.unwrap();
        assert_eq!(store.read("metrics").await.unwrap().as_deref(), Some(r#"{"records":[1]}"#));
    }

    #[tokio::test]
    async fn test_atomic_write_leaves_no_temp_files() {
        let temp_dir = TempDir::new().unwrap();
        let config = PersistenceConfig {
            fsync_on_write: true,
            ..PersistenceConfig::new(temp_dir.path())
        };
        let store = create_local_store_with_config(config).unwrap();

        for i in 0..5 {
            store.write("metrics", &format!("{{\"n\":{i}}}")).await.unwrap();
        }

        let entries: Vec<_> = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(entries, vec!["metrics.json".to_string()]);
    }

    #[tokio::test]
    async fn test_non_atomic_write() {
        let temp_dir = TempDir::new().unwrap();
        let config =
            PersistenceConfig { atomic_writes: false, ..PersistenceConfig::new(temp_dir.path()) };
        let store = create_local_store_with_config(config).unwrap();

        store.write("metrics", "[]").await.unwrap();
        assert_eq!(store.read("metrics").await.unwrap().as_deref(), Some("[]"));
    }

    #[tokio::test]
    async fn test_invalid_key_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let store = create_local_store(temp_dir.path()).unwrap();

        let result = store.write("../outside", "{}").await;
        assert!(matches!(result, Err(PersistenceError::InvalidKey(_))));
    }
}
