//! Blob store trait and implementations

use crate::config::PersistenceConfig;
use crate::error::{PersistenceError, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Key-value store for serialized JSON documents
///
/// Every key holds one opaque document. A missing key reads as `None`; writes fully
/// replace whatever was stored before.
#[async_trait::async_trait]
pub trait BlobStore: Send + Sync {
    /// Read the document stored under `key`
    async fn read(&self, key: &str) -> Result<Option<String>>;

    /// Replace the document stored under `key`
    async fn write(&self, key: &str, value: &str) -> Result<()>;

    /// Short backend name used in log output
    fn name(&self) -> &'static str;
}

/// Check that a key is usable as a file stem
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(PersistenceError::invalid_key("key must not be empty"));
    }

    if key.starts_with('.')
        || !key.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
    {
        return Err(PersistenceError::invalid_key(key.to_string()));
    }

    Ok(())
}

/// Local file-based blob store: one file per key under the data directory
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    config: PersistenceConfig,
}

impl LocalBlobStore {
    /// Create a new local blob store, creating the data directory if needed
    pub fn new(config: PersistenceConfig) -> Result<Self> {
        config.validate().map_err(PersistenceError::config)?;

        std::fs::create_dir_all(&config.data_dir).map_err(PersistenceError::Io)?;

        tracing::info!("Local blob store initialized at: {:?}", config.data_dir);

        Ok(Self { config })
    }

    /// Create a new local blob store with default config
    pub fn with_default_config(data_dir: impl Into<PathBuf>) -> Result<Self> {
        Self::new(PersistenceConfig::new(data_dir))
    }

    /// Get the configuration
    pub fn config(&self) -> &PersistenceConfig {
        &self.config
    }

    /// Get the data directory
    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    /// Path of the file backing `key`
    pub fn path_for(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.config.data_dir.join(format!("{key}.{}", self.config.file_extension)))
    }

    async fn write_atomic(&self, path: &Path, value: &str) -> Result<()> {
        let tmp_path = path.with_extension(format!("tmp-{}", Uuid::new_v4().simple()));

        let mut file = tokio::fs::File::create(&tmp_path).await?;
        file.write_all(value.as_bytes()).await?;
        file.flush().await?;
        if self.config.fsync_on_write {
            file.sync_all().await?;
        }
        drop(file);

        if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(e.into());
        }

        Ok(())
    }
}

#[async_trait::async_trait]
impl BlobStore for LocalBlobStore {
    async fn read(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;

        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key)?;

        if self.config.atomic_writes {
            self.write_atomic(&path, value).await?;
        } else {
            tokio::fs::write(&path, value).await?;
        }

        tracing::debug!("Wrote {} bytes to {:?}", value.len(), path);

        Ok(())
    }

    fn name(&self) -> &'static str {
        "local"
    }
}

/// In-memory blob store (for testing)
///
/// Counts reads and writes and can be told to fail either on demand.
#[derive(Debug, Default, Clone)]
pub struct InMemoryBlobStore {
    blobs: Arc<Mutex<HashMap<String, String>>>,
    reads: Arc<AtomicU64>,
    writes: Arc<AtomicU64>,
    fail_reads: Arc<AtomicBool>,
    fail_writes: Arc<AtomicBool>,
    fail_write_number: Arc<AtomicU64>,
}

impl InMemoryBlobStore {
    /// Create a new empty in-memory blob store
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent read fail (or succeed again)
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent write fail (or succeed again)
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Fail only the `n`th write call (1-based, counted from creation); 0 disarms
    pub fn fail_write_number(&self, n: u64) {
        self.fail_write_number.store(n, Ordering::SeqCst);
    }

    /// Number of read calls served so far, including failed ones
    pub fn read_count(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of write calls served so far, including failed ones
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Peek at a stored document without touching the counters
    pub async fn raw(&self, key: &str) -> Option<String> {
        self.blobs.lock().await.get(key).cloned()
    }
}

#[async_trait::async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn read(&self, key: &str) -> Result<Option<String>> {
        self.reads.fetch_add(1, Ordering::SeqCst);

        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(PersistenceError::injected(format!("read of {key}")));
        }

        Ok(self.blobs.lock().await.get(key).cloned())
    }

    async fn write(&self, key: &str, value: &str) -> Result<()> {
        let number = self.writes.fetch_add(1, Ordering::SeqCst) + 1;

        if self.fail_writes.load(Ordering::SeqCst)
            || self.fail_write_number.load(Ordering::SeqCst) == number
        {
            return Err(PersistenceError::injected(format!("write of {key}")));
        }

        self.blobs.lock().await.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "in-memory"
    }
}
