//! # Persistence Layer
//!
//! This crate provides the storage boundary for the farm supply marketplace analytics
//! pipeline: a key-value store of serialized JSON documents.
//!
//! ## Architecture
//!
//! - **BlobStore**: Abstract async trait offering `read(key)` and `write(key, json)`
//! - **LocalBlobStore**: Local file-based implementation, one file per key
//! - **InMemoryBlobStore**: In-memory implementation with failure injection for tests
//!
//! ## Usage
//!
//! ```rust
//! use farm_persistence::{create_local_store, BlobStore};
//! use tempfile::TempDir;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let temp_dir = TempDir::new()?;
//!     let store = create_local_store(temp_dir.path())?;
//!
//!     store.write("metrics", r#"{"records":[]}"#).await?;
//!     assert!(store.read("metrics").await?.is_some());
//!
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod local;

pub use backend::{BlobStore, InMemoryBlobStore, LocalBlobStore};
pub use config::PersistenceConfig;
pub use error::{PersistenceError, Result};
pub use local::{create_local_store, create_local_store_with_config};
