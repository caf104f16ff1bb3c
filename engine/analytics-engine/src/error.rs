//! Error types for the analytics pipeline

use farm_persistence::PersistenceError;
use thiserror::Error;

/// Result type alias for analytics operations
pub type Result<T> = std::result::Result<T, AnalyticsError>;

/// Errors that can occur in the analytics pipeline
#[derive(Error, Debug)]
pub enum AnalyticsError {
    /// Malformed metric record (bad type, value or date)
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Date range with start after end, or wider than the allowed span
    #[error("Invalid date range: {0}")]
    Range(String),

    /// Backend read or write failure
    #[error("Storage failure: {0}")]
    Storage(String),

    /// Ingestion buffer cannot take more events
    #[error("Event buffer full (capacity {capacity})")]
    BufferFull { capacity: usize },

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl AnalyticsError {
    /// Create a new validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a new range error
    pub fn range(msg: impl Into<String>) -> Self {
        Self::Range(msg.into())
    }

    /// Create a new storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

impl From<PersistenceError> for AnalyticsError {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::Config(msg) => AnalyticsError::Config(msg),
            other => AnalyticsError::Storage(other.to_string()),
        }
    }
}
