//! # Farm Analytics
//!
//! Telemetry and analytics pipeline for the farm supply marketplace admin.
//!
//! Business events (registrations, orders, uploads, payments) are tracked without
//! waiting on storage, buffered, and persisted in batches as metric records. Dashboard
//! and report code then reads them back through a TTL cache as filtered lists,
//! time-bucketed aggregates, headline summaries and growth rates.
//!
//! ## Architecture
//!
//! - **MetricStore**: sole owner of the persisted collection, with a read cache
//! - **EventTracker**: bounded event buffer with size- and timer-triggered flushes
//! - **AggregationEngine**: daily/weekly/monthly/yearly bucketing
//! - **SummaryCalculator**: dashboard summary, growth, conversion and order value
//! - **QueryEngine**: read-side facade, plus export and import

pub mod aggregation;
pub mod buffer;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod ingestion;
pub mod logging;
pub mod metric;
pub mod query;
pub mod range;
pub mod seed;
pub mod storage;
pub mod summary;

#[cfg(test)]
mod integration_tests;

// Re-export main types for easy usage
pub use aggregation::{AggregatePoint, AggregationEngine};
pub use config::AnalyticsConfig;
pub use error::{AnalyticsError, Result};
pub use export::{AnalyticsExport, ExportFormat};
pub use ingestion::{EventTracker, IngestionStats, TrackerState};
pub use metric::{AggregationType, Granularity, Metadata, MetricRecord, MetricType};
pub use query::QueryEngine;
pub use range::DateRange;
pub use storage::MetricStore;
pub use summary::{DashboardSummary, GrowthMetrics, Period, PeriodMetrics, SummaryCalculator};

use farm_persistence::{BlobStore, LocalBlobStore};
use std::sync::Arc;

/// Initialize the analytics pipeline over a local data directory
pub async fn init_analytics(config: AnalyticsConfig) -> anyhow::Result<AnalyticsEngine> {
    tracing::info!("Initializing analytics with config: {:?}", config);

    config.validate()?;
    let backend = LocalBlobStore::new(config.storage.persistence_config())?;
    Ok(AnalyticsEngine::with_backend(config, Arc::new(backend))?)
}

/// One store, tracker and query engine sharing a backend
#[derive(Debug, Clone)]
pub struct AnalyticsEngine {
    config: AnalyticsConfig,
    store: MetricStore,
    query_engine: QueryEngine,
    tracker: EventTracker,
}

impl AnalyticsEngine {
    pub fn with_backend(config: AnalyticsConfig, backend: Arc<dyn BlobStore>) -> Result<Self> {
        config.validate()?;

        let store = MetricStore::new(backend, &config);
        let tracker = EventTracker::new(store.clone(), config.ingestion.clone());
        let query_engine = QueryEngine::new(store.clone());

        Ok(Self { config, store, query_engine, tracker })
    }

    pub fn config(&self) -> &AnalyticsConfig {
        &self.config
    }

    pub fn store(&self) -> &MetricStore {
        &self.store
    }

    /// Get query engine for CLI usage
    pub fn query_engine(&self) -> &QueryEngine {
        &self.query_engine
    }

    pub fn tracker(&self) -> &EventTracker {
        &self.tracker
    }

    /// Flush buffered events before exit
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Shutting down analytics");
        self.tracker.shutdown().await
    }
}
