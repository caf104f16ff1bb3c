//! # Query Engine
//!
//! Read-side entry point for dashboard and report code.

use crate::aggregation::{AggregatePoint, AggregationEngine};
use crate::error::Result;
use crate::export::{AnalyticsExport, ExportFormat};
use crate::metric::{AggregationType, MetricRecord, MetricType};
use crate::range::DateRange;
use crate::storage::MetricStore;
use crate::summary::{DashboardSummary, GrowthMetrics, Period, SummaryCalculator};
use chrono::{DateTime, Utc};

/// Query engine for analytics data
#[derive(Debug, Clone)]
pub struct QueryEngine {
    store: MetricStore,
    aggregator: AggregationEngine,
    calculator: SummaryCalculator,
}

impl QueryEngine {
    pub fn new(store: MetricStore) -> Self {
        Self {
            aggregator: AggregationEngine::new(store.clone()),
            calculator: SummaryCalculator::new(store.clone()),
            store,
        }
    }

    pub async fn get_analytics_by_type(
        &self,
        metric_type: MetricType,
        range: Option<&DateRange>,
    ) -> Result<Vec<MetricRecord>> {
        self.store.get_by_type(metric_type, range).await
    }

    pub async fn get_analytics_by_date_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        types: Option<&[MetricType]>,
    ) -> Result<Vec<MetricRecord>> {
        self.store.get_by_date_range(start, end, types).await
    }

    pub async fn get_analytics_by_category(
        &self,
        category: &str,
        range: Option<&DateRange>,
    ) -> Result<Vec<MetricRecord>> {
        self.store.get_by_category(category, range).await
    }

    pub async fn get_aggregated_metrics(
        &self,
        metric_type: MetricType,
        aggregation_type: AggregationType,
        range: Option<&DateRange>,
    ) -> Result<Vec<AggregatePoint>> {
        self.aggregator.aggregated_metrics(metric_type, aggregation_type, range).await
    }

    pub async fn get_dashboard_summary(&self, range: &DateRange) -> Result<DashboardSummary> {
        self.calculator.dashboard_summary(range).await
    }

    pub async fn get_growth_metrics(&self, metric_type: MetricType, period: Period) -> Result<GrowthMetrics> {
        self.calculator.growth_metrics(metric_type, period).await
    }

    /// Export stored records, all of them when no range is given
    pub async fn export_analytics(
        &self,
        format: ExportFormat,
        range: Option<&DateRange>,
    ) -> Result<AnalyticsExport> {
        let records = match range {
            Some(range) => self.store.get_by_date_range(range.start, range.end, None).await?,
            None => self.store.get_all().await,
        };

        tracing::info!("Exporting {} records as {}", records.len(), format);
        Ok(AnalyticsExport::new(records, format))
    }

    /// Merge a previous export back in; returns the number of new records
    pub async fn import_analytics(&self, export: AnalyticsExport) -> Result<usize> {
        self.store.import(export.records).await
    }

    pub fn store(&self) -> &MetricStore {
        &self.store
    }

    pub fn aggregator(&self) -> &AggregationEngine {
        &self.aggregator
    }

    pub fn calculator(&self) -> &SummaryCalculator {
        &self.calculator
    }
}
