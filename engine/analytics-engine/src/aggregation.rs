//! # Metrics Aggregation
//!
//! Turns filtered record lists into time-bucketed sums.

use crate::error::Result;
use crate::metric::{instant_key, AggregationType, Granularity, MetricRecord, MetricType};
use crate::range::DateRange;
use crate::storage::MetricStore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Sum and count of the records sharing one bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatePoint {
    pub bucket: String,
    pub value: f64,
    pub count: usize,
}

/// Group records by bucket key, one point per bucket in ascending key order
///
/// Every record lands in the bucket computed from its own timestamp.
pub fn aggregate_records<'a, I>(records: I, granularity: Granularity) -> Vec<AggregatePoint>
where
    I: IntoIterator<Item = &'a MetricRecord>,
{
    let mut buckets: BTreeMap<String, (f64, usize)> = BTreeMap::new();

    for record in records {
        let entry = buckets.entry(record.bucket_key(granularity)).or_insert((0.0, 0));
        entry.0 += record.value;
        entry.1 += 1;
    }

    buckets
        .into_iter()
        .map(|(bucket, (value, count))| AggregatePoint { bucket, value, count })
        .collect()
}

/// Aggregation over the records held by a [`MetricStore`]
#[derive(Debug, Clone)]
pub struct AggregationEngine {
    store: MetricStore,
}

impl AggregationEngine {
    pub fn new(store: MetricStore) -> Self {
        Self { store }
    }

    /// Bucketed sums of one metric type
    pub async fn aggregate(
        &self,
        metric_type: MetricType,
        granularity: Granularity,
        range: Option<&DateRange>,
    ) -> Result<Vec<AggregatePoint>> {
        let records = self.store.get_by_type(metric_type, range).await?;
        let points = aggregate_records(&records, granularity);

        tracing::debug!(
            "Aggregated {} {} records into {} {:?} buckets",
            records.len(),
            metric_type,
            points.len(),
            granularity
        );

        Ok(points)
    }

    /// Bucketed sums of every metric in one category
    pub async fn aggregate_category(
        &self,
        category: &str,
        granularity: Granularity,
        range: Option<&DateRange>,
    ) -> Result<Vec<AggregatePoint>> {
        let records = self.store.get_by_category(category, range).await?;
        Ok(aggregate_records(&records, granularity))
    }

    /// Bucketed view keyed by aggregation type; real-time yields one point per record
    pub async fn aggregated_metrics(
        &self,
        metric_type: MetricType,
        aggregation_type: AggregationType,
        range: Option<&DateRange>,
    ) -> Result<Vec<AggregatePoint>> {
        match aggregation_type.granularity() {
            Some(granularity) => self.aggregate(metric_type, granularity, range).await,
            None => {
                let records = self.store.get_by_type(metric_type, range).await?;
                Ok(records
                    .into_iter()
                    .map(|r| AggregatePoint {
                        bucket: instant_key(r.timestamp),
                        value: r.value,
                        count: 1,
                    })
                    .collect())
            }
        }
    }

    /// Sum per metric type over a range
    pub async fn totals_by_type(&self, range: &DateRange) -> Result<BTreeMap<MetricType, f64>> {
        let records = self.store.get_by_date_range(range.start, range.end, None).await?;

        let mut totals = BTreeMap::new();
        for record in &records {
            *totals.entry(record.metric_type).or_insert(0.0) += record.value;
        }

        Ok(totals)
    }

    /// Sum per category over a range
    pub async fn totals_by_category(&self, range: &DateRange) -> Result<BTreeMap<String, f64>> {
        let records = self.store.get_by_date_range(range.start, range.end, None).await?;

        let mut totals = BTreeMap::new();
        for record in &records {
            *totals.entry(record.category.clone()).or_insert(0.0) += record.value;
        }

        Ok(totals)
    }
}
