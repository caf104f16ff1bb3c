//! Sample data used to bootstrap an empty store so dashboards are never blank

use crate::metric::{AggregationType, Metadata, MetricRecord, MetricType};
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

/// Metric families seeded once per day
pub const SEEDED_TYPES: [MetricType; 8] = [
    MetricType::Registrations,
    MetricType::ActiveUsers,
    MetricType::Revenue,
    MetricType::OrdersCount,
    MetricType::UploadsCount,
    MetricType::UploadsApproved,
    MetricType::MaterialsSold,
    MetricType::PaymentSubmissions,
];

fn sample_value(metric_type: MetricType, day: u32) -> f64 {
    let d = u64::from(day);
    let orders = 20 + (d * 3) % 15;
    let uploads = 8 + (d * 5) % 9;

    let value = match metric_type {
        MetricType::Registrations => 5 + (d * 7) % 11,
        MetricType::ActiveUsers => 120 + (d * 13) % 40,
        MetricType::Revenue => orders * (150 + (d * 17) % 100),
        MetricType::OrdersCount => orders,
        MetricType::UploadsCount => uploads,
        MetricType::UploadsApproved => uploads * 3 / 4,
        MetricType::MaterialsSold => 30 + (d * 11) % 25,
        MetricType::PaymentSubmissions => orders - d % 3,
        _ => 0,
    };

    value as f64
}

/// One record per seeded family per day for the `days` days up to `now`, oldest first
pub fn sample_records(days: u32, now: DateTime<Utc>) -> Vec<MetricRecord> {
    let mut metadata = Metadata::new();
    metadata.insert("sample".to_string(), serde_json::Value::Bool(true));

    let mut records = Vec::with_capacity(days as usize * SEEDED_TYPES.len());
    for day in (0..days).rev() {
        let timestamp = now - Duration::days(i64::from(day));
        for metric_type in SEEDED_TYPES {
            records.push(MetricRecord {
                id: Uuid::new_v4(),
                metric_type,
                value: sample_value(metric_type, day),
                timestamp,
                metadata: metadata.clone(),
                aggregation_type: AggregationType::Daily,
                category: metric_type.category().to_string(),
                created_at: now,
                updated_at: now,
            });
        }
    }

    records
}
