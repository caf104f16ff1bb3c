//! # Metric Records
//!
//! The unit of telemetry data: one business event (a registration, an order, an
//! upload) with its value, the instant it pertains to and free-form context.

use crate::error::{AnalyticsError, Result};
use crate::range::DateRange;
use chrono::{DateTime, Datelike, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Open key/value context attached to a record
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Category names produced by [`MetricType::category`]
pub mod category {
    pub const USERS: &str = "users";
    pub const FINANCIAL: &str = "financial";
    pub const ORDERS: &str = "orders";
    pub const UPLOADS: &str = "uploads";
    pub const MATERIALS: &str = "materials";
    pub const PAYMENTS: &str = "payments";
}

/// Kind of business event a record measures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    Registrations,
    ActiveUsers,
    Revenue,
    OrdersCount,
    OrdersValue,
    UploadsCount,
    UploadsApproved,
    MaterialsSold,
    MaterialsRevenue,
    PaymentSubmissions,
    PaymentApprovals,
    ConversionRate,
    AverageOrderValue,
    UserGrowth,
}

impl MetricType {
    /// Every metric type, in declaration order
    pub const ALL: [MetricType; 14] = [
        MetricType::Registrations,
        MetricType::ActiveUsers,
        MetricType::Revenue,
        MetricType::OrdersCount,
        MetricType::OrdersValue,
        MetricType::UploadsCount,
        MetricType::UploadsApproved,
        MetricType::MaterialsSold,
        MetricType::MaterialsRevenue,
        MetricType::PaymentSubmissions,
        MetricType::PaymentApprovals,
        MetricType::ConversionRate,
        MetricType::AverageOrderValue,
        MetricType::UserGrowth,
    ];

    /// Wire name of the metric type
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::Registrations => "registrations",
            MetricType::ActiveUsers => "active_users",
            MetricType::Revenue => "revenue",
            MetricType::OrdersCount => "orders_count",
            MetricType::OrdersValue => "orders_value",
            MetricType::UploadsCount => "uploads_count",
            MetricType::UploadsApproved => "uploads_approved",
            MetricType::MaterialsSold => "materials_sold",
            MetricType::MaterialsRevenue => "materials_revenue",
            MetricType::PaymentSubmissions => "payment_submissions",
            MetricType::PaymentApprovals => "payment_approvals",
            MetricType::ConversionRate => "conversion_rate",
            MetricType::AverageOrderValue => "average_order_value",
            MetricType::UserGrowth => "user_growth",
        }
    }

    /// Fixed classification used for category queries
    pub fn category(&self) -> &'static str {
        match self {
            MetricType::Registrations | MetricType::ActiveUsers | MetricType::UserGrowth => {
                category::USERS
            }
            MetricType::Revenue | MetricType::OrdersValue | MetricType::AverageOrderValue => {
                category::FINANCIAL
            }
            MetricType::OrdersCount | MetricType::ConversionRate => category::ORDERS,
            MetricType::UploadsCount | MetricType::UploadsApproved => category::UPLOADS,
            MetricType::MaterialsSold | MetricType::MaterialsRevenue => category::MATERIALS,
            MetricType::PaymentSubmissions | MetricType::PaymentApprovals => category::PAYMENTS,
        }
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricType {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        MetricType::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| AnalyticsError::validation(format!("unknown metric type: {s:?}")))
    }
}

/// Time bucket used to group records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Granularity {
    /// Bucket key for an instant
    ///
    /// Keys sort lexicographically in chronological order. Weekly buckets are keyed by
    /// the Sunday that starts the week.
    pub fn bucket_key(&self, ts: DateTime<Utc>) -> String {
        match self {
            Granularity::Daily => ts.format("%Y-%m-%d").to_string(),
            Granularity::Weekly => {
                let date = ts.date_naive();
                let offset = i64::from(date.weekday().num_days_from_sunday());
                (date - Duration::days(offset)).format("%Y-%m-%d").to_string()
            }
            Granularity::Monthly => ts.format("%Y-%m").to_string(),
            Granularity::Yearly => ts.format("%Y").to_string(),
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Granularity::Daily => "daily",
            Granularity::Weekly => "weekly",
            Granularity::Monthly => "monthly",
            Granularity::Yearly => "yearly",
        };
        f.write_str(name)
    }
}

impl FromStr for Granularity {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" | "day" => Ok(Granularity::Daily),
            "weekly" | "week" => Ok(Granularity::Weekly),
            "monthly" | "month" => Ok(Granularity::Monthly),
            "yearly" | "year" => Ok(Granularity::Yearly),
            _ => Err(AnalyticsError::validation(format!("unknown granularity: {s:?}"))),
        }
    }
}

/// How a record's natural bucket is computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationType {
    Daily,
    Weekly,
    Monthly,
    Yearly,
    RealTime,
}

impl AggregationType {
    /// Bucket granularity, `None` for real-time records
    pub fn granularity(&self) -> Option<Granularity> {
        match self {
            AggregationType::Daily => Some(Granularity::Daily),
            AggregationType::Weekly => Some(Granularity::Weekly),
            AggregationType::Monthly => Some(Granularity::Monthly),
            AggregationType::Yearly => Some(Granularity::Yearly),
            AggregationType::RealTime => None,
        }
    }
}

impl fmt::Display for AggregationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AggregationType::Daily => "daily",
            AggregationType::Weekly => "weekly",
            AggregationType::Monthly => "monthly",
            AggregationType::Yearly => "yearly",
            AggregationType::RealTime => "real_time",
        };
        f.write_str(name)
    }
}

impl FromStr for AggregationType {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "real_time" | "realtime" => Ok(AggregationType::RealTime),
            other => other
                .parse::<Granularity>()
                .map(|g| match g {
                    Granularity::Daily => AggregationType::Daily,
                    Granularity::Weekly => AggregationType::Weekly,
                    Granularity::Monthly => AggregationType::Monthly,
                    Granularity::Yearly => AggregationType::Yearly,
                })
                .map_err(|_| AnalyticsError::validation(format!("unknown aggregation type: {s:?}"))),
        }
    }
}

/// Bucket key of a single instant, used for real-time records
pub fn instant_key(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse an RFC 3339 timestamp, or a bare `YYYY-MM-DD` date taken as midnight UTC
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Ok(ts.with_timezone(&Utc));
    }

    chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| AnalyticsError::validation(format!("invalid timestamp: {s:?}")))
}

/// One persisted telemetry data point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricRecord {
    pub id: Uuid,
    pub metric_type: MetricType,
    pub value: f64,
    #[serde(alias = "date")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Metadata,
    pub aggregation_type: AggregationType,
    pub category: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MetricRecord {
    /// Create a daily record with empty metadata
    pub fn new(metric_type: MetricType, value: f64, timestamp: DateTime<Utc>) -> Result<Self> {
        let now = Utc::now();
        let record = Self {
            id: Uuid::new_v4(),
            metric_type,
            value,
            timestamp,
            metadata: Metadata::new(),
            aggregation_type: AggregationType::Daily,
            category: metric_type.category().to_string(),
            created_at: now,
            updated_at: now,
        };
        record.validate()?;
        Ok(record)
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_aggregation(mut self, aggregation_type: AggregationType) -> Self {
        self.aggregation_type = aggregation_type;
        self
    }

    /// Check the record invariants
    pub fn validate(&self) -> Result<()> {
        if !self.value.is_finite() {
            return Err(AnalyticsError::validation(format!(
                "{} value must be a finite number, got {}",
                self.metric_type, self.value
            )));
        }

        let expected = self.metric_type.category();
        if self.category != expected {
            return Err(AnalyticsError::validation(format!(
                "record {} is {} and belongs to category {:?}, got {:?}",
                self.id, self.metric_type, expected, self.category
            )));
        }

        Ok(())
    }

    pub fn bucket_key(&self, granularity: Granularity) -> String {
        granularity.bucket_key(self.timestamp)
    }

    /// Bucket from the record's own aggregation type; real-time records use the instant
    pub fn natural_bucket(&self) -> String {
        match self.aggregation_type.granularity() {
            Some(g) => self.bucket_key(g),
            None => instant_key(self.timestamp),
        }
    }

    pub fn is_within(&self, range: &DateRange) -> bool {
        range.contains(self.timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 15, 30, 0).unwrap()
    }

    #[test]
    fn test_category_table() {
        assert_eq!(MetricType::Registrations.category(), "users");
        assert_eq!(MetricType::ActiveUsers.category(), "users");
        assert_eq!(MetricType::Revenue.category(), "financial");
        assert_eq!(MetricType::OrdersCount.category(), "orders");
        assert_eq!(MetricType::UploadsApproved.category(), "uploads");
        assert_eq!(MetricType::MaterialsSold.category(), "materials");
        assert_eq!(MetricType::PaymentApprovals.category(), "payments");
    }

    #[test]
    fn test_metric_type_parsing() {
        assert_eq!("active-users".parse::<MetricType>().unwrap(), MetricType::ActiveUsers);
        assert_eq!("ORDERS_COUNT".parse::<MetricType>().unwrap(), MetricType::OrdersCount);
        for t in MetricType::ALL {
            assert_eq!(t.as_str().parse::<MetricType>().unwrap(), t);
        }
        assert!(matches!("page_views".parse::<MetricType>(), Err(AnalyticsError::Validation(_))));
    }

    #[test]
    fn test_wire_names_match_serde() {
        for t in MetricType::ALL {
            let json = serde_json::to_string(&t).unwrap();
            assert_eq!(json, format!("\"{}\"", t.as_str()));
        }
        assert_eq!(serde_json::to_string(&AggregationType::RealTime).unwrap(), "\"real_time\"");
    }

    #[test]
    fn test_aggregation_type_parsing() {
        assert_eq!("real-time".parse::<AggregationType>().unwrap(), AggregationType::RealTime);
        assert_eq!("monthly".parse::<AggregationType>().unwrap(), AggregationType::Monthly);
        assert!("hourly".parse::<AggregationType>().is_err());
    }

    #[test]
    fn test_bucket_keys() {
        // 2024-03-14 is a Thursday
        let ts = at(2024, 3, 14);
        assert_eq!(Granularity::Daily.bucket_key(ts), "2024-03-14");
        assert_eq!(Granularity::Weekly.bucket_key(ts), "2024-03-10");
        assert_eq!(Granularity::Monthly.bucket_key(ts), "2024-03");
        assert_eq!(Granularity::Yearly.bucket_key(ts), "2024");
    }

    #[test]
    fn test_weekly_bucket_boundaries() {
        // A Sunday starts its own week; the Saturday before belongs to the previous one
        assert_eq!(Granularity::Weekly.bucket_key(at(2024, 3, 10)), "2024-03-10");
        assert_eq!(Granularity::Weekly.bucket_key(at(2024, 3, 9)), "2024-03-03");
        // Weeks straddle month and year boundaries
        assert_eq!(Granularity::Weekly.bucket_key(at(2024, 1, 2)), "2023-12-31");
    }

    #[test]
    fn test_new_record_derives_category() {
        let record = MetricRecord::new(MetricType::Revenue, 250.0, at(2024, 5, 1)).unwrap();
        assert_eq!(record.category, "financial");
        assert_eq!(record.aggregation_type, AggregationType::Daily);
        assert!(record.metadata.is_empty());
        assert_eq!(record.natural_bucket(), "2024-05-01");
    }

    #[test]
    fn test_mismatched_category_rejected() {
        let mut record = MetricRecord::new(MetricType::Revenue, 250.0, at(2024, 5, 1)).unwrap();
        record.category = "users".to_string();
        assert!(matches!(record.validate(), Err(AnalyticsError::Validation(_))));

        record.category = String::new();
        assert!(record.validate().is_err());

        record.category = "financial".to_string();
        assert!(record.validate().is_ok());
    }

    #[test]
    fn test_non_finite_values_rejected() {
        for value in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let result = MetricRecord::new(MetricType::Revenue, value, at(2024, 5, 1));
            assert!(matches!(result, Err(AnalyticsError::Validation(_))));
        }
    }

    #[test]
    fn test_real_time_natural_bucket() {
        let record = MetricRecord::new(MetricType::ActiveUsers, 1.0, at(2024, 5, 1))
            .unwrap()
            .with_aggregation(AggregationType::RealTime);
        assert_eq!(record.natural_bucket(), "2024-05-01T15:30:00.000Z");
    }

    #[test]
    fn test_parse_timestamp() {
        assert_eq!(parse_timestamp("2024-05-01").unwrap(), Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap());
        assert_eq!(
            parse_timestamp("2024-05-01T10:00:00+02:00").unwrap(),
            Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap()
        );
        assert!(matches!(parse_timestamp("yesterday"), Err(AnalyticsError::Validation(_))));
        assert!(parse_timestamp("2024-02-30").is_err());
    }

    #[test]
    fn test_record_json_shape() {
        let mut metadata = Metadata::new();
        metadata.insert("materialId".to_string(), serde_json::json!("mat-42"));
        let record = MetricRecord::new(MetricType::MaterialsSold, 3.0, at(2024, 5, 1))
            .unwrap()
            .with_metadata(metadata);

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["metricType"], "materials_sold");
        assert_eq!(json["aggregationType"], "daily");
        assert_eq!(json["category"], "materials");
        assert_eq!(json["metadata"]["materialId"], "mat-42");

        let back: MetricRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_date_alias_accepted() {
        let json = serde_json::json!({
            "id": Uuid::new_v4(),
            "metricType": "revenue",
            "value": 10.5,
            "date": "2024-05-01T00:00:00Z",
            "aggregationType": "daily",
            "category": "financial",
            "createdAt": "2024-05-01T00:00:00Z",
            "updatedAt": "2024-05-01T00:00:00Z"
        });
        let record: MetricRecord = serde_json::from_value(json).unwrap();
        assert_eq!(record.timestamp, parse_timestamp("2024-05-01").unwrap());
        assert!(record.metadata.is_empty());
    }
}
