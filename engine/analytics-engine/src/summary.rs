//! # Dashboard Summary
//!
//! Headline dashboard numbers and growth indicators derived from stored records.

use crate::error::{AnalyticsError, Result};
use crate::metric::{MetricRecord, MetricType};
use crate::range::DateRange;
use crate::storage::MetricStore;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Round to two decimal places
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Percentage change from `previous` to `current`, rounded to two decimals
///
/// Growth from nothing reads as 100% when anything happened and 0% otherwise.
pub fn growth_rate(current: f64, previous: f64) -> f64 {
    if previous == 0.0 {
        return if current > 0.0 { 100.0 } else { 0.0 };
    }
    round2((current - previous) / previous * 100.0)
}

/// Orders per active user as a percentage; 0 without active users
pub fn conversion_rate(total_orders: f64, active_users: f64) -> f64 {
    if active_users == 0.0 {
        return 0.0;
    }
    round2(total_orders / active_users * 100.0)
}

/// Revenue per order; 0 without orders
pub fn average_order_value(total_revenue: f64, total_orders: f64) -> f64 {
    if total_orders == 0.0 {
        return 0.0;
    }
    round2(total_revenue / total_orders)
}

/// Total, per-day average and largest single value over a range
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeriodMetrics {
    pub total: f64,
    pub average: f64,
    pub peak: f64,
}

/// Summarize `records` over `range`; the average divides by the range length in days
pub fn period_metrics(records: &[MetricRecord], range: &DateRange) -> PeriodMetrics {
    let total: f64 = records.iter().map(|r| r.value).sum();
    let peak = records.iter().map(|r| r.value).fold(None, |acc: Option<f64>, v| {
        Some(acc.map_or(v, |a| a.max(v)))
    });

    PeriodMetrics { total, average: total / range.days() as f64, peak: peak.unwrap_or(0.0) }
}

/// Fixed-shape set of headline numbers for a date range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub new_registrations: f64,
    /// Largest single active-user reading in the range, not a sum
    pub active_users: f64,
    pub total_revenue: f64,
    pub total_orders: f64,
    pub total_uploads: f64,
    pub approved_uploads: f64,
    pub materials_sold: f64,
    pub materials_revenue: f64,
    pub payment_submissions: f64,
    pub payment_approvals: f64,
    pub conversion_rate: f64,
    pub average_order_value: f64,
    pub range: DateRange,
}

impl DashboardSummary {
    /// Accumulate the records that fall within `range`
    pub fn from_records<'a, I>(records: I, range: DateRange) -> Self
    where
        I: IntoIterator<Item = &'a MetricRecord>,
    {
        let mut summary = Self {
            new_registrations: 0.0,
            active_users: 0.0,
            total_revenue: 0.0,
            total_orders: 0.0,
            total_uploads: 0.0,
            approved_uploads: 0.0,
            materials_sold: 0.0,
            materials_revenue: 0.0,
            payment_submissions: 0.0,
            payment_approvals: 0.0,
            conversion_rate: 0.0,
            average_order_value: 0.0,
            range,
        };

        for record in records.into_iter().filter(|r| r.is_within(&range)) {
            let value = record.value;
            match record.metric_type {
                MetricType::Registrations => summary.new_registrations += value,
                MetricType::ActiveUsers => summary.active_users = summary.active_users.max(value),
                MetricType::Revenue => summary.total_revenue += value,
                MetricType::OrdersCount => summary.total_orders += value,
                MetricType::UploadsCount => summary.total_uploads += value,
                MetricType::UploadsApproved => summary.approved_uploads += value,
                MetricType::MaterialsSold => summary.materials_sold += value,
                MetricType::MaterialsRevenue => summary.materials_revenue += value,
                MetricType::PaymentSubmissions => summary.payment_submissions += value,
                MetricType::PaymentApprovals => summary.payment_approvals += value,
                _ => {}
            }
        }

        summary.conversion_rate = conversion_rate(summary.total_orders, summary.active_users);
        summary.average_order_value =
            average_order_value(summary.total_revenue, summary.total_orders);
        summary
    }
}

/// Length of a growth comparison window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Day,
    Week,
    Month,
}

impl Period {
    /// Window length; a month is 30 days
    pub fn window(&self) -> Duration {
        match self {
            Period::Day => Duration::days(1),
            Period::Week => Duration::days(7),
            Period::Month => Duration::days(30),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Period::Day => "day",
            Period::Week => "week",
            Period::Month => "month",
        })
    }
}

impl FromStr for Period {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "day" | "daily" => Ok(Period::Day),
            "week" | "weekly" => Ok(Period::Week),
            "month" | "monthly" => Ok(Period::Month),
            _ => Err(AnalyticsError::validation(format!("unknown period: {s:?}"))),
        }
    }
}

/// Current window against the equal-length window before it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrowthMetrics {
    pub metric_type: MetricType,
    pub current: f64,
    pub previous: f64,
    pub growth_rate: f64,
    pub period: Period,
}

/// Derives summaries and growth from the records held by a [`MetricStore`]
#[derive(Debug, Clone)]
pub struct SummaryCalculator {
    store: MetricStore,
}

impl SummaryCalculator {
    pub fn new(store: MetricStore) -> Self {
        Self { store }
    }

    /// Totals, average and peak of one metric type over a range
    pub async fn period_metrics(
        &self,
        metric_type: MetricType,
        range: &DateRange,
    ) -> Result<PeriodMetrics> {
        let records = self.store.get_by_type(metric_type, Some(range)).await?;
        Ok(period_metrics(&records, range))
    }

    /// Headline numbers for a range
    pub async fn dashboard_summary(&self, range: &DateRange) -> Result<DashboardSummary> {
        let records = self.store.get_by_date_range(range.start, range.end, None).await?;
        let summary = DashboardSummary::from_records(&records, *range);

        tracing::debug!(
            "Dashboard summary over {} records: revenue={}, orders={}",
            records.len(),
            summary.total_revenue,
            summary.total_orders
        );

        Ok(summary)
    }

    /// Growth of one metric over the most recent period
    pub async fn growth_metrics(&self, metric_type: MetricType, period: Period) -> Result<GrowthMetrics> {
        self.growth_metrics_at(metric_type, period, Utc::now()).await
    }

    /// Growth as of `now`: `[now - len, now]` against `[now - 2·len, now - len)`
    pub async fn growth_metrics_at(
        &self,
        metric_type: MetricType,
        period: Period,
        now: DateTime<Utc>,
    ) -> Result<GrowthMetrics> {
        let window = period.window();
        let boundary = now - window;
        let current_range = DateRange { start: boundary, end: now };
        let previous_range = DateRange { start: boundary - window, end: boundary };

        let (current, previous) = futures::try_join!(
            self.store.get_by_type(metric_type, Some(&current_range)),
            self.store.get_by_type(metric_type, Some(&previous_range)),
        )?;

        let current: f64 = current.iter().map(|r| r.value).sum();
        // The boundary instant belongs to the current window only
        let previous: f64 =
            previous.iter().filter(|r| r.timestamp < boundary).map(|r| r.value).sum();

        Ok(GrowthMetrics {
            metric_type,
            current,
            previous,
            growth_rate: growth_rate(current, previous),
            period,
        })
    }
}
