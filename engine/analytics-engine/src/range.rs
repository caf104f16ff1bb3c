//! Date ranges accepted by range-consuming queries

use crate::error::{AnalyticsError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Widest span a query may cover
pub const MAX_RANGE_DAYS: i64 = 365;

/// Inclusive `[start, end]` interval of instants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    /// Create a range, checking order and the default maximum span
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        let range = Self { start, end };
        range.validate(MAX_RANGE_DAYS)?;
        Ok(range)
    }

    /// The `days` days ending at `now`
    pub fn last_days(days: i64, now: DateTime<Utc>) -> Result<Self> {
        if days < 0 {
            return Err(AnalyticsError::range(format!("day count must not be negative, got {days}")));
        }
        if days > MAX_RANGE_DAYS {
            return Err(AnalyticsError::range(format!(
                "span of {days} days exceeds the maximum of {MAX_RANGE_DAYS} days"
            )));
        }
        Self::new(now - Duration::days(days), now)
    }

    /// Check order and span against `max_days`
    pub fn validate(&self, max_days: i64) -> Result<()> {
        if self.start > self.end {
            return Err(AnalyticsError::range(format!(
                "start {} is after end {}",
                self.start, self.end
            )));
        }

        if self.end - self.start > Duration::days(max_days) {
            return Err(AnalyticsError::range(format!(
                "span of {} days exceeds the maximum of {max_days} days",
                (self.end - self.start).num_days()
            )));
        }

        Ok(())
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts <= self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Length in whole days, rounded up, never less than one
    pub fn days(&self) -> i64 {
        let seconds = self.duration().num_seconds().max(0);
        let days = (seconds + 86_399) / 86_400;
        days.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_rejects_reversed_range() {
        assert!(matches!(DateRange::new(day(10), day(1)), Err(AnalyticsError::Range(_))));
    }

    #[test]
    fn test_rejects_too_wide_range() {
        let start = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        assert!(matches!(DateRange::new(start, end), Err(AnalyticsError::Range(_))));

        let exactly_max = DateRange { start, end: start + Duration::days(MAX_RANGE_DAYS) };
        assert!(exactly_max.validate(MAX_RANGE_DAYS).is_ok());
    }

    #[test]
    fn test_days_rounds_up() {
        assert_eq!(DateRange::new(day(1), day(1)).unwrap().days(), 1);
        assert_eq!(DateRange::new(day(1), day(8)).unwrap().days(), 7);
        assert_eq!(DateRange::new(day(1), day(8) + Duration::hours(1)).unwrap().days(), 8);
    }

    #[test]
    fn test_contains_is_inclusive() {
        let range = DateRange::new(day(1), day(3)).unwrap();
        assert!(range.contains(day(1)));
        assert!(range.contains(day(3)));
        assert!(!range.contains(day(3) + Duration::seconds(1)));
    }

    #[test]
    fn test_last_days() {
        let range = DateRange::last_days(7, day(8)).unwrap();
        assert_eq!(range.start, day(1));
        assert_eq!(range.end, day(8));
        assert!(DateRange::last_days(-1, day(8)).is_err());
        assert!(DateRange::last_days(400, day(8)).is_err());
    }

    #[test]
    fn test_last_days_huge_count_is_range_error() {
        for days in [1_000_000_000, i64::MAX] {
            assert!(matches!(DateRange::last_days(days, Utc::now()), Err(AnalyticsError::Range(_))));
        }
    }
}
