//! Cache Entry Module
//!
//! Defines a cached value together with the instant it was computed.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// == Cache Entry ==
/// A cached value and the moment the read function produced it.
///
/// The timestamp is set on write only. Reads never touch it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// The cached JSON value
    pub data: Value,
    /// When `data` was last computed (RFC 3339 on disk)
    pub timestamp: DateTime<Utc>,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new entry computed at `timestamp`.
    pub fn new(data: Value, timestamp: DateTime<Utc>) -> Self {
        Self { data, timestamp }
    }

    // == Age ==
    /// Time elapsed between the entry's computation and `now`.
    ///
    /// A timestamp in the future (clock moved backwards) counts as age zero.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        age_since(self.timestamp, now)
    }

    // == Is Stale ==
    /// Checks if the entry must be recomputed.
    ///
    /// Boundary condition: an entry is stale once its age is greater than or
    /// equal to `max_age`, so a value is never reused after the full max age
    /// has elapsed.
    pub fn is_stale(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        is_stale(self.timestamp, now, max_age)
    }
}

// == Utility Functions ==
/// Elapsed time from `timestamp` to `now`, clamped at zero.
pub fn age_since(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (now - timestamp).to_std().unwrap_or(Duration::ZERO)
}

/// True when a value computed at `timestamp` is too old to serve at `now`.
pub fn is_stale(timestamp: DateTime<Utc>, now: DateTime<Utc>, max_age: Duration) -> bool {
    age_since(timestamp, now) >= max_age
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_entry_fresh_within_max_age() {
        let entry = CacheEntry::new(json!({"x": 1}), noon());
        let now = noon() + chrono::Duration::milliseconds(1100);

        assert!(!entry.is_stale(now, Duration::from_secs(3)));
        assert_eq!(entry.age(now), Duration::from_millis(1100));
    }

    #[test]
    fn test_entry_stale_after_max_age() {
        let entry = CacheEntry::new(json!("v"), noon());
        let now = noon() + chrono::Duration::milliseconds(3300);

        assert!(entry.is_stale(now, Duration::from_secs(3)));
    }

    #[test]
    fn test_staleness_boundary_condition() {
        let entry = CacheEntry::new(json!(null), noon());
        let now = noon() + chrono::Duration::seconds(3);

        assert!(entry.is_stale(now, Duration::from_secs(3)), "Entry should be stale at boundary");
    }

    #[test]
    fn test_future_timestamp_counts_as_fresh() {
        let entry = CacheEntry::new(json!([1, 2]), noon() + chrono::Duration::seconds(10));

        assert_eq!(entry.age(noon()), Duration::ZERO);
        assert!(!entry.is_stale(noon(), Duration::from_secs(1)));
    }

    #[test]
    fn test_zero_max_age_is_always_stale() {
        let entry = CacheEntry::new(json!(true), noon());
        assert!(entry.is_stale(noon(), Duration::ZERO));
    }

    #[test]
    fn test_entry_serializes_timestamp_as_iso8601() {
        let entry = CacheEntry::new(json!({"x": 1}), noon());
        let encoded = serde_json::to_value(&entry).unwrap();

        assert_eq!(encoded["data"], json!({"x": 1}));
        assert_eq!(encoded["timestamp"], json!("2024-05-01T12:00:00Z"));
    }
}
