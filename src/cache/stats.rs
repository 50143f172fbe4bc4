//! Cache Statistics Module
//!
//! Tracks how reads were served: from cache, or through the read function.

use serde::Serialize;

// == Cache Stats ==
/// Tracks cache performance metrics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Reads served from a fresh entry
    pub hits: u64,
    /// Reads of keys with no entry, served by the read function
    pub misses: u64,
    /// Reads of stale entries, served by the read function
    pub refreshes: u64,
    /// Manual writes through `Cache::write`
    pub writes: u64,
    /// Timestamp lookups that needed a remote round-trip
    pub remote_lookups: u64,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Share of reads served without calling the read function.
    ///
    /// Returns 0.0 if no reads have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.reads();
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    // == Reads ==
    /// Total number of reads.
    pub fn reads(&self) -> u64 {
        self.hits + self.misses + self.refreshes
    }

    // == Record Hit ==
    /// Increments the hit counter.
    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    // == Record Miss ==
    /// Increments the miss counter.
    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    // == Record Refresh ==
    /// Increments the refresh counter.
    pub fn record_refresh(&mut self) {
        self.refreshes += 1;
    }

    // == Record Write ==
    /// Increments the manual write counter.
    pub fn record_write(&mut self) {
        self.writes += 1;
    }

    // == Record Remote Lookup ==
    /// Increments the remote lookup counter.
    pub fn record_remote_lookup(&mut self) {
        self.remote_lookups += 1;
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_new() {
        let stats = CacheStats::new();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.refreshes, 0);
        assert_eq!(stats.writes, 0);
        assert_eq!(stats.remote_lookups, 0);
    }

    #[test]
    fn test_hit_rate_no_reads() {
        let stats = CacheStats::new();
        assert_eq!(stats.hit_rate(), 0.0);
    }

    #[test]
    fn test_hit_rate_mixed() {
        let mut stats = CacheStats::new();
        stats.record_hit();
        stats.record_hit();
        stats.record_miss();
        stats.record_refresh();
        stats.record_write();

        assert_eq!(stats.reads(), 4);
        assert_eq!(stats.hit_rate(), 0.5);
    }

    #[test]
    fn test_stats_serialize() {
        let mut stats = CacheStats::new();
        stats.record_remote_lookup();

        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["remote_lookups"], 1);
        assert_eq!(json["hits"], 0);
    }

    #[test]
    fn test_each_record_bumps_its_own_counter() {
        let mut stats = CacheStats::new();
        stats.record_miss();
        stats.record_refresh();
        stats.record_refresh();
        stats.record_write();
        stats.record_remote_lookup();

        assert_eq!(
            stats,
            CacheStats {
                hits: 0,
                misses: 1,
                refreshes: 2,
                writes: 1,
                remote_lookups: 1,
            }
        );
    }
}
