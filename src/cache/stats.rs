//! Cache Statistics Module
//!
//! Tracks cache performance metrics including hits, misses, and evictions.

use serde::Serialize;

// == Cache Stats ==
/// Running counters owned by the cache manager.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Entries removed to stay within capacity
    pub evictions: u64,
    /// Entries removed because their TTL elapsed (lazily or by the sweeper)
    pub expirations: u64,
    pub compressions: u64,
    /// Completed persistence writes
    pub sync_operations: u64,
    pub persistence_errors: u64,
}

impl CacheStats {
    // == Constructor ==
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Returns hits / (hits + misses), or 0.0 if no requests have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_evictions(&mut self, count: usize) {
        self.evictions += count as u64;
    }

    pub fn record_expirations(&mut self, count: usize) {
        self.expirations += count as u64;
    }

    pub fn record_compression(&mut self) {
        self.compressions += 1;
    }

    // == Snapshot ==
    /// Builds the read-only view handed to callers.
    pub fn snapshot(&self, size: usize, resident_bytes: u64) -> CacheMetrics {
        CacheMetrics {
            hits: self.hits,
            misses: self.misses,
            evictions: self.evictions,
            expirations: self.expirations,
            compressions: self.compressions,
            sync_operations: self.sync_operations,
            persistence_errors: self.persistence_errors,
            hit_rate: self.hit_rate(),
            size,
            resident_bytes,
        }
    }
}

// == Cache Metrics ==
/// Point-in-time copy of the cache counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheMetrics {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub compressions: u64,
    pub sync_operations: u64,
    pub persistence_errors: u64,
    pub hit_rate: f64,
    /// Current number of entries
    pub size: usize,
    pub resident_bytes: u64,
}
