//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL, priority and
//! access bookkeeping.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// == Priority ==
/// Eviction tier of an entry. Lower tiers are evicted first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "critical" => Ok(Priority::Critical),
            other => Err(format!("unknown priority '{other}'")),
        }
    }
}

// == Payload ==
/// Stored value: either the JSON itself or its codec encoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "lowercase")]
pub enum Payload {
    Raw(Value),
    Compressed(String),
}

// == Cache Entry ==
/// Represents a single cache entry with value and metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub payload: Payload,
    /// Creation timestamp (Unix milliseconds)
    pub created_at: u64,
    pub ttl_ms: u64,
    pub priority: Priority,
    pub access_count: u64,
    /// Last successful read (Unix milliseconds); equals `created_at` until read
    pub last_accessed_at: u64,
    /// Estimated serialized size of the uncompressed value
    pub size_bytes: u64,
    /// Logical tick of the last write or hit, breaks same-millisecond LRU ties
    #[serde(default)]
    pub seq: u64,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a fresh entry stamped at `now_ms`.
    pub fn new(
        key: String,
        payload: Payload,
        size_bytes: u64,
        ttl_ms: u64,
        priority: Priority,
        now_ms: u64,
    ) -> Self {
        Self {
            key,
            payload,
            created_at: now_ms,
            ttl_ms,
            priority,
            access_count: 0,
            last_accessed_at: now_ms,
            size_bytes,
            seq: 0,
        }
    }

    /// The instant after which the entry is stale.
    pub fn expires_at(&self) -> u64 {
        self.created_at.saturating_add(self.ttl_ms)
    }

    // == Is Expired ==
    /// Checks if the entry has expired at `now_ms`.
    ///
    /// Boundary condition: an entry is expired once `now_ms >= expires_at`,
    /// so a TTL of 1000ms is unreadable exactly 1000ms after insertion.
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms >= self.expires_at()
    }

    /// Remaining TTL in milliseconds, 0 once expired.
    pub fn ttl_remaining_ms(&self, now_ms: u64) -> u64 {
        self.expires_at().saturating_sub(now_ms)
    }

    pub fn compressed(&self) -> bool {
        matches!(self.payload, Payload::Compressed(_))
    }

    /// Records a successful read.
    pub fn touch(&mut self, now_ms: u64, seq: u64) {
        self.access_count += 1;
        self.last_accessed_at = now_ms;
        self.seq = seq;
    }
}
