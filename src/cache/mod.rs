//! Cache Module
//!
//! Provides in-memory caching with TTL expiration, priority-aware LRU
//! eviction, optional compression and best-effort persistence.

mod clock;
pub mod codec;
mod entry;
mod eviction;
pub(crate) mod manager;
mod stats;
mod store;


// Re-export public types
pub use clock::{current_timestamp_ms, Clock, ManualClock, SystemClock};
pub use entry::{CacheEntry, Payload, Priority};
pub use eviction::{Capacity, EvictionPolicy};
pub use manager::{CacheManager, EntrySummary, SetOptions};
pub use stats::{CacheMetrics, CacheStats};
pub use store::EntryStore;
