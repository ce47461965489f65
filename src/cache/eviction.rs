//! Eviction Policy Module
//!
//! Priority-aware LRU: the lowest priority tier goes first, and within a tier
//! the least recently accessed entry goes first. Critical entries are only
//! touched when nothing else is left.

use serde::{Deserialize, Serialize};

use crate::cache::{CacheEntry, Priority};

// == Capacity ==
/// Budget the cache must stay within.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "unit", content = "limit", rename_all = "lowercase")]
pub enum Capacity {
    /// Maximum number of entries
    Entries(u64),
    /// Maximum sum of `size_bytes`
    Bytes(u64),
}

impl Capacity {
    pub fn limit(&self) -> u64 {
        match self {
            Capacity::Entries(n) | Capacity::Bytes(n) => *n,
        }
    }

    /// How much of the budget one entry consumes.
    pub fn weight(&self, entry: &CacheEntry) -> u64 {
        match self {
            Capacity::Entries(_) => 1,
            Capacity::Bytes(_) => entry.size_bytes,
        }
    }
}

impl Default for Capacity {
    fn default() -> Self {
        Capacity::Entries(1000)
    }
}

// == Eviction Policy ==
#[derive(Debug, Clone, Copy)]
pub struct EvictionPolicy {
    capacity: Capacity,
    /// Fraction of capacity to shrink to once eviction kicks in
    headroom: f64,
}

impl EvictionPolicy {
    pub fn new(capacity: Capacity, headroom: f64) -> Self {
        Self { capacity, headroom }
    }

    pub fn capacity(&self) -> Capacity {
        self.capacity
    }

    /// Usage level eviction shrinks to, rounded up so small budgets still
    /// keep everything but the overflow.
    pub fn target(&self) -> u64 {
        (self.capacity.limit() as f64 * self.headroom).ceil() as u64
    }

    // == Select Victims ==
    /// Returns the keys to remove, in eviction order.
    ///
    /// Empty when `usage` is within capacity, so calling this after every
    /// write is cheap and idempotent.
    pub fn select_victims<'a, I>(&self, entries: I, usage: u64) -> Vec<String>
    where
        I: IntoIterator<Item = &'a CacheEntry>,
    {
        let limit = self.capacity.limit();
        if usage <= limit {
            return Vec::new();
        }

        let mut ordered: Vec<&CacheEntry> = entries.into_iter().collect();
        ordered.sort_by_key(|e| (e.priority, e.last_accessed_at, e.seq));

        let (critical, regular): (Vec<&CacheEntry>, Vec<&CacheEntry>) = ordered
            .into_iter()
            .partition(|e| e.priority == Priority::Critical);

        let mut remaining = usage;
        let mut victims = Vec::new();

        let target = self.target();
        for entry in regular {
            if remaining <= target {
                break;
            }
            remaining = remaining.saturating_sub(self.capacity.weight(entry));
            victims.push(entry.key.clone());
        }

        // Last resort: only critical entries left and still over budget.
        for entry in critical {
            if remaining <= limit {
                break;
            }
            remaining = remaining.saturating_sub(self.capacity.weight(entry));
            victims.push(entry.key.clone());
        }

        victims
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::Payload;
    use serde_json::Value;

    fn entry(key: &str, priority: Priority, accessed: u64, size: u64) -> CacheEntry {
        let mut e = CacheEntry::new(key.to_string(), Payload::Raw(Value::Null), size, 60_000, priority, 0);
        e.last_accessed_at = accessed;
        e
    }

    #[test]
    fn test_no_victims_under_capacity() {
        let policy = EvictionPolicy::new(Capacity::Entries(3), 0.9);
        let entries = vec![entry("a", Priority::Low, 1, 1), entry("b", Priority::Low, 2, 1)];

        assert!(policy.select_victims(&entries, 2).is_empty());
        assert!(policy.select_victims(&entries, 3).is_empty());
    }

    #[test]
    fn test_priority_order_before_recency() {
        let policy = EvictionPolicy::new(Capacity::Entries(1), 1.0);
        let entries = vec![
            entry("high", Priority::High, 1, 1),
            entry("low", Priority::Low, 3, 1),
            entry("medium", Priority::Medium, 2, 1),
        ];

        let victims = policy.select_victims(&entries, 3);
        assert_eq!(victims, vec!["low", "medium"]);
    }

    #[test]
    fn test_lru_within_tier() {
        let policy = EvictionPolicy::new(Capacity::Entries(2), 0.9);
        let entries = vec![
            entry("b", Priority::Low, 20, 1),
            entry("a", Priority::Low, 10, 1),
            entry("c", Priority::Low, 30, 1),
        ];

        assert_eq!(policy.select_victims(&entries, 3), vec!["a"]);
    }

    #[test]
    fn test_seq_breaks_timestamp_ties() {
        let policy = EvictionPolicy::new(Capacity::Entries(2), 1.0);
        let mut a = entry("a", Priority::Low, 10, 1);
        let mut b = entry("b", Priority::Low, 10, 1);
        a.seq = 2;
        b.seq = 1;

        assert_eq!(policy.select_victims(&[a, b, entry("c", Priority::Low, 10, 1)], 3), vec!["c"]);
    }

    #[test]
    fn test_headroom_shrinks_below_capacity() {
        let policy = EvictionPolicy::new(Capacity::Entries(10), 0.8);
        let entries: Vec<CacheEntry> = (0..11)
            .map(|i| entry(&format!("k{i}"), Priority::Medium, i, 1))
            .collect();

        let victims = policy.select_victims(&entries, 11);
        assert_eq!(victims, vec!["k0", "k1", "k2"]);
    }

    #[test]
    fn test_byte_capacity_uses_sizes() {
        let policy = EvictionPolicy::new(Capacity::Bytes(100), 0.9);
        let entries = vec![
            entry("big", Priority::Low, 1, 60),
            entry("small", Priority::Low, 2, 10),
            entry("fresh", Priority::Medium, 3, 50),
        ];

        // 120 bytes resident, target 90: dropping "big" alone suffices
        assert_eq!(policy.select_victims(&entries, 120), vec!["big"]);
    }

    #[test]
    fn test_critical_spared_while_others_remain() {
        let policy = EvictionPolicy::new(Capacity::Entries(2), 1.0);
        let entries = vec![
            entry("crit-old", Priority::Critical, 1, 1),
            entry("crit-new", Priority::Critical, 2, 1),
            entry("low", Priority::Low, 3, 1),
        ];

        assert_eq!(policy.select_victims(&entries, 3), vec!["low"]);
    }

    #[test]
    fn test_oldest_critical_evicted_as_last_resort() {
        let policy = EvictionPolicy::new(Capacity::Entries(1), 0.5);
        let entries = vec![
            entry("crit-new", Priority::Critical, 5, 1),
            entry("crit-old", Priority::Critical, 1, 1),
        ];

        // Critical entries only shrink to capacity, not to the headroom target
        assert_eq!(policy.select_victims(&entries, 2), vec!["crit-old"]);
    }

    #[test]
    fn test_target_rounds_up() {
        assert_eq!(EvictionPolicy::new(Capacity::Entries(2), 0.9).target(), 2);
        assert_eq!(EvictionPolicy::new(Capacity::Entries(1000), 0.9).target(), 900);
        assert_eq!(EvictionPolicy::new(Capacity::Bytes(0), 0.9).target(), 0);
    }
}
