//! Entry Store Module
//!
//! In-memory mapping from key to entry. It has no policy of its own: expiry,
//! statistics and eviction are decided by the cache manager.

use std::collections::HashMap;

use crate::cache::CacheEntry;

// == Entry Store ==
/// Key-value storage with incremental size accounting.
#[derive(Debug, Default)]
pub struct EntryStore {
    entries: HashMap<String, CacheEntry>,
    /// Sum of `size_bytes` over all entries
    resident_bytes: u64,
}

impl EntryStore {
    // == Constructor ==
    pub fn new() -> Self {
        Self::default()
    }

    // == Get ==
    pub fn get(&self, key: &str) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut CacheEntry> {
        self.entries.get_mut(key)
    }

    // == Put ==
    /// Inserts or replaces the entry stored under `entry.key`.
    ///
    /// Returns the replaced entry, if any.
    pub fn put(&mut self, entry: CacheEntry) -> Option<CacheEntry> {
        self.resident_bytes += entry.size_bytes;
        let previous = self.entries.insert(entry.key.clone(), entry);
        if let Some(old) = &previous {
            self.resident_bytes -= old.size_bytes;
        }
        previous
    }

    // == Delete ==
    pub fn delete(&mut self, key: &str) -> Option<CacheEntry> {
        let removed = self.entries.remove(key);
        if let Some(entry) = &removed {
            self.resident_bytes -= entry.size_bytes;
        }
        removed
    }

    /// Removes every entry matching `predicate` and returns their keys.
    pub fn delete_where<F>(&mut self, mut predicate: F) -> Vec<String>
    where
        F: FnMut(&CacheEntry) -> bool,
    {
        let doomed: Vec<String> = self
            .entries
            .values()
            .filter(|entry| predicate(entry))
            .map(|entry| entry.key.clone())
            .collect();

        for key in &doomed {
            self.delete(key);
        }
        doomed
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    pub fn values(&self) -> impl Iterator<Item = &CacheEntry> {
        self.entries.values()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.resident_bytes = 0;
    }

    // == Length ==
    /// Returns the current number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn resident_bytes(&self) -> u64 {
        self.resident_bytes
    }
}
