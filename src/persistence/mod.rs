//! Persistence Module
//!
//! Best-effort durable mirror of the cache. Entries are written as one JSON
//! document to a string key-value store and reloaded at startup. Nothing in
//! here is allowed to fail a cache read or write: errors are logged, counted,
//! and after too many in a row persistence switches itself off.

mod file;
mod memory;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cache::codec::CODEC_VERSION;
use crate::cache::CacheEntry;
use crate::error::StorageError;

pub use file::FileStorage;
pub use memory::MemoryStorage;

/// Storage key the cache document lives under.
pub const STORAGE_KEY: &str = "dash_cache";

// == Key-Value Store ==
/// Durable string store, shaped like browser `localStorage`.
#[async_trait]
pub trait KeyValueStore: Send + Sync + std::fmt::Debug {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;
    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;
    async fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}

// == Sync Strategy ==
/// When a mutation is written through to storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStrategy {
    /// Flush before the mutating call returns
    Immediate,
    /// Debounced write shortly after the mutation
    #[default]
    Background,
    /// Write no later than the given delay
    Interval(Duration),
}

#[derive(Serialize)]
struct DocumentRef<'a> {
    version: u32,
    entries: &'a [CacheEntry],
}

#[derive(Deserialize)]
struct Document {
    version: u32,
    entries: Vec<CacheEntry>,
}

// == Persistence Adapter ==
#[derive(Debug)]
pub struct PersistenceAdapter {
    storage: Arc<dyn KeyValueStore>,
    failure_limit: u32,
    consecutive_failures: AtomicU32,
    tripped: AtomicBool,
}

impl PersistenceAdapter {
    pub fn new(storage: Arc<dyn KeyValueStore>, failure_limit: u32) -> Self {
        Self {
            storage,
            failure_limit,
            consecutive_failures: AtomicU32::new(0),
            tripped: AtomicBool::new(false),
        }
    }

    /// False once repeated failures have switched persistence off.
    pub fn is_enabled(&self) -> bool {
        !self.tripped.load(Ordering::Acquire)
    }

    // == Load All ==
    /// Reads the persisted entries, dropping any already expired at `now_ms`.
    ///
    /// A missing, unreadable, or foreign-version document yields an empty map.
    pub async fn load_all(&self, now_ms: u64) -> HashMap<String, CacheEntry> {
        let raw = match self.storage.get_item(STORAGE_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return HashMap::new(),
            Err(err) => {
                warn!(error = %err, "Failed to read persisted cache");
                self.record_failure();
                return HashMap::new();
            }
        };

        let document: Document = match serde_json::from_str(&raw) {
            Ok(document) => document,
            Err(err) => {
                warn!(error = %err, "Persisted cache is corrupt, discarding");
                self.discard().await;
                return HashMap::new();
            }
        };

        if document.version != CODEC_VERSION {
            warn!(
                found = document.version,
                expected = CODEC_VERSION,
                "Persisted cache written by another codec version, discarding"
            );
            self.discard().await;
            return HashMap::new();
        }

        let total = document.entries.len();
        let live: HashMap<String, CacheEntry> = document
            .entries
            .into_iter()
            .filter(|entry| !entry.is_expired(now_ms))
            .map(|entry| (entry.key.clone(), entry))
            .collect();

        info!(
            restored = live.len(),
            expired = total - live.len(),
            "Restored cache from persistence"
        );
        live
    }

    // == Save All ==
    /// Writes the full entry set. No-op once persistence has been switched off.
    pub async fn save_all(&self, entries: &[CacheEntry]) -> Result<(), StorageError> {
        if !self.is_enabled() {
            return Ok(());
        }

        let document = DocumentRef {
            version: CODEC_VERSION,
            entries,
        };
        let result = match serde_json::to_string(&document) {
            Ok(raw) => self.storage.set_item(STORAGE_KEY, &raw).await,
            Err(err) => Err(StorageError::Corrupt(err.to_string())),
        };

        match &result {
            Ok(()) => {
                self.consecutive_failures.store(0, Ordering::Release);
                debug!(entries = entries.len(), "Persisted cache");
            }
            Err(err) => {
                warn!(error = %err, "Failed to persist cache");
                self.record_failure();
            }
        }
        result
    }

    /// Deletes the persisted document.
    pub async fn remove_all(&self) -> Result<(), StorageError> {
        let result = self.storage.remove_item(STORAGE_KEY).await;
        if let Err(err) = &result {
            warn!(error = %err, "Failed to remove persisted cache");
            self.record_failure();
        }
        result
    }

    async fn discard(&self) {
        let _ = self.remove_all().await;
    }

    fn record_failure(&self) {
        let failures = self.consecutive_failures.fetch_add(1, Ordering::AcqRel) + 1;
        if failures >= self.failure_limit && !self.tripped.swap(true, Ordering::AcqRel) {
            warn!(
                failures,
                "Persistence failing repeatedly, continuing memory-only"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{Payload, Priority};
    use serde_json::json;

    fn entry(key: &str, created_at: u64, ttl_ms: u64) -> CacheEntry {
        CacheEntry::new(
            key.to_string(),
            Payload::Raw(json!({"key": key})),
            13,
            ttl_ms,
            Priority::Medium,
            created_at,
        )
    }

    #[tokio::test]
    async fn test_save_then_load_roundtrip() {
        let storage = Arc::new(MemoryStorage::new());
        let adapter = PersistenceAdapter::new(storage.clone(), 5);

        let entries = vec![entry("a", 1_000, 10_000), entry("b", 1_000, 10_000)];
        adapter.save_all(&entries).await.unwrap();

        let loaded = adapter.load_all(2_000).await;
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded["a"], entries[0]);
    }

    #[tokio::test]
    async fn test_load_drops_expired_entries() {
        let storage = Arc::new(MemoryStorage::new());
        let adapter = PersistenceAdapter::new(storage, 5);

        adapter
            .save_all(&[entry("stale", 1_000, 500), entry("fresh", 1_000, 10_000)])
            .await
            .unwrap();

        let loaded = adapter.load_all(2_000).await;
        assert!(loaded.contains_key("fresh"));
        assert!(!loaded.contains_key("stale"));
    }

    #[tokio::test]
    async fn test_load_discards_foreign_version() {
        let storage = Arc::new(MemoryStorage::new());
        storage
            .set_item(STORAGE_KEY, r#"{"version":99,"entries":[]}"#)
            .await
            .unwrap();
        let adapter = PersistenceAdapter::new(storage.clone(), 5);

        assert!(adapter.load_all(0).await.is_empty());
        assert_eq!(storage.get_item(STORAGE_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_load_discards_corrupt_document() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set_item(STORAGE_KEY, "{not json").await.unwrap();
        let adapter = PersistenceAdapter::new(storage.clone(), 5);

        assert!(adapter.load_all(0).await.is_empty());
        assert_eq!(storage.get_item(STORAGE_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_repeated_failures_disable_persistence() {
        let storage = Arc::new(MemoryStorage::with_quota(8));
        let adapter = PersistenceAdapter::new(storage.clone(), 3);
        let entries = vec![entry("a", 0, 10_000)];

        for _ in 0..3 {
            assert!(matches!(
                adapter.save_all(&entries).await,
                Err(StorageError::QuotaExceeded { .. })
            ));
        }

        assert!(!adapter.is_enabled());
        // Further saves are skipped rather than retried
        assert!(adapter.save_all(&entries).await.is_ok());
        assert_eq!(storage.write_count(), 0);
    }

    #[tokio::test]
    async fn test_success_resets_failure_streak() {
        let storage = Arc::new(MemoryStorage::new());
        let adapter = PersistenceAdapter::new(storage.clone(), 2);

        storage.set_unavailable(true);
        assert!(adapter.save_all(&[]).await.is_err());
        storage.set_unavailable(false);
        assert!(adapter.save_all(&[]).await.is_ok());
        storage.set_unavailable(true);
        assert!(adapter.save_all(&[]).await.is_err());

        assert!(adapter.is_enabled());
    }
}
