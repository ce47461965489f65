//! Cache Manager Module
//!
//! Public face of the cache. Every read and write runs its bookkeeping
//! (expiry check, access stats, eviction) inside one short critical section
//! that never spans an `.await`; persistence happens afterwards on a
//! snapshot and may lag memory, never lead it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::cache::codec;
use crate::cache::{
    CacheEntry, CacheMetrics, CacheStats, Capacity, Clock, EntryStore, EvictionPolicy, Payload,
    Priority, SystemClock,
};
use crate::config::CacheConfig;
use crate::error::{CacheError, CodecError, Result};
use crate::persistence::{KeyValueStore, PersistenceAdapter, SyncStrategy};
use crate::tasks::spawn_persist_writer;

// == Set Options ==
/// Per-write overrides; unset fields fall back to the cache configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct SetOptions {
    pub ttl: Option<Duration>,
    pub priority: Option<Priority>,
    /// Overrides the key-prefix sync strategy
    pub sync: Option<SyncStrategy>,
}

impl SetOptions {
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_sync(mut self, sync: SyncStrategy) -> Self {
        self.sync = Some(sync);
        self
    }
}

// == Entry Summary ==
/// Metadata view of one entry, without its value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntrySummary {
    pub key: String,
    pub priority: Priority,
    pub compressed: bool,
    pub size_bytes: u64,
    pub access_count: u64,
    pub created_at: u64,
    pub expires_at: u64,
    pub last_accessed_at: u64,
}

impl From<&CacheEntry> for EntrySummary {
    fn from(entry: &CacheEntry) -> Self {
        Self {
            key: entry.key.clone(),
            priority: entry.priority,
            compressed: entry.compressed(),
            size_bytes: entry.size_bytes,
            access_count: entry.access_count,
            created_at: entry.created_at,
            expires_at: entry.expires_at(),
            last_accessed_at: entry.last_accessed_at,
        }
    }
}

#[derive(Debug, Default)]
struct State {
    store: EntryStore,
    stats: CacheStats,
    /// Logical clock for LRU tie-breaks
    seq: u64,
}

impl State {
    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    fn usage(&self, capacity: Capacity) -> u64 {
        match capacity {
            Capacity::Entries(_) => self.store.len() as u64,
            Capacity::Bytes(_) => self.store.resident_bytes(),
        }
    }
}

/// Shared internals; background tasks hold this through `Arc` or `Weak`.
#[derive(Debug)]
pub(crate) struct ManagerInner {
    config: CacheConfig,
    clock: Arc<dyn Clock>,
    policy: EvictionPolicy,
    state: Mutex<State>,
    persistence: Option<PersistenceAdapter>,
    persist_tx: Option<mpsc::UnboundedSender<Duration>>,
    /// Serializes flushes so an older snapshot never overwrites a newer one
    flush_lock: tokio::sync::Mutex<()>,
}

impl ManagerInner {
    // == Flush ==
    /// Writes the current entry set to storage. Failures are counted, not returned.
    pub(crate) async fn flush(&self) {
        let Some(persistence) = &self.persistence else {
            return;
        };
        let _guard = self.flush_lock.lock().await;
        if !persistence.is_enabled() {
            return;
        }

        let snapshot: Vec<CacheEntry> = self.state.lock().store.values().cloned().collect();
        let outcome = persistence.save_all(&snapshot).await;

        let mut state = self.state.lock();
        match outcome {
            Ok(()) => state.stats.sync_operations += 1,
            Err(_) => state.stats.persistence_errors += 1,
        }
    }

    async fn schedule_persist(&self, strategy: SyncStrategy) {
        let Some(tx) = &self.persist_tx else {
            return;
        };
        let delay = match strategy {
            SyncStrategy::Immediate => return self.flush().await,
            SyncStrategy::Background => self.config.persist_debounce,
            SyncStrategy::Interval(every) => every,
        };
        // The writer only stops once every manager handle is gone
        let _ = tx.send(delay);
    }
}

// == Cache Manager ==
/// Cloneable handle to one cache instance.
#[derive(Debug, Clone)]
pub struct CacheManager {
    inner: Arc<ManagerInner>,
}

impl CacheManager {
    // == Constructor ==
    /// Creates a memory-only cache on the system clock.
    pub async fn new(config: CacheConfig) -> Result<Self> {
        Self::with_parts(config, None, Arc::new(SystemClock)).await
    }

    /// Creates a cache with an optional durable store and a custom clock.
    ///
    /// Persisted entries are loaded before this returns. Persistence is
    /// active only when `config.enable_persistence` is set and a store is
    /// given.
    pub async fn with_parts(
        config: CacheConfig,
        storage: Option<Arc<dyn KeyValueStore>>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;

        let persistence = storage
            .filter(|_| config.enable_persistence)
            .map(|storage| PersistenceAdapter::new(storage, config.persistence_failure_limit));

        let mut state = State::default();
        if let Some(adapter) = &persistence {
            let mut restored: Vec<CacheEntry> =
                adapter.load_all(clock.now_ms()).await.into_values().collect();
            // Keep the persisted recency order for the LRU tie-break
            restored.sort_by_key(|entry| (entry.last_accessed_at, entry.seq));
            for mut entry in restored {
                entry.seq = state.next_seq();
                state.store.put(entry);
            }
        }

        let policy = EvictionPolicy::new(config.capacity, config.eviction_headroom);
        let (persist_tx, persist_rx) = match &persistence {
            Some(_) => {
                let (tx, rx) = mpsc::unbounded_channel();
                (Some(tx), Some(rx))
            }
            None => (None, None),
        };

        let inner = Arc::new(ManagerInner {
            config,
            clock,
            policy,
            state: Mutex::new(state),
            persistence,
            persist_tx,
            flush_lock: tokio::sync::Mutex::new(()),
        });

        if let Some(rx) = persist_rx {
            spawn_persist_writer(Arc::downgrade(&inner), rx);
        }

        let manager = Self { inner };
        // Restored data may exceed a budget that shrank since it was written
        manager.enforce_capacity();
        Ok(manager)
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    pub fn now_ms(&self) -> u64 {
        self.inner.clock.now_ms()
    }

    /// Whether writes currently reach durable storage.
    pub fn persistence_active(&self) -> bool {
        self.inner
            .persistence
            .as_ref()
            .is_some_and(PersistenceAdapter::is_enabled)
    }

    // == Get ==
    /// Returns the live value stored under `key`.
    ///
    /// `None` covers absent, expired, undecodable, and wrong-shape entries.
    /// Expired and undecodable entries are removed as a side effect; an entry
    /// that merely does not fit `T` is left for callers asking for the right
    /// type.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.lookup(key, None).await
    }

    /// Like [`get`](Self::get), additionally raising the entry's priority to
    /// `priority` on a hit. Priority is never lowered by a read.
    pub async fn get_with_priority<T: DeserializeOwned>(
        &self,
        key: &str,
        priority: Priority,
    ) -> Option<T> {
        self.lookup(key, Some(priority)).await
    }

    async fn lookup<T: DeserializeOwned>(&self, key: &str, priority: Option<Priority>) -> Option<T> {
        let now = self.now_ms();

        let outcome = {
            let mut guard = self.inner.state.lock();
            let state = &mut *guard;

            let expired = match state.store.get(key) {
                None => {
                    state.stats.record_miss();
                    return None;
                }
                Some(entry) => entry.is_expired(now),
            };

            if expired {
                state.store.delete(key);
                state.stats.record_miss();
                state.stats.record_expirations(1);
                Err(Removed::Yes)
            } else {
                let seq = state.next_seq();
                let entry = state.store.get_mut(key)?;
                match decode_payload(&entry.payload) {
                    Err(err) => {
                        warn!(key, error = %err, "Dropping unreadable cache entry");
                        state.store.delete(key);
                        state.stats.record_miss();
                        Err(Removed::Yes)
                    }
                    Ok(value) => match serde_json::from_value::<T>(value) {
                        Ok(value) => {
                            entry.touch(now, seq);
                            if let Some(priority) = priority {
                                entry.priority = entry.priority.max(priority);
                            }
                            state.stats.record_hit();
                            Ok(value)
                        }
                        // The entry is intact; only this caller's type is off
                        Err(err) => {
                            debug!(key, error = %err, "Cached value has a different shape");
                            state.stats.record_miss();
                            Err(Removed::No)
                        }
                    },
                }
            }
        };

        match outcome {
            Ok(value) => Some(value),
            Err(Removed::Yes) => {
                self.inner.schedule_persist(SyncStrategy::Background).await;
                None
            }
            Err(Removed::No) => None,
        }
    }

    /// Whether a live entry exists, without touching statistics or recency.
    pub fn contains(&self, key: &str) -> bool {
        let now = self.now_ms();
        self.inner
            .state
            .lock()
            .store
            .get(key)
            .is_some_and(|entry| !entry.is_expired(now))
    }

    pub async fn get_many<T: DeserializeOwned>(&self, keys: &[&str]) -> HashMap<String, Option<T>> {
        let mut results = HashMap::with_capacity(keys.len());
        for key in keys {
            results.insert((*key).to_string(), self.get(key).await);
        }
        results
    }

    // == Set ==
    /// Stores `value` under `key`, replacing any previous entry.
    ///
    /// Returns once memory is updated and eviction has run; durability
    /// follows the key's sync strategy.
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, options: SetOptions) -> Result<()> {
        let ttl = match options.ttl {
            Some(ttl) if ttl.is_zero() => {
                return Err(CacheError::Configuration(format!(
                    "TTL for '{key}' must be greater than zero"
                )));
            }
            Some(ttl) => ttl,
            None => self.inner.config.default_ttl,
        };
        let priority = options.priority.unwrap_or_default();

        let value = serde_json::to_value(value)?;
        let size_bytes = codec::estimate_size(&value);
        let payload = self.encode_payload(key, value, size_bytes);
        let compressed = matches!(payload, Payload::Compressed(_));

        let now = self.now_ms();
        let mut entry = CacheEntry::new(
            key.to_string(),
            payload,
            size_bytes,
            ttl_millis(ttl),
            priority,
            now,
        );

        {
            let mut state = self.inner.state.lock();
            entry.seq = state.next_seq();
            state.store.put(entry);
            if compressed {
                state.stats.record_compression();
            }
            self.evict_locked(&mut state);
        }

        let strategy = options
            .sync
            .unwrap_or_else(|| self.inner.config.sync_strategy_for(key));
        self.inner.schedule_persist(strategy).await;
        Ok(())
    }

    pub async fn set_many<T: Serialize>(&self, items: &[(&str, T, SetOptions)]) -> Result<()> {
        for (key, value, options) in items {
            self.set(key, value, *options).await?;
        }
        Ok(())
    }

    fn encode_payload(&self, key: &str, value: Value, size_bytes: u64) -> Payload {
        let config = &self.inner.config;
        if !config.enable_compression
            || !codec::should_compress(size_bytes, config.compression_threshold)
        {
            return Payload::Raw(value);
        }

        match codec::encode(&value) {
            Ok(blob) => Payload::Compressed(blob),
            Err(err) => {
                warn!(key, error = %err, "Compression failed, storing uncompressed");
                Payload::Raw(value)
            }
        }
    }

    // == Eviction ==
    fn evict_locked(&self, state: &mut State) {
        let policy = &self.inner.policy;
        let usage = state.usage(policy.capacity());
        let victims = policy.select_victims(state.store.values(), usage);
        if victims.is_empty() {
            return;
        }

        for key in &victims {
            state.store.delete(key);
        }
        state.stats.record_evictions(victims.len());
        debug!(count = victims.len(), "Evicted cache entries");
    }

    fn enforce_capacity(&self) {
        let mut state = self.inner.state.lock();
        self.evict_locked(&mut state);
    }

    // == Invalidate ==
    /// Removes every key containing `pattern` or matching it as a regular
    /// expression. Returns the number of entries removed.
    ///
    /// An empty pattern matches nothing; use [`clear`](Self::clear) instead.
    pub async fn invalidate(&self, pattern: &str) -> usize {
        if pattern.is_empty() {
            return 0;
        }
        let regex = Regex::new(pattern).ok();

        let removed = self.inner.state.lock().store.delete_where(|entry| {
            entry.key.contains(pattern) || regex.as_ref().is_some_and(|re| re.is_match(&entry.key))
        });

        if !removed.is_empty() {
            debug!(pattern, count = removed.len(), "Invalidated cache entries");
            self.inner.schedule_persist(SyncStrategy::Background).await;
        }
        removed.len()
    }

    // == Clear ==
    /// Drops every entry from memory and storage and resets the counters.
    pub async fn clear(&self) {
        {
            let mut state = self.inner.state.lock();
            state.store.clear();
            state.stats = CacheStats::new();
        }

        if let Some(persistence) = &self.inner.persistence {
            let _guard = self.inner.flush_lock.lock().await;
            if persistence.remove_all().await.is_err() {
                self.inner.state.lock().stats.persistence_errors += 1;
            }
        }
        info!("Cache cleared completely");
    }

    // == Purge Expired ==
    /// Removes every entry whose TTL has elapsed. Returns how many went.
    pub async fn purge_expired(&self) -> usize {
        let now = self.now_ms();
        let removed = {
            let mut state = self.inner.state.lock();
            let removed = state.store.delete_where(|entry| entry.is_expired(now)).len();
            state.stats.record_expirations(removed);
            removed
        };

        if removed > 0 {
            self.inner.schedule_persist(SyncStrategy::Background).await;
        }
        removed
    }

    /// Writes the current entries to storage right away.
    pub async fn flush(&self) {
        self.inner.flush().await;
    }

    // == Metrics ==
    pub fn metrics(&self) -> CacheMetrics {
        let state = self.inner.state.lock();
        state
            .stats
            .snapshot(state.store.len(), state.store.resident_bytes())
    }

    pub fn len(&self) -> usize {
        self.inner.state.lock().store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Metadata for every resident entry, least recently used first.
    pub fn export(&self) -> Vec<EntrySummary> {
        let state = self.inner.state.lock();
        let mut entries: Vec<&CacheEntry> = state.store.values().collect();
        entries.sort_by_key(|e| (e.last_accessed_at, e.seq));
        entries.into_iter().map(EntrySummary::from).collect()
    }
}

/// Whether a failed lookup dropped the entry.
enum Removed {
    Yes,
    No,
}

fn decode_payload(payload: &Payload) -> std::result::Result<Value, CodecError> {
    match payload {
        Payload::Raw(value) => Ok(value.clone()),
        Payload::Compressed(blob) => codec::decode(blob),
    }
}

/// Stored TTL in whole milliseconds, rounded up so a positive `Duration`
/// never yields an entry that is already expired.
fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}
