//! Configuration Module
//!
//! Cache engine options plus the sidecar's process settings, loaded from
//! environment variables with sensible defaults.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::cache::Capacity;
use crate::error::{CacheError, Result};
use crate::persistence::SyncStrategy;

// == Cache Config ==
/// Options recognized by the cache manager and network optimizer.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Entry-count or byte budget (`maxCacheSize`)
    pub capacity: Capacity,
    /// Fraction of capacity eviction shrinks to, in (0, 1]
    pub eviction_headroom: f64,
    pub default_ttl: Duration,
    /// Values larger than this many bytes are compressed
    pub compression_threshold: u64,
    pub enable_compression: bool,
    pub enable_persistence: bool,
    /// Per key-prefix persistence scheduling; prefix is the text before the first `:`
    pub sync_strategies: HashMap<String, SyncStrategy>,
    pub sweep_interval: Duration,
    /// Delay applied to background persistence writes
    pub persist_debounce: Duration,
    /// Consecutive persistence failures before persistence is switched off
    pub persistence_failure_limit: u32,
    /// Deadline for a single outbound request
    pub request_timeout: Duration,
}

impl CacheConfig {
    // == Validate ==
    /// Rejects option combinations the cache cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.capacity.limit() == 0 {
            return Err(CacheError::Configuration(
                "capacity must be greater than zero".to_string(),
            ));
        }
        if !(self.eviction_headroom > 0.0 && self.eviction_headroom <= 1.0) {
            return Err(CacheError::Configuration(format!(
                "eviction headroom must be in (0, 1], got {}",
                self.eviction_headroom
            )));
        }
        if self.default_ttl.is_zero() {
            return Err(CacheError::Configuration(
                "default TTL must be greater than zero".to_string(),
            ));
        }
        if self.sweep_interval.is_zero() {
            return Err(CacheError::Configuration(
                "sweep interval must be greater than zero".to_string(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(CacheError::Configuration(
                "request timeout must be greater than zero".to_string(),
            ));
        }
        for (prefix, strategy) in &self.sync_strategies {
            if let SyncStrategy::Interval(every) = strategy {
                if every.is_zero() {
                    return Err(CacheError::Configuration(format!(
                        "sync interval for prefix '{prefix}' must be greater than zero"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Strategy for `key`, looked up by the prefix before the first `:`.
    pub fn sync_strategy_for(&self, key: &str) -> SyncStrategy {
        let prefix = key.split(':').next().unwrap_or(key);
        self.sync_strategies
            .get(prefix)
            .copied()
            .unwrap_or_default()
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        let sync_strategies = HashMap::from([
            ("market-data".to_string(), SyncStrategy::Immediate),
            (
                "user-data".to_string(),
                SyncStrategy::Interval(Duration::from_secs(60)),
            ),
            ("static-data".to_string(), SyncStrategy::Background),
        ]);

        Self {
            capacity: Capacity::Entries(1000),
            eviction_headroom: 0.9,
            default_ttl: Duration::from_secs(5 * 60),
            compression_threshold: 10 * 1024,
            enable_compression: true,
            enable_persistence: true,
            sync_strategies,
            sweep_interval: Duration::from_secs(5 * 60),
            persist_debounce: Duration::from_millis(250),
            persistence_failure_limit: 5,
            request_timeout: Duration::from_secs(30),
        }
    }
}

// == Config ==
/// Sidecar configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    pub cache: CacheConfig,
    /// Directory backing the file storage; `None` keeps the cache memory-only
    pub cache_dir: Option<PathBuf>,
    /// Base URL that `/fetch/*path` requests are forwarded to
    pub upstream_url: String,
    /// HTTP server port
    pub server_port: u16,
    /// Interval between metrics log lines
    pub metrics_interval: Duration,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `MAX_ENTRIES` - Entry-count capacity (default: 1000)
    /// - `MAX_BYTES` - Byte capacity; takes precedence over `MAX_ENTRIES`
    /// - `DEFAULT_TTL_MS` - Default TTL in milliseconds (default: 300000)
    /// - `COMPRESSION_THRESHOLD` - Bytes above which values are compressed (default: 10240)
    /// - `ENABLE_COMPRESSION` / `ENABLE_PERSISTENCE` - `true`/`false` (default: true)
    /// - `SWEEP_INTERVAL_SECS` - Expiry sweep cadence (default: 300)
    /// - `REQUEST_TIMEOUT_MS` - Outbound request deadline (default: 30000)
    /// - `CACHE_DIR` - Persistence directory (default: unset, memory-only)
    /// - `UPSTREAM_URL` - Forwarding target (default: http://localhost:8000)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `METRICS_INTERVAL_SECS` - Metrics log cadence (default: 60)
    pub fn from_env() -> Self {
        let defaults = Config::default();
        let mut cache = defaults.cache;

        if let Some(bytes) = parse_var("MAX_BYTES") {
            cache.capacity = Capacity::Bytes(bytes);
        } else if let Some(entries) = parse_var("MAX_ENTRIES") {
            cache.capacity = Capacity::Entries(entries);
        }
        if let Some(ms) = parse_var("DEFAULT_TTL_MS") {
            cache.default_ttl = Duration::from_millis(ms);
        }
        if let Some(threshold) = parse_var("COMPRESSION_THRESHOLD") {
            cache.compression_threshold = threshold;
        }
        if let Some(flag) = parse_var("ENABLE_COMPRESSION") {
            cache.enable_compression = flag;
        }
        if let Some(flag) = parse_var("ENABLE_PERSISTENCE") {
            cache.enable_persistence = flag;
        }
        if let Some(secs) = parse_var("SWEEP_INTERVAL_SECS") {
            cache.sweep_interval = Duration::from_secs(secs);
        }
        if let Some(ms) = parse_var("REQUEST_TIMEOUT_MS") {
            cache.request_timeout = Duration::from_millis(ms);
        }

        Self {
            cache,
            cache_dir: env::var("CACHE_DIR").ok().map(PathBuf::from),
            upstream_url: env::var("UPSTREAM_URL").unwrap_or(defaults.upstream_url),
            server_port: parse_var("SERVER_PORT").unwrap_or(defaults.server_port),
            metrics_interval: parse_var("METRICS_INTERVAL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.metrics_interval),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            cache_dir: None,
            upstream_url: "http://localhost:8000".to_string(),
            server_port: 3000,
            metrics_interval: Duration::from_secs(60),
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}
