//! Dash Cache - client-side data cache with request deduplication
//!
//! Keeps dashboard API responses in a TTL, priority-aware LRU cache with
//! transparent compression and optional durable storage, and collapses
//! concurrent identical requests into one network call.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod network;
pub mod persistence;
pub mod tasks;

pub use api::AppState;
pub use cache::{CacheManager, Priority, SetOptions};
pub use config::{CacheConfig, Config};
pub use error::{CacheError, FetchError, Result};
pub use network::{FetchOptions, NetworkOptimizer};
pub use tasks::{spawn_metrics_reporter, spawn_sweeper};
