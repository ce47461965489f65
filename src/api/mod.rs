//! API Module
//!
//! Admin sidecar for the cache: inspection, invalidation and a cached
//! upstream proxy.
//!
//! # Endpoints
//! - `GET /health` - Health check endpoint
//! - `GET /metrics` - Cache counters and in-flight requests
//! - `GET /entries` - Entry metadata, least recently used first
//! - `POST /invalidate` - Remove keys matching a pattern
//! - `DELETE /cache` - Clear memory and storage
//! - `GET /fetch/*path` - Fetch an upstream path through the optimizer
//! - `POST /batch` - Fetch several upstream paths in chunks

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
