//! Error types for the cache engine
//!
//! Provides unified error handling using thiserror. Only configuration,
//! serialization and network failures ever reach a caller; codec and
//! storage failures are absorbed inside the cache and show up as misses
//! or skipped writes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Codec Error ==
/// Failure decoding a compressed payload.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("unsupported codec version tag: {0}")]
    UnsupportedVersion(String),

    #[error("malformed base64 payload: {0}")]
    Base64(String),

    #[error("corrupt compressed stream: {0}")]
    Compression(String),

    #[error("invalid JSON payload: {0}")]
    Json(String),
}

// == Storage Error ==
/// Failure reported by a durable key-value store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// The store refused the write because it is over its capacity
    #[error("storage quota exceeded: {needed} bytes needed, {available} available")]
    QuotaExceeded { needed: usize, available: usize },

    /// The store cannot be used at all
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("storage I/O error: {0}")]
    Io(String),

    #[error("persisted document is invalid: {0}")]
    Corrupt(String),
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}

// == Fetch Error ==
/// Failure of an outbound request issued through the network optimizer.
///
/// Cloneable so that every caller joined on the same in-flight request
/// receives the same error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Upstream answered with a non-2xx status
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    /// The request never produced a response
    #[error("transport error for {url}: {reason}")]
    Transport { url: String, reason: String },

    #[error("request to {url} timed out after {after_ms}ms")]
    Timeout { url: String, after_ms: u64 },

    /// The response body was not valid JSON (or not the expected shape)
    #[error("failed to decode response from {url}: {reason}")]
    Decode { url: String, reason: String },
}

// == Cache Error Enum ==
/// Unified error type for the cache engine.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Invalid options passed at construction or to a call
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Value could not be converted to or from JSON
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] StorageError),

    #[error("Network error: {0}")]
    Network(#[from] FetchError),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::InvalidRequest(_) | CacheError::Configuration(_) => {
                StatusCode::BAD_REQUEST
            }
            CacheError::Network(FetchError::Status { status, .. }) => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            CacheError::Network(FetchError::Timeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
            CacheError::Network(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache engine.
pub type Result<T> = std::result::Result<T, CacheError>;
