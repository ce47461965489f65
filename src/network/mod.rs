//! Network Module
//!
//! Outbound request plumbing: the transport seam, the cache-aware request
//! deduplicator, per-route TTL defaults and the reconnect backoff.

mod http;
mod optimizer;
mod reconnect;
mod routes;

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::Method;
use serde_json::Value;

use crate::error::FetchError;

pub use http::HttpTransport;
pub use optimizer::{BatchOutcome, BatchRequest, NetworkOptimizer, DEFAULT_BATCH_SIZE};
pub use reconnect::{ConnectionState, ReconnectBackoff};
pub use routes::RouteTtlTable;

// == Transport ==
/// Sends one HTTP-like request. Implementations report transport failures
/// only; status codes are interpreted by the optimizer.
#[async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, FetchError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Parses a 2xx body as JSON; any other status is a failure. An empty
    /// success body (204 and friends) reads as `null`.
    pub fn into_json(self, url: &str) -> Result<Value, FetchError> {
        if !self.is_success() {
            return Err(FetchError::Status {
                status: self.status,
                url: url.to_string(),
            });
        }
        if self.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&self.body).map_err(|e| FetchError::Decode {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }
}

// == Fetch Options ==
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub method: Method,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
    /// Overrides the route table TTL for the cached response
    pub ttl: Option<Duration>,
    /// Overrides the request fingerprint as cache and in-flight key
    pub cache_key: Option<String>,
    /// Skip the cache lookup and do not store the response
    pub bypass_cache: bool,
    /// Join an identical in-flight request instead of sending another
    pub dedupe: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            method: Method::GET,
            headers: Vec::new(),
            body: None,
            ttl: None,
            cache_key: None,
            bypass_cache: false,
            dedupe: true,
        }
    }
}

impl FetchOptions {
    pub fn post(body: Value) -> Self {
        Self {
            method: Method::POST,
            body: Some(body),
            ..Self::default()
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn with_cache_key(mut self, key: impl Into<String>) -> Self {
        self.cache_key = Some(key.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn bypass_cache(mut self) -> Self {
        self.bypass_cache = true;
        self
    }

    pub fn without_dedupe(mut self) -> Self {
        self.dedupe = false;
        self
    }
}

/// Identity of a logical request: method, URL, and body.
pub fn fingerprint(method: &Method, url: &str, body: Option<&Value>) -> String {
    let body = body.map(Value::to_string).unwrap_or_default();
    format!("{method}:{url}:{}", STANDARD.encode(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fingerprint_distinguishes_method_and_body() {
        let get = fingerprint(&Method::GET, "/api/backtest", None);
        let post_a = fingerprint(&Method::POST, "/api/backtest", Some(&json!({"symbol": "AAPL"})));
        let post_b = fingerprint(&Method::POST, "/api/backtest", Some(&json!({"symbol": "MSFT"})));

        assert_eq!(get, "GET:/api/backtest:");
        assert_ne!(get, post_a);
        assert_ne!(post_a, post_b);
        assert_eq!(
            post_a,
            fingerprint(&Method::POST, "/api/backtest", Some(&json!({"symbol": "AAPL"})))
        );
    }

    #[test]
    fn test_non_success_status_is_error() {
        let err = HttpResponse::new(503, "{}").into_json("/api/market/status").unwrap_err();
        assert_eq!(
            err,
            FetchError::Status {
                status: 503,
                url: "/api/market/status".to_string()
            }
        );
    }

    #[test]
    fn test_invalid_json_is_decode_error() {
        let err = HttpResponse::new(200, "<html>").into_json("/x").unwrap_err();
        assert!(matches!(err, FetchError::Decode { .. }));
    }

    #[test]
    fn test_empty_success_body_is_null() {
        assert_eq!(HttpResponse::new(204, "").into_json("/api/logout"), Ok(Value::Null));
        assert_eq!(HttpResponse::new(200, " \n").into_json("/x"), Ok(Value::Null));
        assert!(HttpResponse::new(404, "").into_json("/x").is_err());
    }

    #[test]
    fn test_success_parses_body() {
        let value = HttpResponse::new(200, r#"{"symbols":["AAPL"]}"#)
            .into_json("/api/symbols")
            .unwrap();
        assert_eq!(value, json!({"symbols": ["AAPL"]}));
    }

    #[test]
    fn test_fetch_options_defaults() {
        let options = FetchOptions::default();
        assert_eq!(options.method, Method::GET);
        assert!(options.dedupe);
        assert!(!options.bypass_cache);
    }
}
