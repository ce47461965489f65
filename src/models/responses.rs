//! Response DTOs for the admin API

use serde::Serialize;
use serde_json::Value;

use crate::cache::{CacheMetrics, EntrySummary};
use crate::error::FetchError;

/// Response body for GET /health
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
    pub persistence: bool,
    pub entries: usize,
}

impl HealthResponse {
    pub fn healthy(persistence: bool, entries: usize) -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            persistence,
            entries,
        }
    }
}

/// Response body for GET /metrics
#[derive(Debug, Clone, Serialize)]
pub struct MetricsResponse {
    #[serde(flatten)]
    pub cache: CacheMetrics,
    pub inflight_requests: usize,
}

/// Response body for GET /entries
#[derive(Debug, Clone, Serialize)]
pub struct EntriesResponse {
    pub count: usize,
    pub entries: Vec<EntrySummary>,
}

impl From<Vec<EntrySummary>> for EntriesResponse {
    fn from(entries: Vec<EntrySummary>) -> Self {
        Self {
            count: entries.len(),
            entries,
        }
    }
}

/// Response body for POST /invalidate
#[derive(Debug, Clone, Serialize)]
pub struct InvalidateResponse {
    pub pattern: String,
    pub removed: usize,
}

/// Response body for DELETE /cache
#[derive(Debug, Clone, Serialize)]
pub struct ClearResponse {
    pub message: String,
}

impl ClearResponse {
    pub fn cleared() -> Self {
        Self {
            message: "Cache cleared".to_string(),
        }
    }
}

/// One slot of a batch; failures carry the error message instead of data.
#[derive(Debug, Clone, Serialize)]
pub struct BatchItem {
    pub url: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BatchItem {
    pub fn from_outcome(url: String, outcome: Result<Value, FetchError>) -> Self {
        match outcome {
            Ok(data) => Self {
                url,
                ok: true,
                data: Some(data),
                error: None,
            },
            Err(err) => Self {
                url,
                ok: false,
                data: None,
                error: Some(err.to_string()),
            },
        }
    }
}

/// Response body for POST /batch
#[derive(Debug, Clone, Serialize)]
pub struct BatchResponse {
    pub succeeded: usize,
    pub failed: usize,
    pub results: Vec<BatchItem>,
}

impl From<Vec<BatchItem>> for BatchResponse {
    fn from(results: Vec<BatchItem>) -> Self {
        let succeeded = results.iter().filter(|item| item.ok).count();
        Self {
            succeeded,
            failed: results.len() - succeeded,
            results,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_health_response_serialize() {
        let resp = HealthResponse::healthy(true, 3);
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["entries"], 3);
        assert!(json["timestamp"].is_string());
    }

    #[test]
    fn test_metrics_response_is_flat() {
        let resp = MetricsResponse {
            cache: crate::cache::CacheStats::new().snapshot(0, 0),
            inflight_requests: 2,
        };
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["hits"], 0);
        assert_eq!(json["inflight_requests"], 2);
    }

    #[test]
    fn test_batch_item_marks_failures() {
        let failed = BatchItem::from_outcome(
            "/api/x".to_string(),
            Err(FetchError::Status {
                status: 404,
                url: "/api/x".to_string(),
            }),
        );
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["ok"], false);
        assert!(json.get("data").is_none());
        assert!(json["error"].as_str().unwrap().contains("404"));
    }

    #[test]
    fn test_batch_response_counts() {
        let resp = BatchResponse::from(vec![
            BatchItem::from_outcome("/a".to_string(), Ok(json!(1))),
            BatchItem::from_outcome(
                "/b".to_string(),
                Err(FetchError::Transport {
                    url: "/b".to_string(),
                    reason: "refused".to_string(),
                }),
            ),
        ]);
        assert_eq!(resp.succeeded, 1);
        assert_eq!(resp.failed, 1);
    }
}
