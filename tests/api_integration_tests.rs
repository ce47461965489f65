//! Integration Tests for API Endpoints
//!
//! Drives the full router with a counting upstream transport.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use dash_cache::{
    api::create_router,
    cache::{CacheManager, ManualClock, SetOptions},
    config::CacheConfig,
    error::FetchError,
    network::{HttpRequest, HttpResponse, Transport},
    persistence::FileStorage,
    AppState,
};
use serde_json::{json, Value};
use tower::ServiceExt;

// == Helper Functions ==

/// Echoes the requested path; `/api/broken*` answers 500.
#[derive(Debug, Default)]
struct CountingUpstream {
    calls: AtomicUsize,
}

#[async_trait]
impl Transport for CountingUpstream {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(5)).await;
        if request.url.starts_with("/api/broken") {
            return Ok(HttpResponse::new(500, r#"{"detail":"error"}"#));
        }
        Ok(HttpResponse::new(200, json!({ "path": request.url }).to_string()))
    }
}

struct TestApp {
    router: Router,
    cache: CacheManager,
    upstream: Arc<CountingUpstream>,
}

impl TestApp {
    async fn new() -> Self {
        let config = CacheConfig {
            enable_persistence: false,
            ..CacheConfig::default()
        };
        let cache = CacheManager::new(config).await.unwrap();
        let upstream = Arc::new(CountingUpstream::default());
        let router = create_router(AppState::new(cache.clone(), upstream.clone()));
        Self {
            router,
            cache,
            upstream,
        }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        (status, body_to_json(response.into_body()).await)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }

    async fn post_json(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    fn upstream_calls(&self) -> usize {
        self.upstream.calls.load(Ordering::SeqCst)
    }
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// == Health Endpoint Tests ==

#[tokio::test]
async fn test_health_endpoint() {
    let app = TestApp::new().await;

    let (status, json) = app.get("/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["persistence"], false);
    assert!(json["timestamp"].is_string());
}

// == Fetch Endpoint Tests ==

#[tokio::test]
async fn test_fetch_is_cached() {
    let app = TestApp::new().await;

    let (status, first) = app.get("/fetch/api/symbols").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["path"], "/api/symbols");

    let (_, second) = app.get("/fetch/api/symbols").await;
    assert_eq!(first, second);
    assert_eq!(app.upstream_calls(), 1);

    let (_, metrics) = app.get("/metrics").await;
    assert_eq!(metrics["hits"], 1);
    assert_eq!(metrics["size"], 1);
}

#[tokio::test]
async fn test_concurrent_fetches_share_one_upstream_call() {
    let app = TestApp::new().await;

    let requests = (0..10).map(|_| app.get("/fetch/api/strategies"));
    let responses = futures::future::join_all(requests).await;

    assert!(responses.iter().all(|(status, _)| *status == StatusCode::OK));
    assert_eq!(app.upstream_calls(), 1);
}

#[tokio::test]
async fn test_fetch_query_is_part_of_the_request() {
    let app = TestApp::new().await;

    app.get("/fetch/api/market/data?symbol=AAPL").await;
    app.get("/fetch/api/market/data?symbol=MSFT").await;
    let (_, json) = app.get("/fetch/api/market/data?symbol=AAPL").await;

    assert_eq!(json["path"], "/api/market/data?symbol=AAPL");
    assert_eq!(app.upstream_calls(), 2);
}

#[tokio::test]
async fn test_fetch_upstream_error_is_forwarded_and_not_cached() {
    let app = TestApp::new().await;

    let (status, json) = app.get("/fetch/api/broken").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(json["error"].as_str().unwrap().contains("500"));

    app.get("/fetch/api/broken").await;
    assert_eq!(app.upstream_calls(), 2);
    assert!(app.cache.is_empty());
}

// == Batch Endpoint Tests ==

#[tokio::test]
async fn test_batch_reports_each_item() {
    let app = TestApp::new().await;

    let (status, json) = app
        .post_json(
            "/batch",
            json!({"urls": ["/api/strategies", "/api/broken", "/api/symbols"], "batch_size": 2}),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["succeeded"], 2);
    assert_eq!(json["failed"], 1);
    assert_eq!(json["results"][0]["data"]["path"], "/api/strategies");
    assert_eq!(json["results"][1]["ok"], false);
}

#[tokio::test]
async fn test_batch_rejects_empty_list() {
    let app = TestApp::new().await;

    let (status, json) = app.post_json("/batch", json!({"urls": []})).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json.get("error").is_some());
}

// == Entries / Invalidate / Clear Tests ==

#[tokio::test]
async fn test_entries_lists_metadata() {
    let app = TestApp::new().await;
    app.cache
        .set("market:AAPL", &json!({"price": 1}), SetOptions::default())
        .await
        .unwrap();

    let (status, json) = app.get("/entries").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["count"], 1);
    assert_eq!(json["entries"][0]["key"], "market:AAPL");
    assert_eq!(json["entries"][0]["priority"], "medium");
    assert!(json["entries"][0].get("value").is_none());
}

#[tokio::test]
async fn test_invalidate_endpoint() {
    let app = TestApp::new().await;
    for key in ["market:AAPL", "market:MSFT", "user:prefs"] {
        app.cache.set(key, &1, SetOptions::default()).await.unwrap();
    }

    let (status, json) = app.post_json("/invalidate", json!({"pattern": "^market:"})).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["removed"], 2);
    assert_eq!(app.cache.len(), 1);

    let (_, json) = app.post_json("/invalidate", json!({"pattern": "nonexistent"})).await;
    assert_eq!(json["removed"], 0);
}

#[tokio::test]
async fn test_invalidate_malformed_body() {
    let app = TestApp::new().await;

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/invalidate")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"not_pattern": 1}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn test_clear_endpoint() {
    let app = TestApp::new().await;
    app.get("/fetch/api/symbols").await;
    assert_eq!(app.cache.len(), 1);

    let (status, _) = app
        .send(
            Request::builder()
                .method("DELETE")
                .uri("/cache")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert!(app.cache.is_empty());

    app.get("/fetch/api/symbols").await;
    assert_eq!(app.upstream_calls(), 2);
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let app = TestApp::new().await;

    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// == Persistence Across Restarts ==

#[tokio::test]
async fn test_file_storage_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let clock = ManualClock::default();

    {
        let storage = Arc::new(FileStorage::open(dir.path()).unwrap());
        let cache =
            CacheManager::with_parts(CacheConfig::default(), Some(storage), Arc::new(clock.clone()))
                .await
                .unwrap();
        let large: Vec<Value> = (0..2000).map(|i| json!({"t": i, "close": 101.5})).collect();
        cache.set("market:history", &large, SetOptions::default()).await.unwrap();
        cache.set("static-data:symbols", &["AAPL", "MSFT"], SetOptions::default()).await.unwrap();
        cache.flush().await;
    }

    let storage = Arc::new(FileStorage::open(dir.path()).unwrap());
    let cache = CacheManager::with_parts(CacheConfig::default(), Some(storage), Arc::new(clock))
        .await
        .unwrap();

    let symbols: Option<Vec<String>> = cache.get("static-data:symbols").await;
    assert_eq!(symbols, Some(vec!["AAPL".to_string(), "MSFT".to_string()]));
    let history: Option<Vec<Value>> = cache.get("market:history").await;
    assert_eq!(history.map(|rows| rows.len()), Some(2000));
}
