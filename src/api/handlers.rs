//! API Handlers
//!
//! HTTP request handlers for each admin endpoint.

use std::sync::Arc;

use axum::{
    extract::{Path, RawQuery, State},
    Json,
};
use serde_json::Value;
use tracing::info;

use crate::cache::CacheManager;
use crate::error::{CacheError, Result};
use crate::models::{
    BatchFetchRequest, BatchItem, BatchResponse, ClearResponse, EntriesResponse, HealthResponse,
    InvalidateRequest, InvalidateResponse, MetricsResponse,
};
use crate::network::{BatchRequest, FetchOptions, NetworkOptimizer, Transport, DEFAULT_BATCH_SIZE};

/// Application state shared across all handlers.
///
/// Both members are cheap handles onto the same cache instance.
#[derive(Debug, Clone)]
pub struct AppState {
    pub cache: CacheManager,
    pub optimizer: Arc<NetworkOptimizer>,
}

impl AppState {
    pub fn new(cache: CacheManager, transport: Arc<dyn Transport>) -> Self {
        let optimizer = Arc::new(NetworkOptimizer::new(cache.clone(), transport));
        Self { cache, optimizer }
    }
}

/// Handler for GET /health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::healthy(
        state.cache.persistence_active(),
        state.cache.len(),
    ))
}

/// Handler for GET /metrics
pub async fn metrics_handler(State(state): State<AppState>) -> Json<MetricsResponse> {
    Json(MetricsResponse {
        cache: state.cache.metrics(),
        inflight_requests: state.optimizer.inflight_count(),
    })
}

/// Handler for GET /entries
pub async fn entries_handler(State(state): State<AppState>) -> Json<EntriesResponse> {
    Json(EntriesResponse::from(state.cache.export()))
}

/// Handler for POST /invalidate
pub async fn invalidate_handler(
    State(state): State<AppState>,
    Json(req): Json<InvalidateRequest>,
) -> Result<Json<InvalidateResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let removed = state.cache.invalidate(&req.pattern).await;
    info!(pattern = %req.pattern, removed, "Invalidated via API");

    Ok(Json(InvalidateResponse {
        pattern: req.pattern,
        removed,
    }))
}

/// Handler for DELETE /cache
pub async fn clear_handler(State(state): State<AppState>) -> Json<ClearResponse> {
    state.cache.clear().await;
    Json(ClearResponse::cleared())
}

/// Handler for GET /fetch/*path
///
/// Proxies `/{path}?{query}` to the upstream through the optimizer, so
/// repeated and concurrent calls cost one upstream request.
pub async fn fetch_handler(
    State(state): State<AppState>,
    Path(path): Path<String>,
    RawQuery(query): RawQuery,
) -> Result<Json<Value>> {
    let mut url = format!("/{}", path.trim_start_matches('/'));
    if let Some(query) = query.filter(|q| !q.is_empty()) {
        url.push('?');
        url.push_str(&query);
    }

    let value = state
        .optimizer
        .optimized_fetch(&url, FetchOptions::default())
        .await?;
    Ok(Json(value))
}

/// Handler for POST /batch
pub async fn batch_handler(
    State(state): State<AppState>,
    Json(req): Json<BatchFetchRequest>,
) -> Result<Json<BatchResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let batch_size = req.batch_size.unwrap_or(DEFAULT_BATCH_SIZE);
    let requests = req.urls.iter().cloned().map(BatchRequest::get).collect();
    let outcomes = state.optimizer.batch_requests(requests, batch_size).await;

    let items = req
        .urls
        .into_iter()
        .zip(outcomes)
        .map(|(url, outcome)| BatchItem::from_outcome(url, outcome))
        .collect::<Vec<_>>();
    Ok(Json(BatchResponse::from(items)))
}
