//! Network Optimizer Module
//!
//! Cache-first fetching with in-flight collapsing. A request is served from
//! the cache when possible; otherwise callers with the same fingerprint
//! share one network call. The shared future is registered in the in-flight
//! table inside the same critical section that found it missing, before
//! anything awaits, so two callers can never both dispatch.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{join_all, BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use super::{fingerprint, FetchOptions, HttpRequest, RouteTtlTable, Transport};
use crate::cache::{CacheManager, SetOptions};
use crate::error::FetchError;

/// Requests per chunk when the caller has no preference.
pub const DEFAULT_BATCH_SIZE: usize = 5;

type SharedFetch = Shared<BoxFuture<'static, Result<Value, FetchError>>>;
type InflightTable = Arc<Mutex<HashMap<String, SharedFetch>>>;

/// Result of one request in a batch. A failure stays in its slot.
pub type BatchOutcome = Result<Value, FetchError>;

#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub url: String,
    pub options: FetchOptions,
}

impl BatchRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            options: FetchOptions::default(),
        }
    }

    pub fn new(url: impl Into<String>, options: FetchOptions) -> Self {
        Self {
            url: url.into(),
            options,
        }
    }
}

/// Everything one network call needs, detached from the optimizer so it can
/// run as a `'static` shared future.
struct Dispatch {
    key: String,
    request: HttpRequest,
    ttl: Duration,
    store: bool,
    cache: CacheManager,
    transport: Arc<dyn Transport>,
    timeout: Duration,
}

impl Dispatch {
    async fn run(self) -> Result<Value, FetchError> {
        let url = self.request.url.clone();
        let sent = tokio::time::timeout(self.timeout, self.transport.send(self.request)).await;

        let result = match sent {
            Ok(Ok(response)) => response.into_json(&url),
            Ok(Err(err)) => Err(err),
            Err(_) => Err(FetchError::Timeout {
                url: url.clone(),
                after_ms: self.timeout.as_millis() as u64,
            }),
        };

        match &result {
            Ok(value) if self.store => {
                let options = SetOptions::default().with_ttl(self.ttl);
                if let Err(err) = self.cache.set(&self.key, value, options).await {
                    warn!(url = %url, error = %err, "Could not cache response");
                }
            }
            Ok(_) => {}
            Err(err) => warn!(url = %url, error = %err, "Request failed"),
        }
        result
    }
}

// == Network Optimizer ==
pub struct NetworkOptimizer {
    cache: CacheManager,
    transport: Arc<dyn Transport>,
    routes: RouteTtlTable,
    timeout: Duration,
    inflight: InflightTable,
}

impl fmt::Debug for NetworkOptimizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkOptimizer")
            .field("transport", &self.transport)
            .field("routes", &self.routes)
            .field("timeout", &self.timeout)
            .field("inflight", &self.inflight_count())
            .finish()
    }
}

impl NetworkOptimizer {
    /// Uses the cache's `request_timeout` and the default route table.
    pub fn new(cache: CacheManager, transport: Arc<dyn Transport>) -> Self {
        let timeout = cache.config().request_timeout;
        Self {
            cache,
            transport,
            routes: RouteTtlTable::default(),
            timeout,
            inflight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn with_routes(mut self, routes: RouteTtlTable) -> Self {
        self.routes = routes;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    /// Number of distinct requests currently on the wire.
    pub fn inflight_count(&self) -> usize {
        self.inflight.lock().len()
    }

    // == Optimized Fetch ==
    /// Fetches `url` as JSON, preferring the cache and joining an identical
    /// request that is already in flight.
    ///
    /// Successful responses are cached under the request fingerprint (or
    /// `options.cache_key`). Failures, non-2xx statuses included, reach
    /// every joined caller and are never cached.
    pub async fn optimized_fetch(&self, url: &str, options: FetchOptions) -> Result<Value, FetchError> {
        let key = options
            .cache_key
            .clone()
            .unwrap_or_else(|| fingerprint(&options.method, url, options.body.as_ref()));

        if !options.bypass_cache {
            if let Some(value) = self.cache.get::<Value>(&key).await {
                debug!(url, "Serving request from cache");
                return Ok(value);
            }
        }

        let dedupe = options.dedupe;
        let dispatch = self.dispatch(key.clone(), url, options);
        if !dedupe {
            return dispatch.run().await;
        }

        let (shared, leader) = {
            let mut inflight = self.inflight.lock();
            match inflight.get(&key) {
                Some(existing) => {
                    debug!(url, "Joining in-flight request");
                    (existing.clone(), false)
                }
                None => {
                    let table = Arc::clone(&self.inflight);
                    let owned_key = key.clone();
                    let shared = async move {
                        let result = dispatch.run().await;
                        // Cached before removal so late arrivals hit the cache
                        table.lock().remove(&owned_key);
                        result
                    }
                    .boxed()
                    .shared();
                    inflight.insert(key, shared.clone());
                    (shared, true)
                }
            }
        };

        if leader {
            // Completes and unregisters even if every caller stops waiting
            tokio::spawn(shared.clone());
        }
        shared.await
    }

    /// [`optimized_fetch`](Self::optimized_fetch), deserialized into `T`.
    pub async fn optimized_fetch_as<T: DeserializeOwned>(
        &self,
        url: &str,
        options: FetchOptions,
    ) -> Result<T, FetchError> {
        let value = self.optimized_fetch(url, options).await?;
        serde_json::from_value(value).map_err(|e| FetchError::Decode {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }

    // == Batch Requests ==
    /// Runs `requests` in sequential chunks of `batch_size`, each chunk
    /// concurrently. Outcomes are returned in input order; one failure does
    /// not affect the others. A `batch_size` of zero is treated as one.
    pub async fn batch_requests(&self, requests: Vec<BatchRequest>, batch_size: usize) -> Vec<BatchOutcome> {
        let batch_size = batch_size.max(1);
        let mut outcomes = Vec::with_capacity(requests.len());

        for chunk in requests.chunks(batch_size) {
            let fetches = chunk
                .iter()
                .map(|request| self.optimized_fetch(&request.url, request.options.clone()));
            outcomes.extend(join_all(fetches).await);
        }

        let failed = outcomes.iter().filter(|o| o.is_err()).count();
        if failed > 0 {
            debug!(total = outcomes.len(), failed, "Batch finished with failures");
        }
        outcomes
    }

    fn dispatch(&self, key: String, url: &str, options: FetchOptions) -> Dispatch {
        let ttl = options.ttl.unwrap_or_else(|| self.routes.ttl_for(url));
        Dispatch {
            key,
            request: HttpRequest {
                method: options.method,
                url: url.to_string(),
                headers: options.headers,
                body: options.body,
            },
            ttl,
            store: !options.bypass_cache,
            cache: self.cache.clone(),
            transport: Arc::clone(&self.transport),
            timeout: self.timeout,
        }
    }
}
