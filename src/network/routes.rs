//! Per-route TTL defaults for cached responses.

use std::time::Duration;

/// Maps URL path prefixes to the TTL their responses are cached for.
/// The longest matching prefix wins.
#[derive(Debug, Clone)]
pub struct RouteTtlTable {
    routes: Vec<(String, Duration)>,
    fallback: Duration,
}

impl RouteTtlTable {
    pub fn new(fallback: Duration) -> Self {
        Self {
            routes: Vec::new(),
            fallback,
        }
    }

    pub fn with_route(mut self, prefix: impl Into<String>, ttl: Duration) -> Self {
        self.routes.push((prefix.into(), ttl));
        self
    }

    /// TTL for `url`; query strings and scheme/host are ignored.
    pub fn ttl_for(&self, url: &str) -> Duration {
        let path = path_of(url);
        self.routes
            .iter()
            .filter(|(prefix, _)| path.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, ttl)| *ttl)
            .unwrap_or(self.fallback)
    }
}

impl Default for RouteTtlTable {
    /// Dashboard API routes, tuned to how often each changes.
    fn default() -> Self {
        Self::new(Duration::from_secs(5 * 60))
            .with_route("/api/strategies", Duration::from_secs(5 * 60))
            .with_route("/api/data/available", Duration::from_secs(10 * 60))
            .with_route("/api/symbols", Duration::from_secs(30 * 60))
            .with_route("/api/backtest/history", Duration::from_secs(2 * 60))
            .with_route("/api/portfolio/performance", Duration::from_secs(30))
            .with_route("/api/market/status", Duration::from_secs(60))
            .with_route("/api/market/data", Duration::from_secs(15))
    }
}

fn path_of(url: &str) -> &str {
    let without_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
    let path = if url.contains("://") {
        without_scheme
            .find('/')
            .map_or("/", |idx| &without_scheme[idx..])
    } else {
        without_scheme
    };
    path.split(['?', '#']).next().unwrap_or(path)
}
