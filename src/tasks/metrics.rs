//! Metrics reporter: logs the cache counters at a fixed cadence.

use std::time::Duration;

use tracing::info;

use super::TaskHandle;
use crate::cache::CacheManager;

pub fn spawn_metrics_reporter(cache: CacheManager, interval: Duration) -> TaskHandle {
    let handle = tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;

            let metrics = cache.metrics();
            info!(
                hits = metrics.hits,
                misses = metrics.misses,
                evictions = metrics.evictions,
                expirations = metrics.expirations,
                size = metrics.size,
                resident_bytes = metrics.resident_bytes,
                "Cache metrics: hit rate {:.2}%",
                metrics.hit_rate * 100.0
            );
        }
    });

    TaskHandle::new("metrics-reporter", handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;

    #[tokio::test(start_paused = true)]
    async fn test_reporter_runs_until_dropped() {
        let config = CacheConfig {
            enable_persistence: false,
            ..CacheConfig::default()
        };
        let cache = CacheManager::new(config).await.unwrap();

        let reporter = spawn_metrics_reporter(cache, Duration::from_secs(60));
        tokio::time::sleep(Duration::from_secs(130)).await;
        assert!(!reporter.is_finished());

        drop(reporter);
        tokio::task::yield_now().await;
    }
}
