//! Expiry Sweeper
//!
//! Background task that periodically removes expired cache entries,
//! independent of read/write traffic.

use std::time::Duration;

use tracing::{debug, info};

use super::TaskHandle;
use crate::cache::CacheManager;

/// Spawns a background task that purges expired entries every `interval`.
///
/// The task sleeps first, so nothing is swept at startup (restored entries
/// were already filtered on load). Persistence is only scheduled by the
/// purge when something was actually removed.
///
/// # Example
/// ```ignore
/// let cache = CacheManager::new(CacheConfig::default()).await?;
/// let sweeper = spawn_sweeper(cache.clone(), Duration::from_secs(300));
/// // Later, during shutdown:
/// sweeper.stop();
/// ```
pub fn spawn_sweeper(cache: CacheManager, interval: Duration) -> TaskHandle {
    let handle = tokio::spawn(async move {
        info!(interval_secs = interval.as_secs(), "Starting expiry sweeper");

        loop {
            tokio::time::sleep(interval).await;

            let removed = cache.purge_expired().await;
            if removed > 0 {
                info!("Expiry sweep: removed {} expired entries", removed);
            } else {
                debug!("Expiry sweep: no expired entries found");
            }
        }
    });

    TaskHandle::new("expiry-sweeper", handle)
}
