//! Background Tasks Module
//!
//! Contains the tasks that mutate or report on the cache without a caller
//! driving them.
//!
//! # Tasks
//! - Expiry sweeper: removes expired entries at a fixed cadence
//! - Persist writer: debounced persistence writes
//! - Metrics reporter: periodic metrics log line

mod metrics;
mod persist;
mod sweeper;

use tokio::task::JoinHandle;
use tracing::debug;

pub use metrics::spawn_metrics_reporter;
pub(crate) use persist::spawn_persist_writer;
pub use sweeper::spawn_sweeper;

// == Task Handle ==
/// Owns a spawned background task and aborts it when stopped or dropped,
/// so tearing down a cache never leaves timers running.
#[derive(Debug)]
pub struct TaskHandle {
    name: &'static str,
    handle: JoinHandle<()>,
}

impl TaskHandle {
    pub(crate) fn new(name: &'static str, handle: JoinHandle<()>) -> Self {
        Self { name, handle }
    }

    pub fn stop(&self) {
        if !self.handle.is_finished() {
            debug!(task = self.name, "Stopping background task");
        }
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for TaskHandle {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
