//! Debounced persistence writer.
//!
//! Mutations send the longest delay they can tolerate; the writer flushes
//! the latest snapshot at the earliest requested deadline, so a burst of
//! writes costs one storage round-trip.

use std::sync::Weak;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::debug;

use crate::cache::manager::ManagerInner;

/// Spawns the writer. It exits once every cache handle has been dropped.
pub(crate) fn spawn_persist_writer(
    inner: Weak<ManagerInner>,
    mut requests: UnboundedReceiver<Duration>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(delay) = requests.recv().await {
            let mut deadline = Instant::now() + delay;
            let mut closed = false;

            loop {
                tokio::select! {
                    _ = sleep_until(deadline) => break,
                    next = requests.recv() => match next {
                        Some(delay) => deadline = deadline.min(Instant::now() + delay),
                        None => {
                            closed = true;
                            break;
                        }
                    },
                }
            }

            match inner.upgrade() {
                Some(inner) => inner.flush().await,
                None => break,
            }
            if closed {
                break;
            }
        }
        debug!("Persist writer stopped");
    })
}
