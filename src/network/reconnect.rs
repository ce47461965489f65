//! Reconnect backoff for long-lived upstream connections.
//!
//! Pure state machine: callers drive the transitions and own the timers.

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};

const BACKOFF_FACTOR: f64 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Idle,
    Connecting,
    Connected,
    Reconnecting,
    Failed,
}

#[derive(Debug, Clone)]
pub struct ReconnectBackoff {
    base: Duration,
    max_attempts: u32,
    attempts: u32,
    state: ConnectionState,
}

impl Default for ReconnectBackoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(3), 10)
    }
}

impl ReconnectBackoff {
    pub fn new(base: Duration, max_attempts: u32) -> Self {
        Self {
            base,
            max_attempts,
            attempts: 0,
            state: ConnectionState::Idle,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Delay before reconnect attempt number `attempt` (zero-based).
    /// Saturates at `Duration::MAX` once the growth no longer fits.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = self.base.as_secs_f64() * BACKOFF_FACTOR.powi(exponent);
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }

    pub fn connecting(&mut self) {
        if self.state != ConnectionState::Failed {
            self.state = ConnectionState::Connecting;
        }
    }

    /// A successful connection resets the attempt counter.
    pub fn connected(&mut self) {
        self.state = ConnectionState::Connected;
        self.attempts = 0;
    }

    /// Records a lost or refused connection. Returns how long to wait before
    /// the next attempt, or `None` once the attempts are exhausted.
    pub fn disconnected(&mut self) -> Option<Duration> {
        if self.state == ConnectionState::Failed {
            return None;
        }
        if self.attempts >= self.max_attempts {
            warn!(attempts = self.attempts, "Max reconnection attempts reached");
            self.state = ConnectionState::Failed;
            return None;
        }

        let delay = self.delay_for(self.attempts);
        self.attempts += 1;
        self.state = ConnectionState::Reconnecting;
        debug!(attempt = self.attempts, delay_ms = delay.as_millis() as u64, "Scheduling reconnect");
        Some(delay)
    }

    /// Deliberate disconnect: back to idle with a fresh budget.
    pub fn reset(&mut self) {
        self.state = ConnectionState::Idle;
        self.attempts = 0;
    }
}
