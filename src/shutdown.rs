//! Graceful shutdown coordination for the station server.
//!
//! Once draining starts, new requests are refused with `SHUTTING_DOWN` while
//! requests already inside a handler run to completion or until the drain
//! timeout elapses.

use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Notify;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ShutdownState {
    Running,
    Draining,
    Stopped,
}

impl ShutdownState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Running,
            1 => Self::Draining,
            _ => Self::Stopped,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownResult {
    Complete,
    Timeout { remaining: u32 },
}

/// Tracks in-flight requests and the running/draining/stopped transition.
#[derive(Clone)]
pub struct ShutdownCoordinator {
    state: Arc<AtomicU8>,
    in_flight: Arc<AtomicU32>,
    notify: Arc<Notify>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self {
            state: Arc::new(AtomicU8::new(ShutdownState::Running as u8)),
            in_flight: Arc::new(AtomicU32::new(0)),
            notify: Arc::new(Notify::new()),
        }
    }

    pub fn state(&self) -> ShutdownState {
        ShutdownState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn is_accepting(&self) -> bool {
        self.state() == ShutdownState::Running
    }

    /// Track an in-flight request. Returns `None` once draining has begun.
    pub fn track(&self) -> Option<ShutdownGuard> {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let guard = ShutdownGuard {
            counter: Arc::clone(&self.in_flight),
            notify: Arc::clone(&self.notify),
        };
        // Checked after the increment so a concurrent drain cannot miss us.
        if !self.is_accepting() {
            return None;
        }
        Some(guard)
    }

    pub fn in_flight_count(&self) -> u32 {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Stop accepting and wait for in-flight requests to finish.
    pub async fn initiate(&self, timeout: Duration) -> ShutdownResult {
        self.state.store(ShutdownState::Draining as u8, Ordering::SeqCst);
        tracing::info!(
            in_flight = self.in_flight_count(),
            timeout_secs = timeout.as_secs(),
            "draining in-flight requests"
        );

        let result = self.wait_for_drain(timeout).await;

        self.state.store(ShutdownState::Stopped as u8, Ordering::SeqCst);
        result
    }

    async fn wait_for_drain(&self, timeout: Duration) -> ShutdownResult {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            let notified = self.notify.notified();
            let count = self.in_flight_count();
            if count == 0 {
                return ShutdownResult::Complete;
            }

            let remaining_time = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining_time.is_zero() {
                return ShutdownResult::Timeout { remaining: count };
            }

            tokio::select! {
                _ = notified => continue,
                _ = tokio::time::sleep(remaining_time) => {
                    let final_count = self.in_flight_count();
                    if final_count == 0 {
                        return ShutdownResult::Complete;
                    }
                    return ShutdownResult::Timeout { remaining: final_count };
                }
            }
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard for in-flight request tracking.
pub struct ShutdownGuard {
    counter: Arc<AtomicU32>,
    notify: Arc<Notify>,
}

impl Drop for ShutdownGuard {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
        self.notify.notify_waiters();
    }
}
