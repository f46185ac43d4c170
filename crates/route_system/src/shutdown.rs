//! Shutdown coordination for graceful gateway shutdown.
//!
//! The HTTP and WebSocket listeners both watch the same [`ShutdownState`]:
//! once shutdown is initiated they stop accepting connections, and once
//! in-flight requests have drained the process may exit.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Shared shutdown state for coordinating graceful shutdown across listeners.
#[derive(Debug, Clone)]
pub struct ShutdownState {
    /// Flag indicating shutdown has been initiated - no new connections are accepted
    shutdown_initiated: Arc<AtomicBool>,
    /// Flag indicating in-flight work has drained and final shutdown can begin
    shutdown_complete: Arc<AtomicBool>,
    /// Requests and socket events currently being handled
    in_flight: Arc<AtomicUsize>,
}

/// Marks one unit of in-flight work until dropped.
#[derive(Debug)]
pub struct InFlightGuard {
    counter: Arc<AtomicUsize>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::AcqRel);
    }
}

impl ShutdownState {
    /// Creates a new shutdown state with both flags set to false.
    pub fn new() -> Self {
        Self {
            shutdown_initiated: Arc::new(AtomicBool::new(false)),
            shutdown_complete: Arc::new(AtomicBool::new(false)),
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Returns true if shutdown has been initiated.
    pub fn is_shutdown_initiated(&self) -> bool {
        self.shutdown_initiated.load(Ordering::Acquire)
    }

    /// Returns true if shutdown is complete and final cleanup can begin.
    pub fn is_shutdown_complete(&self) -> bool {
        self.shutdown_complete.load(Ordering::Acquire)
    }

    /// Initiates shutdown - listeners stop accepting new connections.
    pub fn initiate_shutdown(&self) {
        self.shutdown_initiated.store(true, Ordering::Release);
        info!("🛑 Shutdown initiated - no new connections will be accepted");
    }

    /// Marks shutdown as complete.
    pub fn complete_shutdown(&self) {
        self.shutdown_complete.store(true, Ordering::Release);
        info!("✅ All in-flight work drained - ready for final cleanup");
    }

    /// Tracks one request or event until the returned guard is dropped.
    pub fn track(&self) -> InFlightGuard {
        self.in_flight.fetch_add(1, Ordering::AcqRel);
        InFlightGuard {
            counter: self.in_flight.clone(),
        }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Waits until nothing is in flight or `timeout` elapses. Returns true if
    /// everything drained.
    pub async fn wait_for_drain(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while self.in_flight() > 0 {
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        true
    }
}

impl Default for ShutdownState {
    fn default() -> Self {
        Self::new()
    }
}
