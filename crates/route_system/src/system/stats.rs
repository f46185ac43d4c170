/// Statistics tracking for the router core
use serde::{Deserialize, Serialize};

/// Router statistics for monitoring
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct RouterStats {
    /// Total number of registered HTTP routes
    pub total_routes: usize,
    /// Total number of registered socket namespaces
    pub total_namespaces: usize,
    /// Number of modules with a live client
    pub connected_modules: usize,
    /// HTTP requests dispatched since start
    pub requests_dispatched: u64,
    /// HTTP requests rejected by validation
    pub requests_rejected: u64,
    /// HTTP requests that failed inside a module or in transit
    pub requests_failed: u64,
    /// Socket events handed to namespace handlers
    pub socket_events: u64,
    /// Socket events whose handler failed
    pub socket_failures: u64,
}
