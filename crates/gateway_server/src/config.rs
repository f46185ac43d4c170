//! Server configuration types and defaults.
//!
//! This module contains the server configuration structure and default values
//! used to initialize and customize the gateway's HTTP and socket listeners.

use crate::connection::DEFAULT_OUTBOUND_BUFFER;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Configuration structure for the gateway server.
///
/// Contains all necessary parameters to configure server behavior including
/// listener addresses, route prefixes, module timeouts and connection limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the HTTP surface (routes and admin endpoints) binds to
    pub http_bind_address: SocketAddr,

    /// Address the WebSocket surface binds to
    pub socket_bind_address: SocketAddr,

    /// Prefix module routes are mounted under, e.g. `/api`
    pub mount_prefix: String,

    /// Prefix of the admin endpoints, e.g. `/admin`
    pub admin_prefix: String,

    /// Maximum number of concurrent socket connections allowed
    pub max_connections: usize,

    /// Module connection timeout in seconds
    pub connection_timeout: u64,

    /// Deadline for a module call in milliseconds (0 to disable)
    pub rpc_timeout_ms: u64,

    /// Bearer token the admin endpoints require. `None` closes them
    #[serde(default)]
    pub admin_token: Option<String>,

    /// Outbound frames buffered per connection before a slow reader skips frames
    #[serde(default = "default_outbound_buffer")]
    pub outbound_buffer: usize,

    /// Security configuration settings
    pub security: SecurityConfig,
}

/// Limits applied to inbound payloads
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum socket frame size in bytes
    pub max_message_size: usize,

    /// Maximum HTTP request body size in bytes
    pub max_body_size: usize,

    /// Maximum allowed nesting depth for JSON frames
    pub max_json_depth: usize,

    /// Maximum allowed string length in JSON frames
    pub max_string_length: usize,

    /// Maximum allowed array/object size in JSON frames
    pub max_collection_size: usize,
}

fn default_outbound_buffer() -> usize {
    DEFAULT_OUTBOUND_BUFFER
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_bind_address: SocketAddr::from(([127, 0, 0, 1], 3000)),
            socket_bind_address: SocketAddr::from(([127, 0, 0, 1], 3001)),
            mount_prefix: String::new(),
            admin_prefix: "/admin".to_string(),
            max_connections: 1000,
            connection_timeout: 10,
            rpc_timeout_ms: 0,
            admin_token: None,
            outbound_buffer: DEFAULT_OUTBOUND_BUFFER,
            security: SecurityConfig::default(),
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_message_size: 64 * 1024, // 64KB
            max_body_size: 2 * 1024 * 1024,
            max_json_depth: 16,
            max_string_length: 16 * 1024,
            max_collection_size: 1000,
        }
    }
}
