//! Utility functions and helper methods for the gateway server.
//!
//! This module provides convenient factory functions for creating server
//! instances with different configurations.

use crate::{config::ServerConfig, error::ServerError, server::GatewayServer};

/// Creates a new gateway server with default configuration.
///
/// # Example
///
/// ```rust
/// # fn main() -> Result<(), gateway_server::ServerError> {
/// use gateway_server::create_server;
///
/// let server = create_server()?;
/// assert_eq!(server.config().admin_prefix, "/admin");
/// # Ok(())
/// # }
/// ```
pub fn create_server() -> Result<GatewayServer, ServerError> {
    GatewayServer::new(ServerConfig::default())
}

/// Creates a new gateway server with custom configuration.
///
/// # Example
///
/// ```rust
/// # fn main() -> Result<(), gateway_server::ServerError> {
/// use gateway_server::{create_server_with_config, ServerConfig};
///
/// let config = ServerConfig {
///     mount_prefix: "/api".to_string(),
///     max_connections: 5000,
///     ..Default::default()
/// };
///
/// let server = create_server_with_config(config)?;
/// assert_eq!(server.router().mount_prefix(), "/api");
/// # Ok(())
/// # }
/// ```
pub fn create_server_with_config(config: ServerConfig) -> Result<GatewayServer, ServerError> {
    GatewayServer::new(config)
}
