//! # Gateway Server
//!
//! The network edge of the module gateway. This crate serves the routes and
//! socket namespaces that modules register at runtime; it contains no module
//! logic itself.
//!
//! ## Design Philosophy
//!
//! The server only provides infrastructure:
//!
//! * **HTTP surface** - axum listener whose fallback resolves every request
//!   against the live route table
//! * **Socket surface** - WebSocket listener where the handshake path selects
//!   the namespace and any event name is forwarded to its handler
//! * **Admin surface** - module registration and discovery endpoints
//! * **Connection management** - socket lifecycle, rooms and delivery
//!
//! ## Message Flow
//!
//! 1. A module registers a manifest through `POST <admin>/modules`
//! 2. HTTP requests under the mount prefix are matched, normalized,
//!    validated and forwarded to the owning module
//! 3. Socket clients connect to `ws://<socket addr><namespace>` and send
//!    `{"event": ..., "args": [...]}` frames
//! 4. The namespace handler answers with emissions or room joins, which the
//!    connection manager delivers as `{"event": ..., "data": [...]}` frames
//!
//! ## Error Handling
//!
//! The server uses structured error types ([`ServerError`]) to categorize failures:
//!
//! * **Network errors** - binding and handshake issues
//! * **Internal errors** - registry and dispatch problems
//!
//! HTTP failures leave as `{"code": <status>, "message": <text>}`. Socket
//! handler failures are logged and never reach the client.
//!
//! ## Thread Safety
//!
//! * Connection and room state uses `Arc<RwLock<HashMap>>`
//! * Route and namespace tables live in the shared [`route_system::RouterCore`]
//! * Every connection runs on its own task

// Re-export core types and functions for easy access
pub use config::{SecurityConfig, ServerConfig};
pub use connection::{ConnectionManager, OutboundMessage, DEFAULT_OUTBOUND_BUFFER};
pub use error::ServerError;
pub use http::{create_router, ApiError, HttpState};
pub use server::GatewayServer;
pub use utils::{create_server, create_server_with_config};

// Public module declarations
pub mod config;
pub mod connection;
pub mod error;
pub mod http;
pub mod messaging;
pub mod security;
pub mod server;
pub mod utils;

#[cfg(test)]
mod tests;
