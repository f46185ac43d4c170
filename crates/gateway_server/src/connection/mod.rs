//! Connection management for socket clients.
//!
//! This module handles the lifecycle of socket connections, including
//! connection tracking, per-namespace room membership, and outbound delivery.

pub mod client;
pub mod manager;

pub use client::ClientConnection;
pub use manager::{ConnectionManager, OutboundMessage, DEFAULT_OUTBOUND_BUFFER};
