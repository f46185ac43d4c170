//! Core server implementation and connection handling.
//!
//! This module contains the main gateway server structure and the logic
//! for handling socket connections and server lifecycle management.

pub mod core;
pub mod handlers;

pub use core::GatewayServer;
