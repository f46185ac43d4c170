//! Frame handling for client-server socket communication.
//!
//! This module provides the infrastructure for parsing inbound frames and
//! handing them to the namespace dispatcher, and for encoding outbound frames.

pub mod router;
pub mod types;

pub use router::route_client_message;
pub use types::{ClientFrame, ServerFrame};
