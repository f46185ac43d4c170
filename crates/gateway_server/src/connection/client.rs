//! Client connection representation.

use route_system::{RoomId, SocketId};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::time::SystemTime;

/// Represents an individual socket connection to a namespace.
#[derive(Debug)]
pub struct ClientConnection {
    pub socket_id: SocketId,

    /// Namespace the connection was opened on
    pub namespace: String,

    /// The remote network address of the client
    pub remote_addr: SocketAddr,

    /// When this connection was established
    pub connected_at: SystemTime,

    /// Rooms joined within the namespace, including the connection's own room
    pub rooms: HashSet<RoomId>,
}

impl ClientConnection {
    /// Creates a connection that is a member of its own room only.
    pub fn new(socket_id: SocketId, namespace: impl Into<String>, remote_addr: SocketAddr) -> Self {
        let mut rooms = HashSet::new();
        rooms.insert(socket_id.room());
        Self {
            socket_id,
            namespace: namespace.into(),
            remote_addr,
            connected_at: SystemTime::now(),
            rooms,
        }
    }

    /// Gets the duration since this connection was established.
    pub fn connection_duration(&self) -> std::time::Duration {
        self.connected_at.elapsed().unwrap_or_default()
    }
}
