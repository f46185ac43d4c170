//! Connection manager for tracking socket connections and rooms.
//!
//! This module provides the central management system for all socket
//! connections: it assigns socket ids, tracks room membership per namespace
//! and delivers outbound frames. It is the [`SocketEmitter`] the namespace
//! dispatcher emits through.

use super::client::ClientConnection;
use crate::messaging::ServerFrame;
use async_trait::async_trait;
use route_system::{RoomId, RouteError, SocketEmitter, SocketId};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, trace};

/// Frame queued for one connection's outgoing task.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundMessage {
    /// Encoded server frame
    Text(String),
    /// Close the connection with an optional reason
    Close(Option<String>),
}

/// namespace -> room -> members
type RoomTable = HashMap<String, HashMap<RoomId, HashSet<SocketId>>>;

/// Central manager for all socket connections.
///
/// # Architecture
///
/// * Uses `RwLock<HashMap>` for thread-safe connection and room storage
/// * Rooms are scoped to a namespace, so `lobby` on `/chat` and `lobby` on
///   `/game` are unrelated
/// * Every connection is a member of the room named by its own socket id
/// * Provides a broadcast channel each connection's outgoing task filters
#[derive(Debug)]
pub struct ConnectionManager {
    /// Map of socket id to connection information
    connections: Arc<RwLock<HashMap<SocketId, ClientConnection>>>,

    /// Room membership per namespace
    rooms: Arc<RwLock<RoomTable>>,

    /// Live connection count, readable without locking
    active: AtomicUsize,

    /// Broadcast sender for outgoing messages to specific connections
    sender: broadcast::Sender<(SocketId, OutboundMessage)>,
}

/// Outbound frames buffered per connection before a slow reader lags
pub const DEFAULT_OUTBOUND_BUFFER: usize = 1000;

impl ConnectionManager {
    /// Creates a new connection manager.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_OUTBOUND_BUFFER)
    }

    /// Creates a connection manager whose outbound channel holds `capacity`
    /// frames. A connection that falls further behind skips frames.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            connections: Arc::new(RwLock::new(HashMap::new())),
            rooms: Arc::new(RwLock::new(HashMap::new())),
            active: AtomicUsize::new(0),
            sender,
        }
    }

    /// Adds a new connection on `namespace` and returns its socket id.
    ///
    /// The connection joins its own room immediately.
    pub async fn add_connection(&self, namespace: &str, remote_addr: SocketAddr) -> SocketId {
        let socket_id = SocketId::new();
        let connection = ClientConnection::new(socket_id, namespace, remote_addr);

        self.rooms
            .write()
            .await
            .entry(namespace.to_string())
            .or_default()
            .entry(socket_id.room())
            .or_default()
            .insert(socket_id);
        self.connections.write().await.insert(socket_id, connection);
        self.active.fetch_add(1, Ordering::AcqRel);

        info!("🔗 Socket {} connected to '{}' from {}", socket_id, namespace, remote_addr);
        socket_id
    }

    /// Removes a connection and drops it from every room it joined.
    pub async fn remove_connection(&self, socket_id: SocketId) {
        let Some(connection) = self.connections.write().await.remove(&socket_id) else {
            return;
        };
        self.active.fetch_sub(1, Ordering::AcqRel);

        let mut rooms = self.rooms.write().await;
        if let Some(namespace_rooms) = rooms.get_mut(&connection.namespace) {
            for room in &connection.rooms {
                if let Some(members) = namespace_rooms.get_mut(room) {
                    members.remove(&socket_id);
                    if members.is_empty() {
                        namespace_rooms.remove(room);
                    }
                }
            }
            if namespace_rooms.is_empty() {
                rooms.remove(&connection.namespace);
            }
        }

        info!(
            "❌ Socket {} from {} left '{}' after {:?}",
            socket_id,
            connection.remote_addr,
            connection.namespace,
            connection.connection_duration()
        );
    }

    /// Number of live connections across all namespaces.
    pub fn connection_count(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// Namespace a connection was opened on.
    pub async fn namespace_of(&self, socket_id: SocketId) -> Option<String> {
        self.connections
            .read()
            .await
            .get(&socket_id)
            .map(|connection| connection.namespace.clone())
    }

    /// Rooms a connection belongs to, sorted.
    pub async fn rooms_of(&self, socket_id: SocketId) -> Vec<RoomId> {
        let connections = self.connections.read().await;
        let mut rooms: Vec<RoomId> = connections
            .get(&socket_id)
            .map(|connection| connection.rooms.iter().cloned().collect())
            .unwrap_or_default();
        rooms.sort();
        rooms
    }

    /// Members of a room within a namespace.
    pub async fn room_members(&self, namespace: &str, room: &str) -> Vec<SocketId> {
        self.rooms
            .read()
            .await
            .get(namespace)
            .and_then(|rooms| rooms.get(room))
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Subscribes to outbound messages. Each connection keeps the ones
    /// addressed to it.
    pub fn subscribe(&self) -> broadcast::Receiver<(SocketId, OutboundMessage)> {
        self.sender.subscribe()
    }

    /// Queues a message for delivery to one connection.
    pub fn send_to_connection(&self, socket_id: SocketId, message: OutboundMessage) {
        if self.sender.send((socket_id, message)).is_err() {
            debug!("No outgoing task is listening, dropped message for socket {}", socket_id);
        }
    }

    /// Closes a connection with a close frame. The connection's own task
    /// removes it once the socket is gone.
    pub async fn kick_connection(&self, socket_id: SocketId, reason: Option<String>) -> Result<(), RouteError> {
        if !self.connections.read().await.contains_key(&socket_id) {
            return Err(RouteError::NotFound(format!("socket {socket_id} is not connected")));
        }
        self.send_to_connection(socket_id, OutboundMessage::Close(reason));
        Ok(())
    }

    /// Asks every connection to close. Returns how many were asked.
    pub async fn close_all(&self, reason: &str) -> usize {
        let ids: Vec<SocketId> = self.connections.read().await.keys().copied().collect();
        for socket_id in &ids {
            self.send_to_connection(*socket_id, OutboundMessage::Close(Some(reason.to_string())));
        }
        ids.len()
    }

    fn queue_frame(&self, targets: impl IntoIterator<Item = SocketId>, event: &str, data: &[Value]) -> Result<usize, RouteError> {
        let text = ServerFrame::encode(event, data)?;
        let mut delivered = 0;
        for socket_id in targets {
            self.send_to_connection(socket_id, OutboundMessage::Text(text.clone()));
            delivered += 1;
        }
        Ok(delivered)
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SocketEmitter for ConnectionManager {
    async fn emit_to_socket(
        &self,
        namespace: &str,
        socket_id: SocketId,
        event: &str,
        data: &[Value],
    ) -> Result<(), RouteError> {
        if !self.connections.read().await.contains_key(&socket_id) {
            debug!("Dropping '{}' for socket {} on '{}': gone", event, socket_id, namespace);
            return Ok(());
        }
        self.queue_frame([socket_id], event, data)?;
        trace!("📤 '{}' -> socket {}", event, socket_id);
        Ok(())
    }

    async fn emit_to_rooms(
        &self,
        namespace: &str,
        rooms: &[RoomId],
        except: SocketId,
        event: &str,
        data: &[Value],
    ) -> Result<(), RouteError> {
        let targets: HashSet<SocketId> = {
            let table = self.rooms.read().await;
            match table.get(namespace) {
                Some(namespace_rooms) => rooms
                    .iter()
                    .filter_map(|room| namespace_rooms.get(room))
                    .flatten()
                    .copied()
                    .filter(|member| *member != except)
                    .collect(),
                None => HashSet::new(),
            }
        };

        let delivered = self.queue_frame(targets, event, data)?;
        trace!("📤 '{}' -> {:?} on '{}' ({} sockets)", event, rooms, namespace, delivered);
        Ok(())
    }

    async fn join_rooms(&self, namespace: &str, socket_id: SocketId, rooms: &[RoomId]) -> Result<(), RouteError> {
        let mut connections = self.connections.write().await;
        let connection = connections
            .get_mut(&socket_id)
            .ok_or_else(|| RouteError::NotFound(format!("socket {socket_id} is not connected")))?;
        if connection.namespace != namespace {
            return Err(RouteError::internal(format!(
                "socket {} belongs to '{}', not '{}'",
                socket_id, connection.namespace, namespace
            )));
        }

        let mut table = self.rooms.write().await;
        let namespace_rooms = table.entry(namespace.to_string()).or_default();
        for room in rooms {
            namespace_rooms.entry(room.clone()).or_default().insert(socket_id);
            connection.rooms.insert(room.clone());
        }
        debug!("🚪 Socket {} joined {:?} on '{}'", socket_id, rooms, namespace);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn addr() -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 40000))
    }

    fn drain(
        receiver: &mut broadcast::Receiver<(SocketId, OutboundMessage)>,
    ) -> Vec<(SocketId, OutboundMessage)> {
        let mut out = Vec::new();
        while let Ok(message) = receiver.try_recv() {
            out.push(message);
        }
        out
    }

    #[tokio::test]
    async fn test_outbound_capacity_is_configurable() {
        let small = ConnectionManager::with_capacity(2);
        let mut receiver = small.subscribe();
        let socket_id = SocketId::new();
        for n in 0..3 {
            small.send_to_connection(socket_id, OutboundMessage::Text(n.to_string()));
        }
        assert!(matches!(
            receiver.try_recv(),
            Err(broadcast::error::TryRecvError::Lagged(1))
        ));

        let roomy = ConnectionManager::with_capacity(16);
        let mut receiver = roomy.subscribe();
        for n in 0..3 {
            roomy.send_to_connection(socket_id, OutboundMessage::Text(n.to_string()));
        }
        assert_eq!(drain(&mut receiver).len(), 3);
    }

    #[tokio::test]
    async fn test_connection_joins_own_room() {
        let manager = ConnectionManager::new();
        let socket_id = manager.add_connection("/chat", addr()).await;

        assert_eq!(manager.connection_count(), 1);
        assert_eq!(manager.rooms_of(socket_id).await, vec![socket_id.room()]);
        assert_eq!(manager.room_members("/chat", &socket_id.room()).await, vec![socket_id]);
        assert_eq!(manager.namespace_of(socket_id).await.as_deref(), Some("/chat"));
    }

    #[tokio::test]
    async fn test_emit_to_socket() {
        let manager = ConnectionManager::new();
        let mut receiver = manager.subscribe();
        let socket_id = manager.add_connection("/chat", addr()).await;

        manager.emit_to_socket("/chat", socket_id, "said", &[json!("hi")]).await.unwrap();

        let queued = drain(&mut receiver);
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].0, socket_id);
        assert_eq!(
            queued[0].1,
            OutboundMessage::Text(r#"{"event":"said","data":["hi"]}"#.to_string())
        );
    }

    #[tokio::test]
    async fn test_rooms_exclude_origin_and_other_namespaces() {
        let manager = ConnectionManager::new();
        let mut receiver = manager.subscribe();
        let origin = manager.add_connection("/chat", addr()).await;
        let peer = manager.add_connection("/chat", addr()).await;
        let elsewhere = manager.add_connection("/game", addr()).await;

        let room = vec!["room1".to_string()];
        manager.join_rooms("/chat", origin, &room).await.unwrap();
        manager.join_rooms("/chat", peer, &room).await.unwrap();
        manager.join_rooms("/game", elsewhere, &room).await.unwrap();

        manager
            .emit_to_rooms("/chat", &room, origin, "x", &[json!(1)])
            .await
            .unwrap();

        let targets: Vec<SocketId> = drain(&mut receiver).into_iter().map(|(id, _)| id).collect();
        assert_eq!(targets, vec![peer]);
    }

    #[tokio::test]
    async fn test_receivers_may_name_sockets() {
        let manager = ConnectionManager::new();
        let mut receiver = manager.subscribe();
        let origin = manager.add_connection("/chat", addr()).await;
        let peer = manager.add_connection("/chat", addr()).await;

        manager
            .emit_to_rooms("/chat", &[peer.room(), origin.room()], origin, "dm", &[])
            .await
            .unwrap();

        let targets: Vec<SocketId> = drain(&mut receiver).into_iter().map(|(id, _)| id).collect();
        assert_eq!(targets, vec![peer]);
    }

    #[tokio::test]
    async fn test_remove_connection_cleans_rooms() {
        let manager = ConnectionManager::new();
        let socket_id = manager.add_connection("/chat", addr()).await;
        manager
            .join_rooms("/chat", socket_id, &["lobby".to_string()])
            .await
            .unwrap();

        manager.remove_connection(socket_id).await;

        assert_eq!(manager.connection_count(), 0);
        assert!(manager.room_members("/chat", "lobby").await.is_empty());
        assert!(manager.rooms.read().await.is_empty());
        assert!(manager.join_rooms("/chat", socket_id, &[]).await.is_err());
    }

    #[tokio::test]
    async fn test_kick_and_close_all() {
        let manager = ConnectionManager::new();
        let mut receiver = manager.subscribe();
        let a = manager.add_connection("/chat", addr()).await;
        manager.add_connection("/chat", addr()).await;

        manager.kick_connection(a, Some("bye".into())).await.unwrap();
        assert_eq!(drain(&mut receiver), vec![(a, OutboundMessage::Close(Some("bye".into())))]);

        assert_eq!(manager.close_all("shutting down").await, 2);
        assert!(manager.kick_connection(SocketId::new(), None).await.is_err());
    }
}
