/// Socket namespace dispatcher
use crate::descriptor::{SocketDescriptor, SocketHandler, SocketRequest, SocketResponse};
use crate::error::RouteError;
use crate::shutdown::InFlightGuard;
use crate::types::{RoomId, SocketId};
use async_trait::async_trait;
use compact_str::CompactString;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Delivery side of the real-time surface.
///
/// Implemented by the server's connection manager. Rooms are scoped to a
/// namespace, and every connection is a member of the room named by its own
/// socket id.
#[async_trait]
pub trait SocketEmitter: Send + Sync + std::fmt::Debug + 'static {
    /// Emit an event to a single connection
    async fn emit_to_socket(
        &self,
        namespace: &str,
        socket_id: SocketId,
        event: &str,
        data: &[Value],
    ) -> Result<(), RouteError>;

    /// Emit an event to every member of `rooms`, skipping `except`
    async fn emit_to_rooms(
        &self,
        namespace: &str,
        rooms: &[RoomId],
        except: SocketId,
        event: &str,
        data: &[Value],
    ) -> Result<(), RouteError>;

    /// Add a connection to rooms
    async fn join_rooms(&self, namespace: &str, socket_id: SocketId, rooms: &[RoomId]) -> Result<(), RouteError>;
}

/// Owns the namespace table and binds connection events to descriptors.
///
/// Each namespace maps to exactly one handler. The first descriptor
/// registered for a namespace wins and later registrations are ignored.
#[derive(Debug)]
pub struct SocketDispatcher {
    namespaces: DashMap<CompactString, SocketDescriptor>,
    emitter: Arc<dyn SocketEmitter>,
    events_dispatched: AtomicU64,
    handler_failures: AtomicU64,
    /// Handler deadline in milliseconds, 0 for none
    rpc_timeout_ms: AtomicU64,
}

impl SocketDispatcher {
    pub fn new(emitter: Arc<dyn SocketEmitter>) -> Self {
        Self {
            namespaces: DashMap::new(),
            emitter,
            events_dispatched: AtomicU64::new(0),
            handler_failures: AtomicU64::new(0),
            rpc_timeout_ms: AtomicU64::new(0),
        }
    }

    /// Bound every handler call by `timeout`. Zero disables the deadline.
    pub fn set_rpc_timeout(&self, timeout: Duration) {
        let millis = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self.rpc_timeout_ms.store(millis, Ordering::Relaxed);
    }

    fn rpc_timeout(&self) -> Option<Duration> {
        match self.rpc_timeout_ms.load(Ordering::Relaxed) {
            0 => None,
            millis => Some(Duration::from_millis(millis)),
        }
    }

    /// Registers a namespace. Returns `false` if it was already registered.
    pub fn register_namespace(&self, descriptor: SocketDescriptor) -> bool {
        let namespace = CompactString::new(descriptor.namespace());
        match self.namespaces.entry(namespace) {
            dashmap::mapref::entry::Entry::Occupied(existing) => {
                debug!(
                    "🔁 Namespace '{}' already served by '{}', ignoring '{}'",
                    existing.key(),
                    existing.get().handler.handler_name(),
                    descriptor.handler.handler_name()
                );
                false
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                info!(
                    "🔌 Registered socket namespace '{}' -> {}",
                    slot.key(),
                    descriptor.handler.handler_name()
                );
                slot.insert(descriptor);
                true
            }
        }
    }

    pub fn has_namespace(&self, namespace: &str) -> bool {
        self.namespaces.contains_key(namespace)
    }

    pub fn namespaces(&self) -> Vec<String> {
        let mut names: Vec<String> = self.namespaces.iter().map(|entry| entry.key().to_string()).collect();
        names.sort();
        names
    }

    pub fn namespace_count(&self) -> usize {
        self.namespaces.len()
    }

    fn handler_for(&self, namespace: &str) -> Result<Arc<dyn SocketHandler>, RouteError> {
        self.namespaces
            .get(namespace)
            .map(|entry| entry.handler.clone())
            .ok_or_else(|| RouteError::NotFound(format!("socket namespace '{namespace}' is not registered")))
    }

    /// Runs the connect hook for a new connection.
    ///
    /// Handler failures are logged and never reach the client.
    pub async fn handle_connect(&self, namespace: &str, socket_id: SocketId) -> Result<(), RouteError> {
        let handler = self.handler_for(namespace)?;
        debug!("🔗 Socket {} connected to '{}'", socket_id, namespace);
        if let Err(e) = self.run(namespace, handler, SocketRequest::connect(socket_id)).await {
            warn!("⚠️ Connect hook for '{}' failed for socket {}: {}", namespace, socket_id, e);
        }
        Ok(())
    }

    /// Fire-and-forget variant of [`SocketDispatcher::handle_connect`].
    ///
    /// Events from the connection are served while the hook is still running.
    pub fn spawn_connect(self: &Arc<Self>, namespace: String, socket_id: SocketId, in_flight: Option<InFlightGuard>) {
        let dispatcher = Arc::clone(self);
        tokio::spawn(async move {
            let _in_flight = in_flight;
            if let Err(e) = dispatcher.handle_connect(&namespace, socket_id).await {
                debug!("Dropped connect hook: {}", e);
            }
        });
    }

    /// Forwards a named event from a connection to its namespace handler.
    ///
    /// Handler failures are logged and never reach the client.
    pub async fn handle_event(
        &self,
        namespace: &str,
        socket_id: SocketId,
        event: String,
        params: Vec<Value>,
    ) -> Result<(), RouteError> {
        let handler = self.handler_for(namespace)?;
        trace!("📨 Socket {} sent '{}' on '{}'", socket_id, event, namespace);
        let request = SocketRequest::event(event, socket_id, params);
        let event_name = request.event.clone();
        if let Err(e) = self.run(namespace, handler, request).await {
            warn!(
                "❌ Handler for '{}' failed on event '{}' from socket {}: {}",
                namespace, event_name, socket_id, e
            );
        }
        Ok(())
    }

    /// Fire-and-forget variant of [`SocketDispatcher::handle_event`].
    ///
    /// `in_flight` is held until the handler and its emissions are done.
    pub fn spawn_event(
        self: &Arc<Self>,
        namespace: String,
        socket_id: SocketId,
        event: String,
        params: Vec<Value>,
        in_flight: Option<InFlightGuard>,
    ) {
        let dispatcher = Arc::clone(self);
        tokio::spawn(async move {
            let _in_flight = in_flight;
            if let Err(e) = dispatcher.handle_event(&namespace, socket_id, event, params).await {
                debug!("Dropped socket event: {}", e);
            }
        });
    }

    async fn run(
        &self,
        namespace: &str,
        handler: Arc<dyn SocketHandler>,
        request: SocketRequest,
    ) -> Result<(), RouteError> {
        self.events_dispatched.fetch_add(1, Ordering::Relaxed);
        let socket_id = request.socket_id;
        let call = handler.execute_request(request);
        let outcome = match self.rpc_timeout() {
            Some(timeout) => tokio::time::timeout(timeout, call).await.unwrap_or_else(|_| {
                Err(RouteError::internal(format!(
                    "handler '{}' did not answer within {}ms",
                    handler.handler_name(),
                    timeout.as_millis()
                )))
            }),
            None => call.await,
        };
        let response = outcome.inspect_err(|_| {
            self.handler_failures.fetch_add(1, Ordering::Relaxed);
        })?;
        match response {
            Some(response) => self.apply_response(namespace, socket_id, response).await,
            None => Ok(()),
        }
    }

    /// Carries out what a handler asked for on behalf of `origin`.
    pub async fn apply_response(
        &self,
        namespace: &str,
        origin: SocketId,
        response: SocketResponse,
    ) -> Result<(), RouteError> {
        match response {
            SocketResponse::Events(events) => {
                // One failed emission does not cancel the rest
                for event in events {
                    let emitted = match &event.receivers {
                        None => {
                            self.emitter
                                .emit_to_socket(namespace, origin, &event.event, &event.data)
                                .await
                        }
                        Some(rooms) => {
                            self.emitter
                                .emit_to_rooms(namespace, rooms, origin, &event.event, &event.data)
                                .await
                        }
                    };
                    if let Err(e) = emitted {
                        warn!("⚠️ Failed to emit '{}' on '{}' for socket {}: {}", event.event, namespace, origin, e);
                    }
                }
                Ok(())
            }
            SocketResponse::JoinRoom(join) => self.emitter.join_rooms(namespace, origin, &join.rooms).await,
        }
    }

    /// (events dispatched, handler failures)
    pub fn stats(&self) -> (u64, u64) {
        (
            self.events_dispatched.load(Ordering::Relaxed),
            self.handler_failures.load(Ordering::Relaxed),
        )
    }
}
