//! Connection handling logic for socket clients.
//!
//! This module manages the lifecycle of individual socket connections:
//! handshake and namespace selection, the connect hook, frame routing, and
//! cleanup.

use crate::{
    config::SecurityConfig,
    connection::{ConnectionManager, OutboundMessage},
    error::ServerError,
    messaging::route_client_message,
};
use futures_util::{SinkExt, StreamExt};
use route_system::{ShutdownState, SocketDispatcher};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::broadcast::error::RecvError;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::{accept_hdr_async, tungstenite::Message};
use tracing::{debug, error, trace, warn};

/// Everything a connection task needs from the server.
#[derive(Debug, Clone)]
pub struct ConnectionContext {
    pub connection_manager: Arc<ConnectionManager>,
    pub dispatcher: Arc<SocketDispatcher>,
    pub security: SecurityConfig,
    pub max_connections: usize,
    pub shutdown_state: ShutdownState,
}

fn reject(status: StatusCode, message: String) -> ErrorResponse {
    let mut response = ErrorResponse::new(Some(message));
    *response.status_mut() = status;
    response
}

/// Handles a single socket connection from handshake to cleanup.
///
/// # Connection Flow
///
/// 1. Perform the WebSocket handshake, taking the namespace from the request
///    path; unknown namespaces are refused with 404
/// 2. Register the connection with the connection manager
/// 3. Run the namespace's connect hook
/// 4. Start frame handling tasks (incoming and outgoing)
/// 5. Remove the connection when either side ends
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    context: ConnectionContext,
) -> Result<(), ServerError> {
    let ConnectionContext {
        connection_manager,
        dispatcher,
        security,
        max_connections,
        shutdown_state,
    } = context;

    let mut namespace = String::new();
    let select_namespace = |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        let path = request.uri().path();
        if !dispatcher.has_namespace(path) {
            return Err(reject(
                StatusCode::NOT_FOUND,
                format!("socket namespace '{path}' is not registered"),
            ));
        }
        if connection_manager.connection_count() >= max_connections {
            return Err(reject(
                StatusCode::SERVICE_UNAVAILABLE,
                "connection limit reached".to_string(),
            ));
        }
        namespace = path.to_string();
        Ok(response)
    };

    let ws_stream = accept_hdr_async(stream, select_namespace)
        .await
        .map_err(|e| ServerError::Network(format!("WebSocket handshake failed: {e}")))?;

    let (ws_sender, mut ws_receiver) = ws_stream.split();
    let ws_sender = Arc::new(tokio::sync::Mutex::new(ws_sender));

    // Subscribe before the connect hook so its replies are not missed
    let mut message_receiver = connection_manager.subscribe();
    let socket_id = connection_manager.add_connection(&namespace, addr).await;

    // The hook runs beside the read loop so a slow module cannot stall events
    dispatcher.spawn_connect(namespace.clone(), socket_id, Some(shutdown_state.track()));

    let ws_sender_incoming = ws_sender.clone();
    let ws_sender_outgoing = ws_sender.clone();

    // Incoming frame task - validates frames and hands them to the namespace
    let incoming_task = {
        let dispatcher = dispatcher.clone();
        let namespace = namespace.clone();

        async move {
            while let Some(msg) = ws_receiver.next().await {
                let routed = match msg {
                    Ok(Message::Text(text)) => route_client_message(
                        text.as_bytes(),
                        &namespace,
                        socket_id,
                        &dispatcher,
                        &security,
                        &shutdown_state,
                    ),
                    Ok(Message::Binary(data)) => route_client_message(
                        &data,
                        &namespace,
                        socket_id,
                        &dispatcher,
                        &security,
                        &shutdown_state,
                    ),
                    Ok(Message::Close(_)) => {
                        debug!("🔌 Socket {} requested close", socket_id);
                        break;
                    }
                    Ok(Message::Ping(data)) => {
                        let mut ws_sender = ws_sender_incoming.lock().await;
                        let _ = ws_sender.send(Message::Pong(data)).await;
                        Ok(())
                    }
                    Err(e) => {
                        error!("WebSocket error for socket {}: {}", socket_id, e);
                        break;
                    }
                    _ => Ok(()),
                };
                if let Err(e) = routed {
                    trace!("❌ Dropped frame from socket {}: {}", socket_id, e);
                }
            }
        }
    };

    // Outgoing frame task
    let outgoing_task = {
        let ws_sender = ws_sender_outgoing;
        async move {
            loop {
                let (target, message) = match message_receiver.recv().await {
                    Ok(queued) => queued,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("⚠️ Socket {} lagged, {} frame(s) skipped", socket_id, skipped);
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };
                if target != socket_id {
                    continue;
                }

                let mut ws_sender = ws_sender.lock().await;
                match message {
                    OutboundMessage::Text(text) => {
                        if let Err(e) = ws_sender.send(Message::Text(text.into())).await {
                            error!("Failed to send frame: {}", e);
                            break;
                        }
                    }
                    OutboundMessage::Close(reason) => {
                        let frame = CloseFrame {
                            code: CloseCode::Normal,
                            reason: reason.unwrap_or_else(|| "Closed by server".into()).into(),
                        };
                        let _ = ws_sender.send(Message::Close(Some(frame))).await;
                        break;
                    }
                }
            }
        }
    };

    // Run both tasks concurrently until one completes
    tokio::select! {
        _ = incoming_task => {},
        _ = outgoing_task => {},
    }

    connection_manager.remove_connection(socket_id).await;
    Ok(())
}
