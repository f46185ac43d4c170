//! Routing of inbound socket frames to the namespace dispatcher.

use crate::config::SecurityConfig;
use crate::messaging::ClientFrame;
use crate::security::{validate_event_name, validate_json_message, SecurityError};
use route_system::{ShutdownState, SocketDispatcher, SocketId};
use std::sync::Arc;
use tracing::trace;

/// Validates a raw client frame and hands it to the namespace handler.
///
/// The handler runs on its own task, so this returns as soon as the frame
/// has been accepted. Frames that fail validation are dropped and the error
/// is returned for logging; the connection stays open.
pub fn route_client_message(
    raw: &[u8],
    namespace: &str,
    socket_id: SocketId,
    dispatcher: &Arc<SocketDispatcher>,
    security: &SecurityConfig,
    shutdown_state: &ShutdownState,
) -> Result<(), SecurityError> {
    let value = validate_json_message(raw, security)?;
    let frame: ClientFrame =
        serde_json::from_value(value).map_err(|e| SecurityError::InvalidMessageFormat(e.to_string()))?;
    validate_event_name(&frame.event)?;

    trace!("📨 Frame '{}' from socket {} on '{}'", frame.event, socket_id, namespace);
    dispatcher.spawn_event(
        namespace.to_string(),
        socket_id,
        frame.event,
        frame.args,
        Some(shutdown_state.track()),
    );
    Ok(())
}
