//! Route and socket descriptors.
//!
//! A module describes everything it exposes through descriptors: one
//! [`RouteDescriptor`] per HTTP route and one [`SocketDescriptor`] per
//! real-time namespace. Descriptors are data only. The router never inspects
//! a module beyond what they declare.

use crate::error::RouteError;
use crate::schema::ParameterSchema;
use crate::types::{RoomId, RouteAction, SocketId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Debug;
use std::future::Future;
use std::sync::Arc;

/// Documentation-only description of what a route returns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReturnDefinition {
    pub name: String,
    #[serde(default)]
    pub fields: Value,
}

/// Description of one HTTP route owned by a module.
///
/// # Examples
///
/// ```rust
/// use route_system::{ParameterSchema, PrimitiveType, RouteAction, RouteDescriptor, TypeSpec};
///
/// let route = RouteDescriptor::new("/notifications/send", RouteAction::Post, "sendNotification")
///     .with_params(ParameterSchema::new().field("title", TypeSpec::required(PrimitiveType::String)))
///     .returns("SendNotification", serde_json::json!("String"));
/// assert_eq!(route.parameter_schema.len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteDescriptor {
    /// URL template, `:name` segments capture path parameters.
    pub path: String,
    pub action: RouteAction,
    /// Remote procedure invoked on the owning module.
    pub handler: String,
    #[serde(default)]
    pub parameter_schema: ParameterSchema,
    #[serde(default)]
    pub return_definition: ReturnDefinition,
}

impl RouteDescriptor {
    pub fn new(path: impl Into<String>, action: RouteAction, handler: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            action,
            handler: handler.into(),
            parameter_schema: ParameterSchema::new(),
            return_definition: ReturnDefinition::default(),
        }
    }

    pub fn with_params(mut self, schema: ParameterSchema) -> Self {
        self.parameter_schema = schema;
        self
    }

    pub fn returns(mut self, name: impl Into<String>, fields: Value) -> Self {
        self.return_definition = ReturnDefinition {
            name: name.into(),
            fields,
        };
        self
    }

    /// Checks the parts of a descriptor the schema decoder cannot.
    pub fn validate(&self) -> Result<(), RouteError> {
        if !self.path.starts_with('/') {
            return Err(RouteError::InvalidDescriptor(format!(
                "route path '{}' must start with '/'",
                self.path
            )));
        }
        if self.handler.trim().is_empty() {
            return Err(RouteError::InvalidDescriptor(format!(
                "route {} {} has no handler",
                self.action, self.path
            )));
        }
        for segment in self.path.split('/') {
            if segment == ":" {
                return Err(RouteError::InvalidDescriptor(format!(
                    "route path '{}' has an unnamed parameter",
                    self.path
                )));
            }
        }
        Ok(())
    }
}

/// Input half of a socket descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SocketInput {
    /// Namespace the descriptor serves.
    pub path: String,
}

/// A single event delivered to a namespace handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SocketRequest {
    pub event: String,
    pub socket_id: SocketId,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<Value>,
}

impl SocketRequest {
    /// Name of the lifecycle event sent once per new connection.
    pub const CONNECT: &'static str = "connect";

    pub fn connect(socket_id: SocketId) -> Self {
        Self {
            event: Self::CONNECT.to_string(),
            socket_id,
            params: Vec::new(),
        }
    }

    pub fn event(event: impl Into<String>, socket_id: SocketId, params: Vec<Value>) -> Self {
        Self {
            event: event.into(),
            socket_id,
            params,
        }
    }
}

/// An emission requested by a namespace handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventResponse {
    pub event: String,
    #[serde(default)]
    pub data: Vec<Value>,
    /// Rooms to emit to. `None` targets the originating connection only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receivers: Option<Vec<RoomId>>,
}

impl EventResponse {
    /// Emission back to the originating connection.
    pub fn reply(event: impl Into<String>, data: Vec<Value>) -> Self {
        Self {
            event: event.into(),
            data,
            receivers: None,
        }
    }

    /// Emission to the given rooms, excluding the originating connection.
    pub fn to_rooms(event: impl Into<String>, data: Vec<Value>, receivers: Vec<RoomId>) -> Self {
        Self {
            event: event.into(),
            data,
            receivers: Some(receivers),
        }
    }
}

/// Room join requested by a namespace handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRoomResponse {
    pub rooms: Vec<RoomId>,
}

/// What a handler wants done after handling an event.
///
/// On the wire an array is a list of emissions and an object is a room join.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SocketResponse {
    Events(Vec<EventResponse>),
    JoinRoom(JoinRoomResponse),
}

impl SocketResponse {
    /// Decodes a handler result. `null` means there is nothing to do.
    pub fn from_value(value: Value) -> Result<Option<Self>, RouteError> {
        if value.is_null() {
            return Ok(None);
        }
        serde_json::from_value(value)
            .map(Some)
            .map_err(|e| RouteError::internal(format!("invalid socket response: {e}")))
    }
}

/// The single entry point a namespace exposes to the dispatcher.
#[async_trait]
pub trait SocketHandler: Send + Sync + Debug + 'static {
    /// Handles a lifecycle or custom event. `Ok(None)` means nothing to emit.
    async fn execute_request(&self, request: SocketRequest) -> Result<Option<SocketResponse>, RouteError>;

    /// Human-readable name for logs.
    fn handler_name(&self) -> &str;
}

/// Description of one real-time namespace.
#[derive(Debug, Clone)]
pub struct SocketDescriptor {
    pub input: SocketInput,
    pub handler: Arc<dyn SocketHandler>,
}

impl SocketDescriptor {
    pub fn new(path: impl Into<String>, handler: Arc<dyn SocketHandler>) -> Self {
        Self {
            input: SocketInput { path: path.into() },
            handler,
        }
    }

    /// Namespace served by this descriptor.
    pub fn namespace(&self) -> &str {
        &self.input.path
    }
}

/// Socket handler backed by an async closure.
///
/// # Examples
///
/// ```rust
/// use route_system::{FnSocketHandler, JoinRoomResponse, SocketDescriptor, SocketRequest, SocketResponse};
/// use std::sync::Arc;
///
/// let handler = FnSocketHandler::new("chat", |request: SocketRequest| async move {
///     Ok(Some(SocketResponse::JoinRoom(JoinRoomResponse { rooms: vec![request.event] })))
/// });
/// let descriptor = SocketDescriptor::new("/chat", Arc::new(handler));
/// assert_eq!(descriptor.namespace(), "/chat");
/// ```
pub struct FnSocketHandler<F> {
    name: String,
    handler: F,
}

impl<F> FnSocketHandler<F> {
    pub fn new<Fut>(name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(SocketRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<SocketResponse>, RouteError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            handler,
        }
    }
}

impl<F> Debug for FnSocketHandler<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnSocketHandler")
            .field("name", &self.name)
            .finish()
    }
}

#[async_trait]
impl<F, Fut> SocketHandler for FnSocketHandler<F>
where
    F: Fn(SocketRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Option<SocketResponse>, RouteError>> + Send + 'static,
{
    async fn execute_request(&self, request: SocketRequest) -> Result<Option<SocketResponse>, RouteError> {
        (self.handler)(request).await
    }

    fn handler_name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_route_descriptor_wire_form() {
        let route: RouteDescriptor = serde_json::from_value(json!({
            "path": "/users/:id",
            "action": "GET",
            "handler": "getUser",
            "parameter_schema": {"populate": ["String"]},
            "return_definition": {"name": "User", "fields": {"name": "String"}}
        }))
        .unwrap();

        assert_eq!(route.action, RouteAction::Get);
        assert_eq!(route.parameter_schema.len(), 1);
        assert_eq!(route.return_definition.name, "User");
        assert!(route.validate().is_ok());
    }

    #[test]
    fn test_route_descriptor_schema_is_optional() {
        let route: RouteDescriptor = serde_json::from_value(json!({
            "path": "/health",
            "action": "GET",
            "handler": "health"
        }))
        .unwrap();
        assert!(route.parameter_schema.is_empty());
    }

    #[test]
    fn test_route_descriptor_validation() {
        assert!(RouteDescriptor::new("users", RouteAction::Get, "list").validate().is_err());
        assert!(RouteDescriptor::new("/users", RouteAction::Get, " ").validate().is_err());
        assert!(RouteDescriptor::new("/users/:", RouteAction::Get, "get").validate().is_err());
    }

    #[test]
    fn test_socket_response_shapes() {
        let events = SocketResponse::from_value(json!([
            {"event": "message", "data": [1], "receivers": ["room1"]},
            {"event": "ack", "data": []}
        ]))
        .unwrap();
        assert_eq!(
            events,
            Some(SocketResponse::Events(vec![
                EventResponse::to_rooms("message", vec![json!(1)], vec!["room1".into()]),
                EventResponse::reply("ack", vec![]),
            ]))
        );

        let join = SocketResponse::from_value(json!({"rooms": ["a", "b"]})).unwrap();
        assert_eq!(
            join,
            Some(SocketResponse::JoinRoom(JoinRoomResponse {
                rooms: vec!["a".into(), "b".into()]
            }))
        );

        assert_eq!(SocketResponse::from_value(Value::Null).unwrap(), None);
        assert!(SocketResponse::from_value(json!("nope")).is_err());
    }

    #[test]
    fn test_socket_request_wire_form() {
        let socket_id = SocketId::new();
        let value = serde_json::to_value(SocketRequest::connect(socket_id)).unwrap();
        assert_eq!(value, json!({"event": "connect", "socketId": socket_id.to_string()}));
    }

    #[tokio::test]
    async fn test_fn_socket_handler() {
        let handler = FnSocketHandler::new("echo", |request: SocketRequest| async move {
            Ok(Some(SocketResponse::Events(vec![EventResponse::reply(
                request.event,
                request.params,
            )])))
        });

        let response = handler
            .execute_request(SocketRequest::event("ping", SocketId::new(), vec![json!("hi")]))
            .await
            .unwrap();
        assert_eq!(
            response,
            Some(SocketResponse::Events(vec![EventResponse::reply("ping", vec![json!("hi")])]))
        );
        assert_eq!(handler.handler_name(), "echo");
    }
}
