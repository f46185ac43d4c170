//! Module RPC boundary.
//!
//! Every call from the gateway to a module is a serialized request/response
//! pair. The request carries the validated parameters as a JSON-encoded
//! string in `params`; a successful response carries a JSON-encoded `result`;
//! a failure carries `{code, message}` with a code drawn from [`RpcStatus`].
//!
//! The transport is abstracted behind [`ModuleClient`], so the router never
//! knows whether a module lives in-process or behind a network hop.

use crate::descriptor::{SocketRequest, SocketResponse};
use crate::error::RouteError;
use crate::normalizer::NormalizedRequest;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Status codes a module may answer with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RpcStatus {
    /// The caller's parameters were rejected by the module.
    InvalidArgument,
    /// The module failed while handling the call.
    Internal,
}

/// Error payload returned by a module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{code:?}: {message}")]
pub struct RpcError {
    pub code: RpcStatus,
    pub message: String,
}

impl RpcError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self {
            code: RpcStatus::InvalidArgument,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            code: RpcStatus::Internal,
            message: message.into(),
        }
    }
}

/// Request shipped to a module for one route invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    /// JSON-encoded parameter map.
    pub params: String,
    /// Request-scoped context attached by upstream middleware.
    #[serde(default)]
    pub context: Value,
    /// Inbound request headers.
    #[serde(default)]
    pub headers: Map<String, Value>,
    /// Full request path (mount prefix included).
    #[serde(default)]
    pub path: String,
}

impl RpcRequest {
    /// Builds the wire request from a normalized, validated request.
    pub fn from_normalized(request: &NormalizedRequest) -> Result<Self, RouteError> {
        Ok(Self {
            params: serde_json::to_string(&request.params)?,
            context: request.context.clone(),
            headers: request.headers.clone(),
            path: request.path.clone(),
        })
    }

    /// Decodes the JSON-encoded parameter map.
    pub fn decode_params(&self) -> Result<Map<String, Value>, RpcError> {
        serde_json::from_str(&self.params)
            .map_err(|e| RpcError::invalid_argument(format!("params is not a JSON object: {e}")))
    }
}

/// Successful response from a module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcResponse {
    /// JSON-encoded result.
    pub result: String,
}

impl RpcResponse {
    /// Encodes a result value.
    pub fn json<T: Serialize>(value: &T) -> Result<Self, RpcError> {
        serde_json::to_string(value)
            .map(|result| Self { result })
            .map_err(|e| RpcError::internal(format!("failed to encode result: {e}")))
    }

    /// Decodes the result. A result that is not valid JSON is returned as a
    /// plain JSON string.
    pub fn decode(&self) -> Value {
        serde_json::from_str(&self.result).unwrap_or_else(|_| Value::String(self.result.clone()))
    }
}

/// Transport to a single module.
///
/// Implemented by the network client in `module_registry` and by in-process
/// fakes in tests.
#[async_trait]
pub trait ModuleClient: Send + Sync + std::fmt::Debug + 'static {
    /// Invokes the remote procedure `handler` with a route request.
    async fn call(&self, handler: &str, request: RpcRequest) -> Result<RpcResponse, RpcError>;

    /// Forwards a socket event for `namespace` to the module.
    ///
    /// `Ok(None)` means the module had nothing to emit or join.
    async fn execute_socket(
        &self,
        namespace: &str,
        request: SocketRequest,
    ) -> Result<Option<SocketResponse>, RpcError>;

    /// Liveness check. In-process clients are always reachable.
    async fn ping(&self) -> Result<(), RpcError> {
        Ok(())
    }
}
