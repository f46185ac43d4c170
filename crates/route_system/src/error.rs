//! Error types for routing, validation and module dispatch.
//!
//! Two kinds matter on the request path: [`RouteError::UserInput`] for
//! parameters that violate a descriptor's schema, and [`RouteError::Internal`]
//! for failures inside (or on the way to) a module. The remaining variants
//! are raised by the router itself.

use crate::rpc::{RpcError, RpcStatus};
use serde::{Deserialize, Serialize};

/// Errors surfaced by the router core.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum RouteError {
    /// Client-supplied parameters violate the declared schema.
    #[error("{0}")]
    UserInput(String),

    /// Handler or remote module failure, message passed through unmodified.
    #[error("{0}")]
    Internal(String),

    /// No route, namespace or module matched.
    #[error("{0}")]
    NotFound(String),

    /// A route is already owned by a different module.
    #[error("{0}")]
    Conflict(String),

    /// A descriptor shipped by a module could not be decoded.
    #[error("Invalid descriptor: {0}")]
    InvalidDescriptor(String),
}

impl RouteError {
    /// Creates a user input error.
    pub fn user_input(message: impl Into<String>) -> Self {
        RouteError::UserInput(message.into())
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        RouteError::Internal(message.into())
    }

    /// HTTP status code equivalent for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            RouteError::UserInput(_) | RouteError::InvalidDescriptor(_) => 400,
            RouteError::NotFound(_) => 404,
            RouteError::Conflict(_) => 409,
            RouteError::Internal(_) => 500,
        }
    }

    /// Returns true for errors caused by the caller's input.
    pub fn is_user_input(&self) -> bool {
        matches!(self, RouteError::UserInput(_))
    }
}

impl From<RpcError> for RouteError {
    fn from(err: RpcError) -> Self {
        match err.code {
            RpcStatus::InvalidArgument => RouteError::UserInput(err.message),
            RpcStatus::Internal => RouteError::Internal(err.message),
        }
    }
}

impl From<serde_json::Error> for RouteError {
    fn from(err: serde_json::Error) -> Self {
        RouteError::Internal(format!("JSON encoding failed: {err}"))
    }
}
