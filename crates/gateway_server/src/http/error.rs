//! HTTP error responses.
//!
//! Every failure leaves the gateway as `{"code": <status>, "message": <text>}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use module_registry::RegistryError;
use route_system::RouteError;
use serde_json::json;

/// Error returned by HTTP handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    fn from_code(code: u16, message: String) -> Self {
        let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self::new(status, message)
    }
}

impl From<RouteError> for ApiError {
    fn from(err: RouteError) -> Self {
        let code = err.status_code();
        let message = match err {
            RouteError::UserInput(message)
            | RouteError::Internal(message)
            | RouteError::NotFound(message)
            | RouteError::Conflict(message)
            | RouteError::InvalidDescriptor(message) => message,
        };
        Self::from_code(code, message)
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::Route(route) => route.into(),
            other => Self::from_code(other.status_code(), other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "code": self.status.as_u16(),
            "message": self.message,
        });
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_errors_keep_their_message() {
        let err = ApiError::from(RouteError::user_input("name is required"));
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "name is required");

        let err = ApiError::from(RouteError::Conflict("taken".into()));
        assert_eq!(err.status, StatusCode::CONFLICT);
    }

    #[test]
    fn test_registry_errors() {
        let err = ApiError::from(RegistryError::ModuleNotFound("email".into()));
        assert_eq!(err.status, StatusCode::NOT_FOUND);

        let err = ApiError::from(RegistryError::Route(RouteError::internal("boom")));
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, "boom");
    }
}
