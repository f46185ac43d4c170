//! Admin credential check.
//!
//! Admin endpoints require `Authorization: Bearer <admin token>`. Without a
//! configured token the admin API is closed.

use super::{ApiError, HttpState};
use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use tracing::warn;

/// Middleware guarding every admin route.
pub async fn require_admin_token(
    State(state): State<HttpState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(expected) = state.admin_token.as_deref() else {
        warn!("🔒 Admin request to {} refused, no admin token configured", request.uri().path());
        return Err(ApiError::unauthorized("admin API is disabled: no admin token configured"));
    };

    let presented = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    match presented {
        Some(token) if tokens_match(token, expected) => Ok(next.run(request).await),
        Some(_) => {
            warn!("🔒 Invalid admin token for {}", request.uri().path());
            Err(ApiError::unauthorized("invalid admin token"))
        }
        None => Err(ApiError::unauthorized("missing admin token")),
    }
}

/// Compares without stopping at the first differing byte.
fn tokens_match(presented: &str, expected: &str) -> bool {
    let (a, b) = (presented.as_bytes(), expected.as_bytes());
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
