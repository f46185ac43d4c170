//! HTTP request handlers.

use super::{ApiError, HttpState};
use axum::body::Bytes;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::Json;
use module_registry::{ModuleInfo, ModuleManifest};
use route_system::{RawRequest, RouteAction};
use serde_json::{json, Map, Value};
use tracing::{debug, info};

/// `GET <admin>/modules`
pub async fn list_modules(State(state): State<HttpState>) -> Json<Vec<ModuleInfo>> {
    Json(state.registry.list())
}

/// `POST <admin>/modules`
pub async fn register_module(
    State(state): State<HttpState>,
    payload: Result<Json<ModuleManifest>, JsonRejection>,
) -> Result<(StatusCode, Json<ModuleInfo>), ApiError> {
    let Json(manifest) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let info = state.registry.register(manifest).await?;
    Ok((StatusCode::CREATED, Json(info)))
}

/// `DELETE <admin>/modules/{name}`
pub async fn unregister_module(
    State(state): State<HttpState>,
    Path(name): Path<String>,
) -> Result<Json<ModuleInfo>, ApiError> {
    let info = state.registry.unregister(&name).await?;
    info!("👋 Module '{}' unregistered through the admin API", name);
    Ok(Json(info))
}

/// `GET <admin>/routes`
pub async fn list_routes(State(state): State<HttpState>) -> Json<Vec<Value>> {
    let routes = state
        .router
        .routes()
        .await
        .into_iter()
        .map(|entry| {
            json!({
                "action": entry.descriptor.action,
                "path": entry.descriptor.path,
                "handler": entry.descriptor.handler,
                "module": entry.module.as_str(),
            })
        })
        .collect();
    Json(routes)
}

/// `GET <admin>/stats`
pub async fn stats(State(state): State<HttpState>) -> Json<Value> {
    let router = state.router.get_stats().await;
    Json(json!({
        "router": router,
        "modules": state.registry.module_count(),
        "connections": state.connections.connection_count(),
        "in_flight": state.shutdown_state.in_flight(),
    }))
}

/// Fallback: resolves the request against the module route table.
pub async fn dispatch(
    State(state): State<HttpState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    query: Result<Query<Vec<(String, String)>>, QueryRejection>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let _in_flight = state.shutdown_state.track();
    let not_found = || ApiError::not_found(format!("Cannot {} {}", method, uri.path()));

    let action: RouteAction = method.as_str().parse().map_err(|_| not_found())?;
    let relative = relative_path(uri.path(), state.router.mount_prefix()).ok_or_else(not_found)?;

    let Query(pairs) = query.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let body = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::bad_request(format!("request body is not valid JSON: {e}")))?
    };

    debug!("🌐 {} {}", action, uri.path());
    let raw = RawRequest::new("", relative)
        .with_query_pairs(pairs)
        .with_body(body)
        .with_headers(header_map(&headers));

    let result = state.router.handle_http(action, raw).await?;
    Ok(Json(result))
}

/// Strips the mount prefix. `None` when the path is outside of it.
fn relative_path(path: &str, mount_prefix: &str) -> Option<String> {
    let rest = path.strip_prefix(mount_prefix)?;
    if rest.is_empty() {
        Some("/".to_string())
    } else if rest.starts_with('/') {
        Some(rest.to_string())
    } else {
        None
    }
}

/// Header names are lower case. Repeated headers are joined with `, `.
fn header_map(headers: &HeaderMap) -> Map<String, Value> {
    let mut map = Map::new();
    for (name, value) in headers {
        let Ok(value) = value.to_str() else {
            continue;
        };
        match map.get_mut(name.as_str()) {
            Some(Value::String(existing)) => {
                existing.push_str(", ");
                existing.push_str(value);
            }
            _ => {
                map.insert(name.as_str().to_string(), Value::String(value.to_string()));
            }
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_relative_path() {
        assert_eq!(relative_path("/api/users", "/api").as_deref(), Some("/users"));
        assert_eq!(relative_path("/api", "/api").as_deref(), Some("/"));
        assert_eq!(relative_path("/apix/users", "/api"), None);
        assert_eq!(relative_path("/users", "").as_deref(), Some("/users"));
    }

    #[test]
    fn test_header_map_joins_repeats() {
        let mut headers = HeaderMap::new();
        headers.append("x-tag", HeaderValue::from_static("a"));
        headers.append("x-tag", HeaderValue::from_static("b"));
        headers.insert("authorization", HeaderValue::from_static("Bearer t"));

        let map = header_map(&headers);
        assert_eq!(map["x-tag"], "a, b");
        assert_eq!(map["authorization"], "Bearer t");
    }
}
