//! HTTP surface of the gateway.
//!
//! Two kinds of traffic share one listener:
//!
//! * admin endpoints under the admin prefix, served by fixed axum routes;
//! * module routes under the mount prefix, which are not known when the axum
//!   router is built and are resolved per request through the fallback
//!   handler and [`RouterCore::handle_http`].
//!
//! | method   | path                       | purpose                          |
//! |----------|----------------------------|----------------------------------|
//! | `GET`    | `<admin>/modules`          | list registered modules          |
//! | `POST`   | `<admin>/modules`          | register a module manifest       |
//! | `DELETE` | `<admin>/modules/{name}`   | unregister a module              |
//! | `GET`    | `<admin>/routes`           | list the route table             |
//! | `GET`    | `<admin>/stats`            | router and connection statistics |
//! | any      | `<mount><route path>`      | dispatch to the owning module    |
//!
//! Admin endpoints require `Authorization: Bearer <admin token>`.

mod auth;
mod error;
mod handlers;

pub use error::ApiError;

use crate::connection::ConnectionManager;
use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{delete, get};
use axum::Router;
use module_registry::ModuleRegistry;
use route_system::{RouterCore, ShutdownState};
use std::sync::Arc;

/// Shared state handed to every HTTP handler.
#[derive(Debug, Clone)]
pub struct HttpState {
    pub router: Arc<RouterCore>,
    pub registry: Arc<ModuleRegistry>,
    pub connections: Arc<ConnectionManager>,
    /// In-flight tracking for graceful shutdown
    pub shutdown_state: ShutdownState,
    /// Bearer token the admin endpoints require, `None` closes them
    pub admin_token: Option<String>,
}

/// Builds the axum router for the HTTP surface.
pub fn create_router(state: HttpState, admin_prefix: &str, max_body_size: usize) -> Router {
    let admin = admin_prefix.trim_end_matches('/');
    let admin_routes = Router::new()
        .route(
            &format!("{admin}/modules"),
            get(handlers::list_modules).post(handlers::register_module),
        )
        .route(&format!("{admin}/modules/{{name}}"), delete(handlers::unregister_module))
        .route(&format!("{admin}/routes"), get(handlers::list_routes))
        .route(&format!("{admin}/stats"), get(handlers::stats))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_admin_token));

    Router::new()
        .merge(admin_routes)
        .fallback(handlers::dispatch)
        .layer(DefaultBodyLimit::max(max_body_size))
        .with_state(state)
}
