/// Core RouterCore implementation
use super::dispatcher::{SocketDispatcher, SocketEmitter};
use super::path_router::{PathRouter, RouteEntry, RouteMatch};
use super::stats::RouterStats;
use crate::descriptor::{RouteDescriptor, SocketDescriptor};
use crate::error::RouteError;
use crate::normalizer::{normalize, RawRequest};
use crate::rpc::{ModuleClient, RpcRequest};
use crate::types::RouteAction;
use crate::validator::validate;
use compact_str::CompactString;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// The gateway's routing hub.
///
/// Owns the route table, the socket dispatcher and the clients used to reach
/// each module. All registration state lives here rather than in
/// process-wide statics, so independent routers can coexist in one process.
pub struct RouterCore {
    /// Route table, written at registration time and read on every request
    pub(super) routes: RwLock<PathRouter>,
    /// Namespace table and event fan-out
    pub(super) sockets: Arc<SocketDispatcher>,
    /// Transport to each registered module
    pub(super) clients: DashMap<CompactString, Arc<dyn ModuleClient>>,
    /// Mount prefix routes are served under
    pub(super) mount_prefix: String,
    /// Deadline for module calls, `None` waits indefinitely
    pub(super) rpc_timeout: Option<Duration>,
    pub(super) stats: RwLock<RouterStats>,
}

impl std::fmt::Debug for RouterCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouterCore")
            .field("routes", &"[routes]")
            .field("sockets", &self.sockets.namespace_count())
            .field("clients", &self.clients.len())
            .field("mount_prefix", &self.mount_prefix)
            .field("rpc_timeout", &self.rpc_timeout)
            .finish()
    }
}

impl RouterCore {
    /// Creates a router with no registered routes or namespaces.
    pub fn new(emitter: Arc<dyn SocketEmitter>) -> Self {
        Self {
            routes: RwLock::new(PathRouter::new()),
            sockets: Arc::new(SocketDispatcher::new(emitter)),
            clients: DashMap::new(),
            mount_prefix: String::new(),
            rpc_timeout: None,
            stats: RwLock::new(RouterStats::default()),
        }
    }

    /// Serve routes under `prefix` (e.g. `/api`). Trailing slashes are dropped.
    pub fn with_mount_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.mount_prefix = prefix.into().trim_end_matches('/').to_string();
        self
    }

    /// Bound every module call by `timeout`. Zero disables the deadline.
    pub fn with_rpc_timeout(mut self, timeout: Duration) -> Self {
        self.rpc_timeout = (!timeout.is_zero()).then_some(timeout);
        self.sockets.set_rpc_timeout(timeout);
        self
    }

    pub fn mount_prefix(&self) -> &str {
        &self.mount_prefix
    }

    pub fn sockets(&self) -> &Arc<SocketDispatcher> {
        &self.sockets
    }

    /// Attaches the client used to reach `module`.
    pub fn connect_module(&self, module: &str, client: Arc<dyn ModuleClient>) {
        if self.clients.insert(CompactString::new(module), client).is_some() {
            debug!("🔄 Replaced client for module '{}'", module);
        }
    }

    /// Clients of every connected module.
    pub fn module_clients(&self) -> Vec<(String, Arc<dyn ModuleClient>)> {
        self.clients
            .iter()
            .map(|entry| (entry.key().to_string(), entry.value().clone()))
            .collect()
    }

    /// Registers a module's routes, replacing any it registered before.
    ///
    /// Registration is all-or-nothing: a conflict or malformed descriptor
    /// leaves the table untouched.
    pub async fn register_routes(&self, module: &str, routes: Vec<RouteDescriptor>) -> Result<usize, RouteError> {
        let mut table = self.routes.write().await;

        let mut staged = PathRouter::new();
        for entry in table.all_routes().into_iter().filter(|entry| entry.module != module) {
            staged.register_route(&entry.module, (*entry.descriptor).clone())?;
        }
        for route in &routes {
            staged.register_route(module, route.clone())?;
        }

        let count = routes.len();
        *table = staged;
        info!("🛣️ Module '{}' registered {} route(s)", module, count);
        Ok(count)
    }

    /// Registers a socket namespace. Returns `false` when the namespace was
    /// already taken.
    pub fn register_socket(&self, descriptor: SocketDescriptor) -> bool {
        self.sockets.register_namespace(descriptor)
    }

    /// Drops a module's routes and client. Socket namespaces stay registered.
    pub async fn remove_module(&self, module: &str) -> usize {
        let removed = self.routes.write().await.remove_module(module);
        self.clients.remove(module);
        info!("🗑️ Removed {} route(s) of module '{}'", removed, module);
        removed
    }

    /// Every registered route.
    pub async fn routes(&self) -> Vec<RouteEntry> {
        self.routes.read().await.all_routes()
    }

    /// Looks up the route for a path relative to the mount prefix.
    pub async fn find_route(&self, action: RouteAction, path: &str) -> Option<RouteMatch> {
        self.routes.read().await.find_route(action, path)
    }

    /// Full HTTP dispatch: match, normalize, validate, call the owning module.
    ///
    /// `raw.path` is relative to the mount prefix and `raw.path_params` is
    /// filled in from the match.
    pub async fn handle_http(&self, action: RouteAction, mut raw: RawRequest) -> Result<Value, RouteError> {
        let matched = match self.find_route(action, &raw.path).await {
            Some(matched) => matched,
            None => {
                let similar = self.routes.read().await.find_similar_paths(&raw.path, 3);
                debug!("❓ No route for {} {} (similar: {:?})", action, raw.path, similar);
                return Err(RouteError::NotFound(format!("Cannot {} {}{}", action, self.mount_prefix, raw.path)));
            }
        };

        raw.base_url = self.mount_prefix.clone();
        raw.path_params.extend(matched.path_params);
        let mut request = normalize(raw);

        if let Err(e) = validate(&mut request.params, &matched.descriptor.parameter_schema) {
            self.stats.write().await.requests_rejected += 1;
            debug!("🚫 {} {} rejected: {}", action, request.path, e);
            return Err(e);
        }

        let client = self
            .clients
            .get(matched.module.as_str())
            .map(|entry| entry.value().clone())
            .ok_or_else(|| RouteError::internal(format!("module '{}' is not connected", matched.module)))?;

        let rpc_request = RpcRequest::from_normalized(&request)?;
        let handler = matched.descriptor.handler.as_str();
        self.stats.write().await.requests_dispatched += 1;

        let call = client.call(handler, rpc_request);
        let outcome = match self.rpc_timeout {
            Some(timeout) => match tokio::time::timeout(timeout, call).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    self.stats.write().await.requests_failed += 1;
                    warn!("⏱️ Module '{}' timed out on {}", matched.module, handler);
                    return Err(RouteError::internal(format!(
                        "module '{}' did not answer within {}ms",
                        matched.module,
                        timeout.as_millis()
                    )));
                }
            },
            None => call.await,
        };

        match outcome {
            Ok(response) => Ok(response.decode()),
            Err(e) => {
                let err = RouteError::from(e);
                if !err.is_user_input() {
                    self.stats.write().await.requests_failed += 1;
                    warn!("❌ Module '{}' failed on {}: {}", matched.module, handler, err);
                }
                Err(err)
            }
        }
    }

    /// Gets the current router statistics
    pub async fn get_stats(&self) -> RouterStats {
        let mut stats = self.stats.read().await.clone();
        stats.total_routes = self.routes.read().await.total_routes();
        stats.total_namespaces = self.sockets.namespace_count();
        stats.connected_modules = self.clients.len();
        let (events, failures) = self.sockets.stats();
        stats.socket_events = events;
        stats.socket_failures = failures;
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{SocketRequest, SocketResponse};
    use crate::rpc::{RpcError, RpcResponse};
    use crate::schema::{ParameterSchema, PrimitiveType, TypeSpec};
    use crate::types::{RoomId, SocketId};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct NullEmitter;

    #[async_trait]
    impl SocketEmitter for NullEmitter {
        async fn emit_to_socket(&self, _: &str, _: SocketId, _: &str, _: &[Value]) -> Result<(), RouteError> {
            Ok(())
        }

        async fn emit_to_rooms(&self, _: &str, _: &[RoomId], _: SocketId, _: &str, _: &[Value]) -> Result<(), RouteError> {
            Ok(())
        }

        async fn join_rooms(&self, _: &str, _: SocketId, _: &[RoomId]) -> Result<(), RouteError> {
            Ok(())
        }
    }

    /// Echoes the decoded params back, or fails with the configured error.
    #[derive(Debug, Default)]
    struct EchoClient {
        calls: Mutex<Vec<(String, RpcRequest)>>,
        failure: Option<RpcError>,
        delay: Option<Duration>,
    }

    #[async_trait]
    impl ModuleClient for EchoClient {
        async fn call(&self, handler: &str, request: RpcRequest) -> Result<RpcResponse, RpcError> {
            self.calls.lock().unwrap().push((handler.to_string(), request.clone()));
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if let Some(failure) = &self.failure {
                return Err(failure.clone());
            }
            RpcResponse::json(&request.decode_params()?)
        }

        async fn execute_socket(&self, _: &str, _: SocketRequest) -> Result<Option<SocketResponse>, RpcError> {
            Ok(None)
        }
    }

    fn router() -> RouterCore {
        RouterCore::new(Arc::new(NullEmitter)).with_mount_prefix("/api")
    }

    fn get_user() -> RouteDescriptor {
        RouteDescriptor::new("/users/:id", RouteAction::Get, "getUser")
            .with_params(ParameterSchema::new().field("id", TypeSpec::required(PrimitiveType::Number)))
    }

    #[tokio::test]
    async fn test_dispatches_validated_params() {
        let router = router();
        let client = Arc::new(EchoClient::default());
        router.connect_module("users", client.clone());
        router.register_routes("users", vec![get_user()]).await.unwrap();

        let raw = RawRequest::new("", "/users/42").with_query_pairs(vec![("x".to_string(), "1".to_string())]);
        let result = router.handle_http(RouteAction::Get, raw).await.unwrap();
        assert_eq!(result, json!({"x": "1", "id": 42}));

        let calls = client.calls.lock().unwrap();
        assert_eq!(calls[0].0, "getUser");
        assert_eq!(calls[0].1.path, "/api/users/42");
        assert_eq!(calls[0].1.context, json!({}));
    }

    #[tokio::test]
    async fn test_validation_failure_skips_module() {
        let router = router();
        let client = Arc::new(EchoClient::default());
        router.connect_module("users", client.clone());
        router.register_routes("users", vec![get_user()]).await.unwrap();

        let err = router
            .handle_http(RouteAction::Get, RawRequest::new("", "/users/abc"))
            .await
            .unwrap_err();
        assert_eq!(err, RouteError::UserInput("id must be a number".into()));
        assert!(client.calls.lock().unwrap().is_empty());
        assert_eq!(router.get_stats().await.requests_rejected, 1);
    }

    #[tokio::test]
    async fn test_unknown_route_is_not_found() {
        let router = router();
        let err = router
            .handle_http(RouteAction::Post, RawRequest::new("", "/missing"))
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 404);
    }

    #[tokio::test]
    async fn test_module_errors_pass_through() {
        let router = router();
        router.connect_module(
            "users",
            Arc::new(EchoClient {
                failure: Some(RpcError::internal("database unavailable")),
                ..Default::default()
            }),
        );
        router.register_routes("users", vec![get_user()]).await.unwrap();

        let err = router
            .handle_http(RouteAction::Get, RawRequest::new("", "/users/1"))
            .await
            .unwrap_err();
        assert_eq!(err, RouteError::Internal("database unavailable".into()));
        assert_eq!(router.get_stats().await.requests_failed, 1);
    }

    #[tokio::test]
    async fn test_rpc_timeout() {
        let router = router().with_rpc_timeout(Duration::from_millis(20));
        router.connect_module(
            "users",
            Arc::new(EchoClient {
                delay: Some(Duration::from_millis(500)),
                ..Default::default()
            }),
        );
        router.register_routes("users", vec![get_user()]).await.unwrap();

        let err = router
            .handle_http(RouteAction::Get, RawRequest::new("", "/users/1"))
            .await
            .unwrap_err();
        assert!(matches!(err, RouteError::Internal(_)));
    }

    #[tokio::test]
    async fn test_registration_is_atomic() {
        let router = router();
        router.register_routes("users", vec![get_user()]).await.unwrap();

        let err = router
            .register_routes(
                "admin",
                vec![
                    RouteDescriptor::new("/stats", RouteAction::Get, "stats"),
                    RouteDescriptor::new("/users/:userId", RouteAction::Get, "steal"),
                ],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RouteError::Conflict(_)));
        assert!(router.find_route(RouteAction::Get, "/stats").await.is_none());
        assert_eq!(router.routes().await.len(), 1);
    }

    #[tokio::test]
    async fn test_remove_module_frees_routes() {
        let router = router();
        router.connect_module("users", Arc::new(EchoClient::default()));
        router.register_routes("users", vec![get_user()]).await.unwrap();

        assert_eq!(router.remove_module("users").await, 1);
        assert!(router.find_route(RouteAction::Get, "/users/1").await.is_none());
        assert_eq!(router.get_stats().await.connected_modules, 0);

        router.register_routes("people", vec![get_user()]).await.unwrap();
    }

    #[tokio::test]
    async fn test_reregistration_replaces_module_routes() {
        let router = router();
        router
            .register_routes(
                "users",
                vec![get_user(), RouteDescriptor::new("/users", RouteAction::Get, "listUsers")],
            )
            .await
            .unwrap();
        router.register_routes("users", vec![get_user()]).await.unwrap();

        assert!(router.find_route(RouteAction::Get, "/users").await.is_none());
        assert!(router.find_route(RouteAction::Get, "/users/1").await.is_some());
    }
}
