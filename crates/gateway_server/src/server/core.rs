//! Core gateway server implementation.
//!
//! This module contains the main `GatewayServer` struct, which wires the
//! route system, the module registry and the connection manager together and
//! runs the HTTP and socket listeners.

use crate::{
    config::ServerConfig,
    connection::ConnectionManager,
    error::ServerError,
    http::{create_router, HttpState},
    server::handlers::{handle_connection, ConnectionContext},
};
use module_registry::ModuleRegistry;
use route_system::{RouterCore, ShutdownState};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::time::Duration;
use tracing::{debug, error, info};

/// The gateway server.
///
/// # Architecture
///
/// * **Router Core**: route table, socket namespaces and module clients
/// * **Module Registry**: module manifests and liveness
/// * **Connection Manager**: socket connections and rooms, and the emitter
///   socket handlers reply through
/// * **Two listeners**: axum for HTTP, tokio-tungstenite for sockets
///
/// The server holds no module logic. Every route and namespace is added at
/// runtime by modules registering themselves.
pub struct GatewayServer {
    /// Server configuration settings
    config: ServerConfig,

    /// Routing hub shared with the registry and the HTTP surface
    router: Arc<RouterCore>,

    /// Registered modules
    registry: Arc<ModuleRegistry>,

    /// Manager for socket connections and rooms
    connection_manager: Arc<ConnectionManager>,

    /// Channel for coordinating server shutdown
    shutdown_sender: broadcast::Sender<()>,
}

impl std::fmt::Debug for GatewayServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayServer")
            .field("config", &self.config)
            .field("router", &self.router)
            .field("registry", &self.registry)
            .field("connections", &self.connection_manager.connection_count())
            .finish()
    }
}

impl GatewayServer {
    /// Creates a new gateway server with the specified configuration.
    pub fn new(config: ServerConfig) -> Result<Self, ServerError> {
        let connection_manager = Arc::new(ConnectionManager::with_capacity(config.outbound_buffer));
        let router = Arc::new(
            RouterCore::new(connection_manager.clone())
                .with_mount_prefix(config.mount_prefix.clone())
                .with_rpc_timeout(Duration::from_millis(config.rpc_timeout_ms)),
        );
        let registry = ModuleRegistry::new(router.clone(), Duration::from_secs(config.connection_timeout))
            .map_err(|e| ServerError::Internal(e.to_string()))?;
        let (shutdown_sender, _) = broadcast::channel(1);

        Ok(Self {
            config,
            router,
            registry: Arc::new(registry),
            connection_manager,
            shutdown_sender,
        })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn router(&self) -> Arc<RouterCore> {
        self.router.clone()
    }

    pub fn registry(&self) -> Arc<ModuleRegistry> {
        self.registry.clone()
    }

    pub fn connection_manager(&self) -> Arc<ConnectionManager> {
        self.connection_manager.clone()
    }

    /// Builds the HTTP application served on the HTTP listener.
    pub fn http_app(&self, shutdown_state: ShutdownState) -> axum::Router {
        let state = HttpState {
            router: self.router.clone(),
            registry: self.registry.clone(),
            connections: self.connection_manager.clone(),
            shutdown_state,
            admin_token: self.config.admin_token.clone(),
        };
        create_router(state, &self.config.admin_prefix, self.config.security.max_body_size)
    }

    /// Starts the server with graceful shutdown support.
    ///
    /// Runs until `shutdown_state` reports that shutdown was initiated or
    /// [`GatewayServer::shutdown`] is called.
    pub async fn start_with_shutdown_state(&self, shutdown_state: ShutdownState) -> Result<(), ServerError> {
        let (http_listener, socket_listener) = self.bind().await?;
        self.serve(http_listener, socket_listener, Some(shutdown_state)).await
    }

    /// Starts the server and runs until [`GatewayServer::shutdown`] is called.
    pub async fn start(&self) -> Result<(), ServerError> {
        let (http_listener, socket_listener) = self.bind().await?;
        self.serve(http_listener, socket_listener, None).await
    }

    /// Binds the HTTP and socket listeners.
    pub async fn bind(&self) -> Result<(TcpListener, TcpListener), ServerError> {
        let http_listener = TcpListener::bind(self.config.http_bind_address)
            .await
            .map_err(|e| ServerError::Network(format!("HTTP bind to {} failed: {e}", self.config.http_bind_address)))?;
        let socket_listener = TcpListener::bind(self.config.socket_bind_address)
            .await
            .map_err(|e| {
                ServerError::Network(format!("Socket bind to {} failed: {e}", self.config.socket_bind_address))
            })?;
        Ok((http_listener, socket_listener))
    }

    /// Serves both surfaces on already bound listeners.
    pub async fn serve(
        &self,
        http_listener: TcpListener,
        socket_listener: TcpListener,
        shutdown_state: Option<ShutdownState>,
    ) -> Result<(), ServerError> {
        let http_addr = http_listener
            .local_addr()
            .map_err(|e| ServerError::Network(e.to_string()))?;
        let socket_addr = socket_listener
            .local_addr()
            .map_err(|e| ServerError::Network(e.to_string()))?;
        info!("🚀 Gateway HTTP surface on {} (routes under '{}')", http_addr, self.config.mount_prefix);
        info!("🔌 Gateway socket surface on {}", socket_addr);

        let tracker = shutdown_state.clone().unwrap_or_default();

        // HTTP surface
        let app = self.http_app(tracker.clone());
        let http_stop = stop_signal(shutdown_state.clone(), self.shutdown_sender.subscribe());
        let http_task = tokio::spawn(async move {
            axum::serve(http_listener, app)
                .with_graceful_shutdown(http_stop)
                .await
        });

        // Socket accept loop
        let context = ConnectionContext {
            connection_manager: self.connection_manager.clone(),
            dispatcher: self.router.sockets().clone(),
            security: self.config.security.clone(),
            max_connections: self.config.max_connections,
            shutdown_state: tracker,
        };
        let socket_stop = stop_signal(shutdown_state, self.shutdown_sender.subscribe());
        tokio::pin!(socket_stop);

        loop {
            tokio::select! {
                _ = &mut socket_stop => {
                    info!("🛑 Socket accept loop stopping - shutdown initiated");
                    break;
                }
                accepted = socket_listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        let context = context.clone();
                        // Spawn individual connection handler
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, addr, context).await {
                                debug!("Connection from {} ended: {}", addr, e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                        break;
                    }
                }
            }
        }

        // Stop the HTTP surface too when the accept loop ended on its own
        let _ = self.shutdown_sender.send(());
        let closing = self.connection_manager.close_all("server shutting down").await;
        if closing > 0 {
            info!("👋 Closing {} socket connection(s)", closing);
        }

        match http_task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(ServerError::Network(format!("HTTP server failed: {e}"))),
            Err(e) => return Err(ServerError::Internal(format!("HTTP server task failed: {e}"))),
        }

        info!("✅ Gateway server stopped");
        Ok(())
    }

    /// Stops a running server.
    pub fn shutdown(&self) {
        let _ = self.shutdown_sender.send(());
    }
}

/// Resolves once shutdown was initiated through `shutdown_state` or the
/// internal shutdown channel fired.
async fn stop_signal(shutdown_state: Option<ShutdownState>, mut internal: broadcast::Receiver<()>) {
    loop {
        if shutdown_state
            .as_ref()
            .is_some_and(|state| state.is_shutdown_initiated())
        {
            return;
        }
        tokio::select! {
            _ = internal.recv() => return,
            _ = tokio::time::sleep(Duration::from_millis(100)) => {}
        }
    }
}
