//! Main application logic and lifecycle management.
//!
//! This module contains the `Application` struct that orchestrates server
//! startup, module health monitoring and graceful shutdown.

use crate::{
    cli::CliArgs,
    config::AppConfig,
    logging::display_banner,
    signals::{setup_signal_handlers, setup_signal_handlers_silent},
};
use gateway_server::GatewayServer;
use module_registry::ModuleRegistry;
use route_system::{RouterCore, ShutdownState};
use std::sync::Arc;
use tokio::time::Duration;
use tracing::{error, info, warn};

/// Interval between module health checks and stats reports
const MONITOR_INTERVAL: Duration = Duration::from_secs(60);

/// How long in-flight requests and socket events get to finish on shutdown
const DRAIN_TIMEOUT: Duration = Duration::from_secs(3);

/// Main application struct.
///
/// # Architecture
///
/// * **Configuration Management**: Loads and validates configuration from files and CLI
/// * **Server Orchestration**: Builds the gateway server and registers static modules
/// * **Health Monitoring**: Pings modules and reports routing statistics
/// * **Graceful Shutdown**: Handles termination signals and cleanup procedures
pub struct Application {
    /// Loaded application configuration
    config: AppConfig,
    /// Gateway server instance
    server: GatewayServer,
}

impl Application {
    /// Creates a new application instance.
    ///
    /// # Process
    ///
    /// 1. Load configuration from file (creating default if missing)
    /// 2. Apply command-line argument overrides
    /// 3. Validate merged configuration
    /// 4. Display startup banner
    /// 5. Build the gateway server
    /// 6. Register the statically configured modules
    pub async fn new(args: CliArgs) -> Result<Self, Box<dyn std::error::Error>> {
        info!("🔧 Loading configuration from: {}", args.config_path.display());
        let mut config = AppConfig::load_from_file(&args.config_path).await?;
        config.apply_overrides(&args);

        if let Err(e) = config.validate() {
            return Err(format!("Configuration validation failed: {e}").into());
        }
        info!("✅ Configuration loaded and validated successfully");

        display_banner();

        let server = GatewayServer::new(config.to_server_config()?)?;
        let registry = server.registry();
        for manifest in config.modules.static_modules.iter().cloned() {
            let name = manifest.name.clone();
            registry
                .register(manifest)
                .await
                .map_err(|e| format!("Static module '{name}' failed to register: {e}"))?;
        }

        info!(
            "📂 Config: {} | Static modules: {}",
            args.config_path.display(),
            config.modules.static_modules.len()
        );

        Ok(Self { config, server })
    }

    /// Runs the gateway until a shutdown signal arrives.
    ///
    /// # Shutdown Phases
    ///
    /// 1. Stop accepting connections and requests
    /// 2. Wait for in-flight requests and socket events to drain
    /// 3. Wait for the server task to finish
    /// 4. Unregister every module
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        info!("🌟 Starting Module Gateway");
        self.log_configuration_summary();

        let router = self.server.router();
        let registry = self.server.registry();
        let connections = self.server.connection_manager();

        let shutdown_state = ShutdownState::new();
        let shutdown_state_for_server = shutdown_state.clone();

        let server_handle = {
            let server = self.server;
            tokio::spawn(async move {
                match server.start_with_shutdown_state(shutdown_state_for_server).await {
                    Ok(()) => {
                        info!("✅ Server completed successfully");
                    }
                    Err(e) => {
                        error!("❌ Server error: {:?}", e);
                        std::process::exit(1);
                    }
                }
            })
        };

        let monitoring_handle = {
            let router = router.clone();
            let registry = registry.clone();
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(MONITOR_INTERVAL);
                // The first tick completes immediately
                interval.tick().await;
                let mut last_dispatched = 0u64;

                loop {
                    interval.tick().await;

                    let serving = registry.check_all().await;
                    let stats = router.get_stats().await;
                    let dispatched_this_period = stats.requests_dispatched.saturating_sub(last_dispatched);
                    last_dispatched = stats.requests_dispatched;

                    info!(
                        "📊 Gateway Health - {}/{} modules serving | {} routes | {} namespaces | {} requests/min | {} sockets",
                        serving,
                        registry.module_count(),
                        stats.total_routes,
                        stats.total_namespaces,
                        dispatched_this_period,
                        connections.connection_count()
                    );

                    if stats.requests_failed > 0 || stats.socket_failures > 0 {
                        warn!(
                            "⚠️ {} request(s) and {} socket event(s) failed since start",
                            stats.requests_failed, stats.socket_failures
                        );
                    }
                }
            })
        };

        info!("✅ Module Gateway is now running!");
        info!(
            "🌐 HTTP on {} | 🔌 sockets on {}",
            self.config.server.http_bind_address, self.config.server.socket_bind_address
        );
        info!("🔍 Module health checks every {}s", MONITOR_INTERVAL.as_secs());
        info!("🛑 Press Ctrl+C to gracefully shutdown");

        let signal_shutdown_state = setup_signal_handlers().await?;

        // A second signal skips the graceful path
        tokio::spawn(async move {
            if let Err(e) = setup_signal_handlers_silent().await {
                error!("Failed to set up forced shutdown signal handler: {e}");
                return;
            }

            warn!("Shutdown signal received again, exiting immediately");
            std::process::exit(1);
        });

        if signal_shutdown_state.is_shutdown_initiated() {
            shutdown_state.initiate_shutdown();
        }

        info!("📡 Phase 1: Stopping new connections and requests...");
        monitoring_handle.abort();

        info!("⏳ Phase 2: Waiting for in-flight work ({} pending)...", shutdown_state.in_flight());
        if shutdown_state.wait_for_drain(DRAIN_TIMEOUT).await {
            info!("✅ All in-flight work completed");
        } else {
            info!(
                "⏰ Timeout reached, proceeding with shutdown ({} still running)",
                shutdown_state.in_flight()
            );
        }
        shutdown_state.complete_shutdown();

        info!("🧹 Phase 3: Waiting for server task to complete...");
        match tokio::time::timeout(Duration::from_secs(8), server_handle).await {
            Ok(_) => info!("✅ Server task completed gracefully"),
            Err(e) => warn!("⏰ Server task did not complete within timeout, proceeding with cleanup: {:?}", e),
        }

        info!("🔌 Phase 4: Unregistering modules...");
        log_final_statistics(&router, &registry).await;
        registry.shutdown().await;

        info!("✅ Module Gateway shutdown complete");
        Ok(())
    }

    /// Logs the configuration summary at startup.
    fn log_configuration_summary(&self) {
        let server = &self.config.server;
        info!("📋 Configuration Summary:");
        info!("  🌐 HTTP address: {}", server.http_bind_address);
        info!("  🔌 Socket address: {}", server.socket_bind_address);
        info!(
            "  🧭 Mount prefix: '{}' | Admin prefix: '{}'",
            server.mount_prefix, server.admin_prefix
        );
        info!("  👥 Max connections: {}", server.max_connections);
        if server.rpc_timeout_ms == 0 {
            info!("  ⏱️ Module calls: no deadline");
        } else {
            info!("  ⏱️ Module calls: {}ms deadline", server.rpc_timeout_ms);
        }
        if server.admin_token.is_none() {
            warn!("  🔒 No admin token configured, the admin API rejects every request");
        }
    }
}

/// Logs final statistics during shutdown.
async fn log_final_statistics(router: &Arc<RouterCore>, registry: &Arc<ModuleRegistry>) {
    let stats = router.get_stats().await;
    info!("📊 Final Statistics:");
    info!("  - Modules registered: {}", registry.module_count());
    info!("  - Requests dispatched: {}", stats.requests_dispatched);
    info!("  - Requests rejected: {}", stats.requests_rejected);
    info!("  - Requests failed: {}", stats.requests_failed);
    info!("  - Socket events: {}", stats.socket_events);
}

#[cfg(test)]
mod tests {
    use super::*;
    use module_registry::ModuleManifest;
    use std::net::SocketAddr;
    use tempfile::TempDir;

    fn args(config_path: std::path::PathBuf) -> CliArgs {
        CliArgs {
            config_path,
            bind_address: Some("127.0.0.1:3900".to_string()),
            socket_bind_address: Some("127.0.0.1:3901".to_string()),
            log_level: None,
            json_logs: false,
        }
    }

    #[tokio::test]
    async fn test_application_registers_static_modules() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gateway.toml");

        let mut config = AppConfig::default();
        config
            .modules
            .static_modules
            .push(ModuleManifest::new("chat", "http://127.0.0.1:5002").with_socket("/chat"));
        tokio::fs::write(&path, toml::to_string_pretty(&config).unwrap())
            .await
            .unwrap();

        let app = Application::new(args(path)).await.unwrap();
        let server = &app.server;
        assert_eq!(server.config().http_bind_address, "127.0.0.1:3900".parse::<SocketAddr>().unwrap());
        assert_eq!(server.config().socket_bind_address, "127.0.0.1:3901".parse::<SocketAddr>().unwrap());
        assert!(server.registry().is_registered("chat"));
        assert!(server.router().sockets().has_namespace("/chat"));
    }

    #[tokio::test]
    async fn test_application_rejects_invalid_overrides() {
        let dir = TempDir::new().unwrap();
        let mut cli = args(dir.path().join("gateway.toml"));
        cli.log_level = Some("loud".to_string());

        assert!(Application::new(cli).await.is_err());
    }
}
