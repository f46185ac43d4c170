use crate::client::{HttpModuleClient, RemoteSocketHandler};
use crate::error::RegistryError;
use crate::manifest::{ModuleInfo, ModuleManifest, ModuleStatus};
use dashmap::DashMap;
use route_system::{current_timestamp, ModuleClient, RouterCore, SocketDescriptor};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Registry of the modules composing the gateway.
///
/// The `ModuleRegistry` handles the complete lifecycle of a module:
/// - Validation of the manifest a module registers with
/// - Registration of its routes and socket namespaces with the router
/// - Liveness tracking through periodic health checks
/// - Removal of its routes when it unregisters
pub struct ModuleRegistry {
    /// Router the module descriptors are registered with
    router: Arc<RouterCore>,
    /// Registered modules by name
    modules: DashMap<String, ModuleInfo>,
    /// Shared connection pool for HTTP modules
    http: reqwest::Client,
}

impl std::fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("modules", &self.module_names())
            .finish()
    }
}

impl ModuleRegistry {
    /// Creates a registry that registers descriptors with `router`.
    ///
    /// `connect_timeout` bounds connection setup to HTTP modules.
    pub fn new(router: Arc<RouterCore>, connect_timeout: Duration) -> Result<Self, RegistryError> {
        let http = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| RegistryError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            router,
            modules: DashMap::new(),
            http,
        })
    }

    pub fn router(&self) -> &Arc<RouterCore> {
        &self.router
    }

    /// Registers a module reachable over HTTP at `manifest.url`.
    pub async fn register(&self, manifest: ModuleManifest) -> Result<ModuleInfo, RegistryError> {
        let client = HttpModuleClient::with_client(&manifest.name, &manifest.url, self.http.clone());
        self.register_with_client(manifest, Arc::new(client)).await
    }

    /// Registers a module reached through `client`.
    ///
    /// Registering a name again refreshes that module: its routes are
    /// replaced and its client swapped. Socket namespaces follow
    /// first-registration-wins and keep the handler they were first
    /// registered with; namespaces served by another module are skipped
    /// with a warning.
    pub async fn register_with_client(
        &self,
        manifest: ModuleManifest,
        client: Arc<dyn ModuleClient>,
    ) -> Result<ModuleInfo, RegistryError> {
        manifest.validate()?;
        let ModuleManifest {
            name,
            url,
            routes,
            sockets,
        } = manifest;

        info!("📦 Registering module '{}' at {}", name, url);

        let route_count = self.router.register_routes(&name, routes).await?;
        self.router.connect_module(&name, client.clone());

        let mut namespaces = Vec::new();
        for socket in sockets {
            let handler = Arc::new(RemoteSocketHandler::new(&name, socket.path.clone(), client.clone()));
            if self.router.register_socket(SocketDescriptor::new(socket.path.clone(), handler)) {
                namespaces.push(socket.path);
            } else if !self.owns_namespace(&name, &socket.path) {
                warn!(
                    "⚠️ Module '{}' asked for namespace '{}' which is already served",
                    name, socket.path
                );
            } else {
                namespaces.push(socket.path);
            }
        }

        let info = ModuleInfo {
            name: name.clone(),
            url,
            status: ModuleStatus::Serving,
            registered_at: current_timestamp(),
            route_count,
            namespaces,
        };
        self.modules.insert(name.clone(), info.clone());
        info!(
            "✅ Module '{}' registered: {} route(s), {} namespace(s)",
            name,
            info.route_count,
            info.namespaces.len()
        );
        Ok(info)
    }

    fn owns_namespace(&self, module: &str, namespace: &str) -> bool {
        self.modules
            .get(module)
            .is_some_and(|info| info.namespaces.iter().any(|ns| ns == namespace))
    }

    /// Unregisters a module and removes its routes.
    pub async fn unregister(&self, name: &str) -> Result<ModuleInfo, RegistryError> {
        let (_, info) = self
            .modules
            .remove(name)
            .ok_or_else(|| RegistryError::ModuleNotFound(name.to_string()))?;
        self.router.remove_module(name).await;
        info!("🔌 Module '{}' unregistered", name);
        Ok(info)
    }

    /// All registered modules, sorted by name.
    pub fn list(&self) -> Vec<ModuleInfo> {
        let mut modules: Vec<ModuleInfo> = self.modules.iter().map(|entry| entry.value().clone()).collect();
        modules.sort_by(|a, b| a.name.cmp(&b.name));
        modules
    }

    pub fn get(&self, name: &str) -> Option<ModuleInfo> {
        self.modules.get(name).map(|entry| entry.value().clone())
    }

    /// Gets the number of registered modules.
    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    /// Gets a list of registered module names.
    pub fn module_names(&self) -> Vec<String> {
        self.modules.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Checks if a module with the given name is registered.
    pub fn is_registered(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    /// Updates a module's status, logging transitions.
    pub fn set_status(&self, name: &str, status: ModuleStatus) -> Result<(), RegistryError> {
        let mut info = self
            .modules
            .get_mut(name)
            .ok_or_else(|| RegistryError::ModuleNotFound(name.to_string()))?;
        if info.status != status {
            match status {
                ModuleStatus::Serving => info!("💚 Module '{}' is serving again", name),
                ModuleStatus::Unreachable => warn!("💔 Module '{}' became unreachable", name),
            }
            info.status = status;
        }
        Ok(())
    }

    /// Pings every module's client and records the outcome.
    ///
    /// Returns the number of modules currently serving.
    pub async fn check_health(&self, clients: &[(String, Arc<dyn ModuleClient>)]) -> usize {
        let mut serving = 0;
        for (name, client) in clients {
            let status = match client.ping().await {
                Ok(()) => {
                    serving += 1;
                    ModuleStatus::Serving
                }
                Err(e) => {
                    error!("❌ Health check for module '{}' failed: {}", name, e.message);
                    ModuleStatus::Unreachable
                }
            };
            if let Err(e) = self.set_status(name, status) {
                warn!("⚠️ {}", e);
            }
        }
        serving
    }

    /// Health-checks every connected module.
    pub async fn check_all(&self) -> usize {
        self.check_health(&self.router.module_clients()).await
    }

    /// Unregisters every module.
    pub async fn shutdown(&self) {
        info!("🛑 Unregistering {} module(s)", self.modules.len());
        for name in self.module_names() {
            if let Err(e) = self.unregister(&name).await {
                warn!("⚠️ Failed to unregister module '{}': {}", name, e);
            }
        }
        info!("🧹 Module registry cleared");
    }
}
