//! Module manifests and the registry read model.

use crate::error::RegistryError;
use route_system::{RouteDescriptor, SocketInput};
use serde::{Deserialize, Serialize};

/// Registration payload a module sends to the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleManifest {
    /// Unique module name, used as the route owner
    pub name: String,
    /// Base URL the module serves RPC calls on
    pub url: String,
    #[serde(default)]
    pub routes: Vec<RouteDescriptor>,
    #[serde(default)]
    pub sockets: Vec<SocketInput>,
}

impl ModuleManifest {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            routes: Vec::new(),
            sockets: Vec::new(),
        }
    }

    pub fn with_route(mut self, route: RouteDescriptor) -> Self {
        self.routes.push(route);
        self
    }

    pub fn with_socket(mut self, namespace: impl Into<String>) -> Self {
        self.sockets.push(SocketInput { path: namespace.into() });
        self
    }

    /// Checks the manifest before anything is registered.
    pub fn validate(&self) -> Result<(), RegistryError> {
        if self.name.is_empty()
            || !self
                .name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(RegistryError::InvalidManifest(format!(
                "module name '{}' must be non-empty and contain only letters, digits, '-' or '_'",
                self.name
            )));
        }

        if !(self.url.starts_with("http://") || self.url.starts_with("https://")) {
            return Err(RegistryError::InvalidManifest(format!(
                "module '{}' url '{}' must be http(s)",
                self.name, self.url
            )));
        }

        for route in &self.routes {
            route.validate()?;
        }

        for socket in &self.sockets {
            if !socket.path.starts_with('/') {
                return Err(RegistryError::InvalidManifest(format!(
                    "socket namespace '{}' must start with '/'",
                    socket.path
                )));
            }
        }

        Ok(())
    }
}

/// Reachability of a registered module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleStatus {
    Serving,
    Unreachable,
}

/// What the registry exposes about a module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleInfo {
    pub name: String,
    pub url: String,
    pub status: ModuleStatus,
    /// Unix timestamp of the latest registration
    pub registered_at: u64,
    pub route_count: usize,
    /// Namespaces this module won. Namespaces already taken are not listed.
    pub namespaces: Vec<String>,
}
