//! Error types for the module registry.

use route_system::RouteError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Invalid manifest: {0}")]
    InvalidManifest(String),

    #[error("Module not found: {0}")]
    ModuleNotFound(String),

    #[error("Route registration failed: {0}")]
    Route(#[from] RouteError),

    #[error("Transport error: {0}")]
    Transport(String),
}

impl RegistryError {
    /// HTTP status code equivalent for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            RegistryError::InvalidManifest(_) => 400,
            RegistryError::ModuleNotFound(_) => 404,
            RegistryError::Route(e) => e.status_code(),
            RegistryError::Transport(_) => 502,
        }
    }
}
