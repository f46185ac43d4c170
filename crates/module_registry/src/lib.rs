//! Module registry for the gateway.
//!
//! This crate tracks the remote modules composing the gateway: it accepts
//! their manifests, registers their descriptors with the router, reaches
//! them over HTTP and keeps track of which of them are alive.

mod client;
mod error;
mod manager;
mod manifest;

pub use client::{HttpModuleClient, RemoteSocketHandler};
pub use error::RegistryError;
pub use manager::ModuleRegistry;
pub use manifest::{ModuleInfo, ModuleManifest, ModuleStatus};
