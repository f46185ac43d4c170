//! # Route System
//!
//! The routing core of the module gateway. Modules describe what they expose
//! with descriptors; this crate turns those descriptors into live dispatch
//! without any static knowledge of the module's shape.
//!
//! ## Core Features
//!
//! - **Route Descriptors**: path, verb, handler and a recursive parameter schema
//! - **Parameter Validation**: required-ness, scalar coercion and nested objects
//! - **Request Normalization**: query, body and path merged into one parameter map
//! - **Socket Dispatch**: one handler per namespace, any event name forwarded
//! - **Module RPC Contract**: transport-agnostic [`ModuleClient`] trait
//!
//! ## Quick Start Example
//!
//! ```rust,no_run
//! use route_system::*;
//! use std::sync::Arc;
//!
//! # async fn run(emitter: Arc<dyn SocketEmitter>, client: Arc<dyn ModuleClient>) -> Result<(), RouteError> {
//! let router = RouterCore::new(emitter).with_mount_prefix("/api");
//! router.connect_module("users", client);
//! router
//!     .register_routes(
//!         "users",
//!         vec![RouteDescriptor::new("/users/:id", RouteAction::Get, "getUser")
//!             .with_params(ParameterSchema::new().field("id", TypeSpec::required(PrimitiveType::Number)))],
//!     )
//!     .await?;
//!
//! let result = router
//!     .handle_http(RouteAction::Get, RawRequest::new("", "/users/42"))
//!     .await?;
//! println!("{result}");
//! # Ok(())
//! # }
//! ```

// Core modules
pub mod descriptor;
pub mod error;
pub mod normalizer;
pub mod rpc;
pub mod schema;
pub mod shutdown;
pub mod system;
pub mod types;
pub mod validator;

// Re-export commonly used items for convenience
pub use descriptor::{
    EventResponse, FnSocketHandler, JoinRoomResponse, ReturnDefinition, RouteDescriptor,
    SocketDescriptor, SocketHandler, SocketInput, SocketRequest, SocketResponse,
};
pub use error::RouteError;
pub use normalizer::{normalize, NormalizedRequest, RawRequest};
pub use rpc::{ModuleClient, RpcError, RpcRequest, RpcResponse, RpcStatus};
pub use schema::{ArrayElement, ParameterSchema, PrimitiveType, TypeSpec};
pub use shutdown::{InFlightGuard, ShutdownState};
pub use system::{
    PathRouter, RouteEntry, RouteMatch, RouterCore, RouterStats, SocketDispatcher, SocketEmitter,
};
pub use types::*;
pub use validator::validate;

// External dependencies that modules commonly need
pub use async_trait::async_trait;
pub use serde_json;
