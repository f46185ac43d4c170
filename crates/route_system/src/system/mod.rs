/// Router system - broken down into manageable components
mod core;
mod dispatcher;
mod path_router;
mod stats;

// Re-export all public items from submodules
pub use self::core::RouterCore;
pub use dispatcher::{SocketDispatcher, SocketEmitter};
pub use path_router::{PathRouter, RouteEntry, RouteMatch};
pub use stats::RouterStats;
