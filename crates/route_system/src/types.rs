//! # Core Type Definitions
//!
//! Identifier and verb types shared by every part of the gateway.
//!
//! ## Key Types
//!
//! - [`SocketId`] - Unique identifier for a real-time connection
//! - [`RoomId`] - Name of a room a connection can join or be targeted through
//! - [`RouteAction`] - HTTP verb a route descriptor is registered for

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a real-time connection.
///
/// This is a wrapper around UUID so socket ids cannot be confused with module
/// names or room names. Every connection is implicitly a member of the room
/// named after its own id, which is what allows `receivers` lists to target
/// individual sockets.
///
/// # Examples
///
/// ```rust
/// use route_system::SocketId;
///
/// let socket_id = SocketId::new();
/// let parsed: SocketId = socket_id.to_string().parse()?;
/// assert_eq!(socket_id, parsed);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SocketId(pub Uuid);

impl SocketId {
    /// Creates a new random socket ID using UUID v4.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the name of the implicit room this socket belongs to.
    pub fn room(&self) -> RoomId {
        self.0.to_string()
    }
}

impl Default for SocketId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::str::FromStr for SocketId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl std::fmt::Display for SocketId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Room identifier. Rooms are plain strings chosen by modules.
pub type RoomId = String;

/// HTTP verb a route is registered for.
///
/// Serialized in upper case (`"GET"`, `"POST"`, ...) which is the form modules
/// ship in their manifests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RouteAction {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl RouteAction {
    /// All verbs, in the order route tables are listed.
    pub const ALL: [RouteAction; 5] = [
        RouteAction::Get,
        RouteAction::Post,
        RouteAction::Put,
        RouteAction::Patch,
        RouteAction::Delete,
    ];

    /// Upper-case verb name.
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteAction::Get => "GET",
            RouteAction::Post => "POST",
            RouteAction::Put => "PUT",
            RouteAction::Patch => "PATCH",
            RouteAction::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for RouteAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RouteAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(RouteAction::Get),
            "POST" => Ok(RouteAction::Post),
            "PUT" => Ok(RouteAction::Put),
            "PATCH" => Ok(RouteAction::Patch),
            "DELETE" => Ok(RouteAction::Delete),
            other => Err(format!("unsupported route action '{other}'")),
        }
    }
}

/// Current Unix timestamp in seconds.
pub fn current_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
