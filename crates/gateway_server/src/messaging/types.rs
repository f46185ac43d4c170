//! Frame type definitions for client-server socket communication.
//!
//! Clients talk to a namespace by sending named events with positional
//! arguments, and the gateway answers the same way:
//!
//! ```json
//! {"event": "message", "args": [{"text": "hello"}]}
//! {"event": "message", "data": [{"text": "hello", "from": "..."}]}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A frame sent from a client to the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientFrame {
    /// Event name, forwarded to the namespace handler unchanged
    pub event: String,

    /// Positional event arguments
    #[serde(default)]
    pub args: Vec<Value>,
}

/// A frame sent from the gateway to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerFrame {
    pub event: String,
    pub data: Vec<Value>,
}

#[derive(Serialize)]
struct ServerFrameRef<'a> {
    event: &'a str,
    data: &'a [Value],
}

impl ServerFrame {
    /// Encodes a frame without copying the payload.
    pub fn encode(event: &str, data: &[Value]) -> Result<String, serde_json::Error> {
        serde_json::to_string(&ServerFrameRef { event, data })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_args_default_to_empty() {
        let frame: ClientFrame = serde_json::from_str(r#"{"event": "ping"}"#).unwrap();
        assert_eq!(frame.event, "ping");
        assert!(frame.args.is_empty());
    }

    #[test]
    fn test_server_frame_encoding() {
        let text = ServerFrame::encode("said", &[json!("hi"), json!(2)]).unwrap();
        let frame: ServerFrame = serde_json::from_str(&text).unwrap();
        assert_eq!(frame.event, "said");
        assert_eq!(frame.data, vec![json!("hi"), json!(2)]);
    }
}
