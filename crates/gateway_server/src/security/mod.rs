//! Security module for socket frame validation.

pub mod input_validation;

pub use input_validation::{validate_event_name, validate_json_message};

/// Reasons an inbound frame is refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SecurityError {
    #[error("Message too large: {0} bytes")]
    MessageTooLarge(usize),

    #[error("Invalid message format: {0}")]
    InvalidMessageFormat(String),

    #[error("Malicious content detected")]
    MaliciousContent,
}
