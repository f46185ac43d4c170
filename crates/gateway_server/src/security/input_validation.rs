//! Input validation for socket frames.

use super::SecurityError;
use crate::config::SecurityConfig;
use serde_json::Value;

/// Longest event name a client may send
const MAX_EVENT_NAME_LENGTH: usize = 128;

/// Validates a JSON frame against the configured limits and returns the
/// parsed value.
pub fn validate_json_message(message: &[u8], config: &SecurityConfig) -> Result<Value, SecurityError> {
    // Check message size
    if message.len() > config.max_message_size {
        return Err(SecurityError::MessageTooLarge(message.len()));
    }

    let json: Value =
        serde_json::from_slice(message).map_err(|e| SecurityError::InvalidMessageFormat(e.to_string()))?;

    validate_json_value(&json, 0, config)?;
    Ok(json)
}

/// Recursively validates a JSON value
fn validate_json_value(value: &Value, depth: usize, config: &SecurityConfig) -> Result<(), SecurityError> {
    if depth > config.max_json_depth {
        return Err(SecurityError::InvalidMessageFormat("JSON nesting too deep".to_string()));
    }

    match value {
        Value::String(s) => {
            if s.len() > config.max_string_length {
                return Err(SecurityError::InvalidMessageFormat(format!(
                    "String too long: {} characters",
                    s.len()
                )));
            }
            validate_string_content(s)?;
        }
        Value::Array(arr) => {
            if arr.len() > config.max_collection_size {
                return Err(SecurityError::InvalidMessageFormat(format!(
                    "Array too large: {} elements",
                    arr.len()
                )));
            }
            for item in arr {
                validate_json_value(item, depth + 1, config)?;
            }
        }
        Value::Object(obj) => {
            if obj.len() > config.max_collection_size {
                return Err(SecurityError::InvalidMessageFormat(format!(
                    "Object too large: {} keys",
                    obj.len()
                )));
            }
            for (key, val) in obj {
                if key.len() > config.max_string_length {
                    return Err(SecurityError::InvalidMessageFormat(format!(
                        "Object key too long: {} characters",
                        key.len()
                    )));
                }
                validate_string_content(key)?;
                validate_json_value(val, depth + 1, config)?;
            }
        }
        Value::Number(_) | Value::Bool(_) | Value::Null => {}
    }

    Ok(())
}

/// Rejects strings carrying NUL bytes or runs of control characters
fn validate_string_content(s: &str) -> Result<(), SecurityError> {
    if s.contains('\0') {
        return Err(SecurityError::MaliciousContent);
    }

    let control_char_count = s
        .chars()
        .filter(|c| c.is_control() && *c != '\n' && *c != '\r' && *c != '\t')
        .count();
    if control_char_count > 5 {
        return Err(SecurityError::MaliciousContent);
    }

    Ok(())
}

/// Validates an event name sent by a client.
///
/// Module events are free-form (`message:send`, `room.join`), so only
/// length and printable ASCII are enforced.
pub fn validate_event_name(event_name: &str) -> Result<(), SecurityError> {
    if event_name.is_empty() || event_name.len() > MAX_EVENT_NAME_LENGTH {
        return Err(SecurityError::InvalidMessageFormat("Invalid event name length".to_string()));
    }

    if !event_name.chars().all(|c| c.is_ascii_graphic()) {
        return Err(SecurityError::InvalidMessageFormat(
            "Invalid event name characters".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_simple_frame() {
        let json = br#"{"event": "message", "args": [{"text": "hi"}, 3]}"#;
        let value = validate_json_message(json, &SecurityConfig::default()).unwrap();
        assert_eq!(value["event"], "message");
    }

    #[test]
    fn test_reject_oversized_frame() {
        let config = SecurityConfig {
            max_message_size: 32,
            ..SecurityConfig::default()
        };
        let json = format!(r#"{{"event": "x", "args": ["{}"]}}"#, "y".repeat(64));
        assert!(matches!(
            validate_json_message(json.as_bytes(), &config),
            Err(SecurityError::MessageTooLarge(_))
        ));
    }

    #[test]
    fn test_reject_deep_nesting() {
        let mut json = String::from("{");
        for _ in 0..20 {
            json.push_str(r#""nested": {"#);
        }
        json.push_str(r#""value": true"#);
        for _ in 0..20 {
            json.push('}');
        }
        json.push('}');

        assert!(validate_json_message(json.as_bytes(), &SecurityConfig::default()).is_err());
    }

    #[test]
    fn test_reject_nul_bytes() {
        let json = br#"{"event": "x", "args": ["a\u0000b"]}"#;
        assert_eq!(
            validate_json_message(json, &SecurityConfig::default()),
            Err(SecurityError::MaliciousContent)
        );
    }

    #[test]
    fn test_custom_config_validation() {
        let config = SecurityConfig {
            max_string_length: 5,
            max_collection_size: 2,
            max_json_depth: 2,
            ..SecurityConfig::default()
        };

        let json = br#"{"key": "toolong"}"#;
        assert!(validate_json_message(json, &config).is_err());

        let json = br#"{"key": "ok"}"#;
        assert!(validate_json_message(json, &config).is_ok());

        let json = br#"{"args": [1, 2, 3]}"#;
        assert!(validate_json_message(json, &config).is_err());
    }

    #[test]
    fn test_not_json() {
        assert!(matches!(
            validate_json_message(b"hello", &SecurityConfig::default()),
            Err(SecurityError::InvalidMessageFormat(_))
        ));
    }

    #[test]
    fn test_validate_event_name() {
        assert!(validate_event_name("message").is_ok());
        assert!(validate_event_name("message:send").is_ok());
        assert!(validate_event_name("room.join").is_ok());
        assert!(validate_event_name("").is_err());
        assert!(validate_event_name("has space").is_err());
        assert!(validate_event_name(&"x".repeat(200)).is_err());
    }
}
