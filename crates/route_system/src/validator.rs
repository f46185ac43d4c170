//! Structural parameter validation and coercion.
//!
//! [`validate`] walks a [`ParameterSchema`] in declaration order against a
//! merged parameter map, coercing values in place and stopping at the first
//! violation. Every failure is a [`RouteError::UserInput`] naming the field.

use crate::error::RouteError;
use crate::schema::{ArrayElement, ParameterSchema, PrimitiveType, TypeSpec};
use serde_json::{Map, Number, Value};

/// Validates and coerces `params` against `schema`.
///
/// Optional leaves that are absent or `null` are removed from the map.
/// Numeric strings declared as `Number` are replaced by numbers.
///
/// # Examples
///
/// ```rust
/// use route_system::{validate, ParameterSchema, PrimitiveType, TypeSpec};
/// use serde_json::json;
///
/// let schema = ParameterSchema::new().field("name", TypeSpec::required(PrimitiveType::Number));
/// let mut params = json!({"name": "42"}).as_object().cloned().unwrap_or_default();
/// validate(&mut params, &schema)?;
/// assert_eq!(params["name"], json!(42));
/// # Ok::<(), route_system::RouteError>(())
/// ```
pub fn validate(params: &mut Map<String, Value>, schema: &ParameterSchema) -> Result<(), RouteError> {
    for (key, spec) in schema.iter() {
        match spec {
            TypeSpec::Array(element) => validate_array(key, params.get_mut(key), element)?,
            TypeSpec::Leaf { ty, required } => {
                let value = params.get_mut(key).map(Value::take);
                match validate_scalar(key, *ty, value, *required)? {
                    Some(coerced) => match params.get_mut(key) {
                        Some(slot) => *slot = coerced,
                        None => {
                            params.insert(key.to_string(), coerced);
                        }
                    },
                    // Keeps the remaining keys in request order
                    None => {
                        params.shift_remove(key);
                    }
                }
            }
            TypeSpec::Object { required, fields } => {
                validate_object(key, params.get_mut(key), *required, fields)?
            }
        }
    }
    Ok(())
}

fn validate_array(field: &str, value: Option<&mut Value>, element: &ArrayElement) -> Result<(), RouteError> {
    match element {
        ArrayElement::Composite { required, .. } => {
            if *required && is_nil(value.as_deref()) {
                return Err(RouteError::user_input(format!("{field} is required")));
            }
            Ok(())
        }
        ArrayElement::Scalar(ty) => {
            let Some(Value::Array(items)) = value else {
                return Err(RouteError::user_input(format!("{field} must be an array")));
            };
            for (index, item) in items.iter_mut().enumerate() {
                let name = format!("{field}[{index}]");
                let coerced = validate_scalar(&name, *ty, Some(item.take()), false)?;
                *item = coerced.unwrap_or(Value::Null);
            }
            Ok(())
        }
    }
}

fn validate_object(
    field: &str,
    value: Option<&mut Value>,
    required: bool,
    fields: &ParameterSchema,
) -> Result<(), RouteError> {
    let value = match value {
        Some(value) if !value.is_null() => value,
        _ if required => return Err(RouteError::user_input(format!("{field} is required"))),
        _ => return Ok(()),
    };
    match value {
        Value::Object(nested) => validate(nested, fields),
        _ => Err(RouteError::user_input(format!("{field} must be an object"))),
    }
}

/// Checks a single scalar. `Ok(None)` means the value is absent and optional.
fn validate_scalar(
    field: &str,
    ty: PrimitiveType,
    value: Option<Value>,
    required: bool,
) -> Result<Option<Value>, RouteError> {
    let value = match value {
        Some(value) if !value.is_null() => value,
        _ if required => return Err(RouteError::user_input(format!("{field} is required"))),
        _ => return Ok(None),
    };

    match ty {
        PrimitiveType::String | PrimitiveType::ObjectId => match value {
            Value::String(_) => Ok(Some(value)),
            _ => Err(RouteError::user_input(format!("{field} must be a string"))),
        },
        PrimitiveType::Number => match value {
            Value::Number(_) => Ok(Some(value)),
            Value::String(text) => coerce_number(&text)
                .map(Some)
                .ok_or_else(|| RouteError::user_input(format!("{field} must be a number"))),
            _ => Err(RouteError::user_input(format!("{field} must be a number"))),
        },
        PrimitiveType::Boolean => match value {
            Value::Bool(_) => Ok(Some(value)),
            _ => Err(RouteError::user_input(format!("{field} must be a boolean"))),
        },
        PrimitiveType::Date | PrimitiveType::Json => Ok(Some(value)),
    }
}

fn is_nil(value: Option<&Value>) -> bool {
    matches!(value, None | Some(Value::Null))
}

/// Converts numeric text to a JSON number.
///
/// Surrounding whitespace is ignored, blank text is zero, and `0x`/`0o`/`0b`
/// prefixes are honored. Integral results become JSON integers. Text that
/// does not denote a finite number yields `None`.
fn coerce_number(text: &str) -> Option<Value> {
    let text = text.trim();
    if text.is_empty() {
        return Some(Value::from(0));
    }

    let radix = match text.get(..2) {
        Some("0x") | Some("0X") => Some(16),
        Some("0o") | Some("0O") => Some(8),
        Some("0b") | Some("0B") => Some(2),
        _ => None,
    };
    if let Some(radix) = radix {
        return u64::from_str_radix(&text[2..], radix).ok().map(Value::from);
    }

    // `f64::from_str` also accepts "inf" and "nan" spellings.
    if !text.bytes().all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'e' | b'E' | b'+' | b'-')) {
        return None;
    }
    let number: f64 = text.parse().ok()?;
    if !number.is_finite() {
        return None;
    }

    const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;
    if number.fract() == 0.0 && number.abs() <= MAX_SAFE_INTEGER {
        return Some(Value::from(number as i64));
    }
    Number::from_f64(number).map(Value::Number)
}
