//! Parameter schemas.
//!
//! Modules describe the parameters of a route with a loose, recursive JSON
//! shape. This module decodes that shape into a closed tree so the validator
//! can match on it exhaustively:
//!
//! | wire form                                   | decoded as                  |
//! |---------------------------------------------|-----------------------------|
//! | `"String"`                                  | `Leaf { ty, required: false }` |
//! | `{"type": "Number", "required": true}`      | `Leaf { ty, required }`     |
//! | `{"required": true, "street": "String"}`    | `Object { required, fields }` |
//! | `["String"]` / `[{"type": "String"}]`       | `Array(element)`            |
//!
//! Field order is preserved from the wire, which fixes the order in which
//! violations are reported.

use crate::error::RouteError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Primitive type tags understood by the validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimitiveType {
    String,
    Number,
    Boolean,
    Date,
    ObjectId,
    #[serde(rename = "JSON")]
    Json,
}

impl PrimitiveType {
    /// Wire tag for this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            PrimitiveType::String => "String",
            PrimitiveType::Number => "Number",
            PrimitiveType::Boolean => "Boolean",
            PrimitiveType::Date => "Date",
            PrimitiveType::ObjectId => "ObjectId",
            PrimitiveType::Json => "JSON",
        }
    }

    /// Parses a wire tag.
    pub fn from_tag(tag: &str) -> Result<Self, RouteError> {
        match tag {
            "String" => Ok(PrimitiveType::String),
            "Number" => Ok(PrimitiveType::Number),
            "Boolean" => Ok(PrimitiveType::Boolean),
            "Date" => Ok(PrimitiveType::Date),
            "ObjectId" => Ok(PrimitiveType::ObjectId),
            "JSON" => Ok(PrimitiveType::Json),
            other => Err(RouteError::InvalidDescriptor(format!(
                "unknown type tag '{other}'"
            ))),
        }
    }
}

impl std::fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type description of a single parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeSpec {
    /// A scalar of the given primitive type.
    Leaf { ty: PrimitiveType, required: bool },
    /// A nested object validated recursively against `fields`.
    Object { required: bool, fields: ParameterSchema },
    /// A sequence described by a single element spec.
    Array(ArrayElement),
}

/// Element description of an array parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayElement {
    /// Every element is a scalar of this type.
    Scalar(PrimitiveType),
    /// Elements are objects. Only the presence of the array itself is
    /// enforced, and only when `required` is set.
    Composite { required: bool, spec: Box<TypeSpec> },
}

impl TypeSpec {
    /// Optional leaf of the given type.
    pub fn leaf(ty: PrimitiveType) -> Self {
        TypeSpec::Leaf { ty, required: false }
    }

    /// Required leaf of the given type.
    pub fn required(ty: PrimitiveType) -> Self {
        TypeSpec::Leaf { ty, required: true }
    }

    /// Array of scalars.
    pub fn array_of(ty: PrimitiveType) -> Self {
        TypeSpec::Array(ArrayElement::Scalar(ty))
    }

    /// Whether the parameter must be present.
    pub fn is_required(&self) -> bool {
        match self {
            TypeSpec::Leaf { required, .. } | TypeSpec::Object { required, .. } => *required,
            TypeSpec::Array(ArrayElement::Scalar(_)) => true,
            TypeSpec::Array(ArrayElement::Composite { required, .. }) => *required,
        }
    }

    /// Decodes one field spec from its wire form.
    pub fn from_value(field: &str, value: &Value) -> Result<Self, RouteError> {
        match value {
            Value::String(tag) => Ok(TypeSpec::leaf(PrimitiveType::from_tag(tag)?)),
            Value::Array(items) => {
                let [element] = items.as_slice() else {
                    return Err(RouteError::InvalidDescriptor(format!(
                        "array spec for '{field}' must have exactly one element, found {}",
                        items.len()
                    )));
                };
                let element = match element {
                    Value::String(tag) => ArrayElement::Scalar(PrimitiveType::from_tag(tag)?),
                    Value::Object(obj) => ArrayElement::Composite {
                        required: required_flag(field, obj)?,
                        spec: Box::new(TypeSpec::from_value(field, element)?),
                    },
                    Value::Array(_) => ArrayElement::Composite {
                        required: false,
                        spec: Box::new(TypeSpec::from_value(field, element)?),
                    },
                    other => {
                        return Err(RouteError::InvalidDescriptor(format!(
                            "array element spec for '{field}' must be a tag or object, found {other}"
                        )))
                    }
                };
                Ok(TypeSpec::Array(element))
            }
            Value::Object(obj) => {
                let required = required_flag(field, obj)?;
                match obj.get("type") {
                    Some(Value::String(tag)) => Ok(TypeSpec::Leaf {
                        ty: PrimitiveType::from_tag(tag)?,
                        required,
                    }),
                    Some(other) => Err(RouteError::InvalidDescriptor(format!(
                        "type of '{field}' must be a tag string, found {other}"
                    ))),
                    None => {
                        let mut fields = ParameterSchema::new();
                        for (name, spec) in obj.iter().filter(|(name, _)| name.as_str() != "required") {
                            fields.push(name.clone(), TypeSpec::from_value(name, spec)?);
                        }
                        Ok(TypeSpec::Object { required, fields })
                    }
                }
            }
            other => Err(RouteError::InvalidDescriptor(format!(
                "spec for '{field}' must be a tag, object or array, found {other}"
            ))),
        }
    }

    /// Encodes this spec back into its wire form.
    pub fn to_value(&self) -> Value {
        match self {
            TypeSpec::Leaf { ty, required: false } => Value::String(ty.as_str().to_string()),
            TypeSpec::Leaf { ty, required: true } => {
                serde_json::json!({ "type": ty.as_str(), "required": true })
            }
            TypeSpec::Object { required, fields } => {
                let mut obj = Map::new();
                if *required {
                    obj.insert("required".to_string(), Value::Bool(true));
                }
                for (name, spec) in fields.iter() {
                    obj.insert(name.to_string(), spec.to_value());
                }
                Value::Object(obj)
            }
            TypeSpec::Array(ArrayElement::Scalar(ty)) => {
                Value::Array(vec![Value::String(ty.as_str().to_string())])
            }
            TypeSpec::Array(ArrayElement::Composite { required, spec }) => {
                let mut element = spec.to_value();
                if *required {
                    if let Value::Object(obj) = &mut element {
                        obj.insert("required".to_string(), Value::Bool(true));
                    }
                }
                Value::Array(vec![element])
            }
        }
    }
}

fn required_flag(field: &str, obj: &Map<String, Value>) -> Result<bool, RouteError> {
    match obj.get("required") {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(flag)) => Ok(*flag),
        Some(other) => Err(RouteError::InvalidDescriptor(format!(
            "required flag of '{field}' must be a boolean, found {other}"
        ))),
    }
}

/// Ordered mapping from parameter name to its type spec.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct ParameterSchema {
    fields: Vec<(String, TypeSpec)>,
}

impl ParameterSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`ParameterSchema::push`].
    pub fn field(mut self, name: impl Into<String>, spec: TypeSpec) -> Self {
        self.push(name, spec);
        self
    }

    /// Appends a field, replacing an existing field of the same name in place.
    pub fn push(&mut self, name: impl Into<String>, spec: TypeSpec) {
        let name = name.into();
        match self.fields.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => *slot = spec,
            None => self.fields.push((name, spec)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&TypeSpec> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, spec)| spec)
    }

    /// Fields in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TypeSpec)> {
        self.fields.iter().map(|(name, spec)| (name.as_str(), spec))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Decodes a schema from its wire form. `null` decodes to an empty schema.
    pub fn from_value(value: &Value) -> Result<Self, RouteError> {
        match value {
            Value::Null => Ok(Self::new()),
            Value::Object(obj) => {
                let mut schema = Self::new();
                for (name, spec) in obj {
                    schema.push(name.clone(), TypeSpec::from_value(name, spec)?);
                }
                Ok(schema)
            }
            other => Err(RouteError::InvalidDescriptor(format!(
                "parameter schema must be an object, found {other}"
            ))),
        }
    }

    pub fn to_value(&self) -> Value {
        Value::Object(
            self.fields
                .iter()
                .map(|(name, spec)| (name.clone(), spec.to_value()))
                .collect(),
        )
    }
}

impl TryFrom<Value> for ParameterSchema {
    type Error = RouteError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        ParameterSchema::from_value(&value)
    }
}

impl From<ParameterSchema> for Value {
    fn from(schema: ParameterSchema) -> Self {
        schema.to_value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decodes_every_wire_form() {
        let schema = ParameterSchema::from_value(&json!({
            "title": "String",
            "count": {"type": "Number", "required": true},
            "address": {"required": true, "street": "String", "zip": {"type": "Number"}},
            "tags": ["String"],
            "items": [{"required": true, "name": "String"}],
            "meta": "JSON"
        }))
        .unwrap();

        assert_eq!(schema.get("title"), Some(&TypeSpec::leaf(PrimitiveType::String)));
        assert_eq!(schema.get("count"), Some(&TypeSpec::required(PrimitiveType::Number)));
        assert_eq!(schema.get("tags"), Some(&TypeSpec::array_of(PrimitiveType::String)));
        assert_eq!(schema.get("meta"), Some(&TypeSpec::leaf(PrimitiveType::Json)));

        match schema.get("address") {
            Some(TypeSpec::Object { required, fields }) => {
                assert!(*required);
                let names: Vec<&str> = fields.iter().map(|(n, _)| n).collect();
                assert_eq!(names, vec!["street", "zip"]);
            }
            other => panic!("unexpected spec {other:?}"),
        }

        match schema.get("items") {
            Some(TypeSpec::Array(ArrayElement::Composite { required, .. })) => assert!(*required),
            other => panic!("unexpected spec {other:?}"),
        }
    }

    #[test]
    fn test_field_order_is_preserved() {
        let schema = ParameterSchema::from_value(&json!({"z": "String", "a": "Number", "m": "Boolean"}))
            .unwrap();
        let names: Vec<&str> = schema.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["z", "a", "m"]);
    }

    #[test]
    fn test_rejects_malformed_specs() {
        let unknown = ParameterSchema::from_value(&json!({"x": "Uuid"}));
        assert!(matches!(unknown, Err(RouteError::InvalidDescriptor(_))));

        let two_elements = ParameterSchema::from_value(&json!({"x": ["String", "Number"]}));
        assert!(matches!(two_elements, Err(RouteError::InvalidDescriptor(_))));

        let bad_flag = ParameterSchema::from_value(&json!({"x": {"type": "String", "required": "yes"}}));
        assert!(matches!(bad_flag, Err(RouteError::InvalidDescriptor(_))));

        let not_object = ParameterSchema::from_value(&json!(["String"]));
        assert!(matches!(not_object, Err(RouteError::InvalidDescriptor(_))));
    }

    #[test]
    fn test_serde_uses_wire_form() {
        let wire = json!({
            "name": {"type": "String", "required": true},
            "ids": ["ObjectId"],
            "profile": {"age": "Number"}
        });
        let schema: ParameterSchema = serde_json::from_value(wire.clone()).unwrap();
        assert_eq!(serde_json::to_value(&schema).unwrap(), wire);
    }
}
