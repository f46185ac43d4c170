//! Request normalization.
//!
//! Inbound HTTP requests carry parameters in three places. [`normalize`]
//! folds them into one map so the validator and the module see a single
//! parameter set, with precedence query < body < path.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Request as seen by the HTTP surface, before normalization.
#[derive(Debug, Clone, Default)]
pub struct RawRequest {
    /// Query parameters. Repeated keys are already grouped into arrays.
    pub query: Map<String, Value>,
    /// Decoded body. Anything other than an object is ignored.
    pub body: Value,
    /// Values captured by `:name` route segments.
    pub path_params: Map<String, Value>,
    pub headers: Map<String, Value>,
    /// Request-scoped context attached by upstream middleware.
    pub context: Option<Value>,
    /// Mount prefix the route table is served under.
    pub base_url: String,
    /// Path relative to `base_url`.
    pub path: String,
}

impl RawRequest {
    pub fn new(base_url: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            path: path.into(),
            ..Self::default()
        }
    }

    /// Groups decoded query pairs, turning repeated keys into arrays.
    pub fn with_query_pairs<I>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in pairs {
            match self.query.get_mut(&key) {
                Some(Value::Array(values)) => values.push(Value::String(value)),
                Some(existing) => {
                    let first = existing.take();
                    *existing = Value::Array(vec![first, Value::String(value)]);
                }
                None => {
                    self.query.insert(key, Value::String(value));
                }
            }
        }
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }

    pub fn with_path_params(mut self, path_params: Map<String, Value>) -> Self {
        self.path_params = path_params;
        self
    }

    pub fn with_headers(mut self, headers: Map<String, Value>) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_context(mut self, context: Value) -> Self {
        self.context = Some(context);
        self
    }
}

/// The single parameter view handed to validation and dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRequest {
    pub context: Value,
    pub params: Map<String, Value>,
    pub headers: Map<String, Value>,
    /// Full path, mount prefix included.
    pub path: String,
}

/// Merges query, body and path parameters into one map.
///
/// Query strings containing `,` are split into arrays. A truthy `populate`
/// parameter always ends up as an array. Never fails.
///
/// # Examples
///
/// ```rust
/// use route_system::{normalize, RawRequest};
/// use serde_json::json;
///
/// let raw = RawRequest::new("/api", "/users")
///     .with_query_pairs(vec![("fields".to_string(), "a,b".to_string())]);
/// let normalized = normalize(raw);
/// assert_eq!(normalized.params["fields"], json!(["a", "b"]));
/// assert_eq!(normalized.path, "/api/users");
/// ```
pub fn normalize(raw: RawRequest) -> NormalizedRequest {
    let RawRequest {
        query,
        body,
        path_params,
        headers,
        context,
        base_url,
        path,
    } = raw;

    let mut params = Map::new();

    for (key, value) in query {
        let value = match value {
            Value::String(text) if text.contains(',') => split_commas(&text),
            other => other,
        };
        params.insert(key, value);
    }

    if let Value::Object(body) = body {
        params.extend(body);
    }

    params.extend(path_params);

    if let Some(populate) = params.get_mut("populate") {
        if is_truthy(populate) {
            *populate = match populate.take() {
                Value::String(text) if text.contains(',') => split_commas(&text),
                Value::Array(items) => Value::Array(items),
                scalar => Value::Array(vec![scalar]),
            };
        }
    }

    NormalizedRequest {
        context: context.unwrap_or_else(|| Value::Object(Map::new())),
        params,
        headers,
        path: format!("{base_url}{path}"),
    }
}

fn split_commas(text: &str) -> Value {
    Value::Array(text.split(',').map(|part| Value::String(part.to_string())).collect())
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
