use reqwest::Method;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// Scalar value of a request parameter.
///
/// Lists and nested objects are never parameters on their own; the endpoint
/// layer JSON-encodes them into a `Str` (e.g. `batchOrders`).
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Str(String),
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => f.write_str(s),
            Self::Int(v) => write!(f, "{}", v),
            Self::UInt(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::Bool(v) => write!(f, "{}", v),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<&String> for ParamValue {
    fn from(value: &String) -> Self {
        Self::Str(value.clone())
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for ParamValue {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}

impl From<u64> for ParamValue {
    fn from(value: u64) -> Self {
        Self::UInt(value)
    }
}

impl From<u32> for ParamValue {
    fn from(value: u32) -> Self {
        Self::UInt(value.into())
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Ordered request parameter mapping.
///
/// Insertion order is preserved all the way to the wire: the signature is
/// computed over the encoded string in this order and the server verifies it
/// against the same order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params(Vec<(String, ParamValue)>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`Params::insert`].
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Builder form that skips `None`.
    #[must_use]
    pub fn with_opt<V: Into<ParamValue>>(mut self, key: impl Into<String>, value: Option<V>) -> Self {
        if let Some(value) = value {
            self.insert(key, value);
        }
        self
    }

    /// Insert a parameter. An existing key keeps its position and gets the new value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        let key = key.into();
        let value = value.into();
        if let Some(slot) = self.0.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            self.0.push((key, value));
        }
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Append `other`, overriding keys already present.
    #[must_use]
    pub fn merge(mut self, other: Params) -> Self {
        for (k, v) in other.0 {
            self.insert(k, v);
        }
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    /// Stringified `(key, value)` pairs in insertion order.
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        self.0
            .iter()
            .map(|(k, v)| (k.clone(), v.to_string()))
            .collect()
    }

    /// `application/x-www-form-urlencoded` rendering, in insertion order.
    pub fn to_query_string(&self) -> String {
        serde_urlencoded::to_string(self.to_pairs()).unwrap_or_default()
    }
}

impl<K: Into<String>, V: Into<ParamValue>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}

/// One REST call as issued by the endpoint layer.
///
/// A clone of the unsigned descriptor is what a public retry resends, so each
/// attempt is signed (or not) from the original parameters.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub method: Method,
    /// Logical operation name, used for logging only.
    pub operation: String,
    pub path: String,
    pub params: Params,
    pub private: bool,
}

impl RequestDescriptor {
    pub fn new(method: Method, operation: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method,
            operation: operation.into(),
            path: path.into(),
            params: Params::new(),
            private: false,
        }
    }

    pub fn get(operation: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(Method::GET, operation, path)
    }

    pub fn post(operation: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(Method::POST, operation, path)
    }

    pub fn put(operation: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(Method::PUT, operation, path)
    }

    pub fn delete(operation: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, operation, path)
    }

    #[must_use]
    pub fn private(mut self) -> Self {
        self.private = true;
        self
    }

    #[must_use]
    pub fn params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }
}

/// Decoded response of a successful call.
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse {
    /// Payload exactly as decoded from the body.
    pub data: Value,
    /// Last reported weight (or order count), when `show_limit_usage` is set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit_usage: Option<u64>,
    /// Raw response headers, when `show_header` is set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header: Option<HashMap<String, String>>,
}

impl ApiResponse {
    pub fn new(data: Value) -> Self {
        Self {
            data,
            limit_usage: None,
            header: None,
        }
    }

    /// Deserialize the payload into a typed value.
    pub fn into_typed<T: serde::de::DeserializeOwned>(
        self,
    ) -> Result<T, crate::core::errors::ExchangeError> {
        serde_json::from_value(self.data).map_err(Into::into)
    }
}
