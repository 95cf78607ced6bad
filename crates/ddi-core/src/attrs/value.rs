//! Attribute values
//!
//! Remote attribute bags hold scalars or lists of scalars. `Value` is the
//! tagged union the merge engine compares and copies.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// Operator-facing attribute map, keyed by attribute name
pub type AttributeMap = BTreeMap<String, Value>;

/// A single attribute value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Boolean flag
    Bool(bool),
    /// Integer or floating point number
    Number(serde_json::Number),
    /// Free-form string
    String(String),
    /// Ordered list of values
    List(Vec<Value>),
}

/// Coarse shape of a value, used to detect incompatible writers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Bool,
    Number,
    String,
    List,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Bool => "bool",
            ValueKind::Number => "number",
            ValueKind::String => "string",
            ValueKind::List => "list",
        };
        f.write_str(name)
    }
}

impl Value {
    /// The shape of this value
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Bool(_) => ValueKind::Bool,
            Value::Number(_) => ValueKind::Number,
            Value::String(_) => ValueKind::String,
            Value::List(_) => ValueKind::List,
        }
    }

    /// Convert from a JSON value
    ///
    /// Returns `None` for `null` and objects, which attribute bags can't hold.
    pub fn from_json(json: &serde_json::Value) -> Option<Self> {
        match json {
            serde_json::Value::Bool(b) => Some(Value::Bool(*b)),
            serde_json::Value::Number(n) => Some(Value::Number(n.clone())),
            serde_json::Value::String(s) => Some(Value::String(s.clone())),
            serde_json::Value::Array(items) => items
                .iter()
                .map(Value::from_json)
                .collect::<Option<Vec<_>>>()
                .map(Value::List),
            serde_json::Value::Null | serde_json::Value::Object(_) => None,
        }
    }

    /// Convert into a JSON value
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => serde_json::Value::Number(n.clone()),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
        }
    }

    /// String content, if this is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Canonical text used as a stable sort key
    fn canonical(&self) -> String {
        match self {
            Value::List(items) => {
                let mut parts: Vec<String> = items.iter().map(Value::canonical).collect();
                parts.sort();
                format!("[{}]", parts.join(","))
            }
            other => other.to_json().to_string(),
        }
    }

    /// Copy of this value with every list sorted by its canonical form
    pub fn normalized(&self) -> Value {
        match self {
            Value::List(items) => {
                let mut items: Vec<Value> = items.iter().map(Value::normalized).collect();
                items.sort_by(|a, b| compare_canonical(a, b));
                Value::List(items)
            }
            other => other.clone(),
        }
    }
}

fn compare_canonical(a: &Value, b: &Value) -> Ordering {
    a.canonical().cmp(&b.canonical())
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n.into())
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

/// Order-insensitive equality for attribute values
///
/// Remote directories don't guarantee a stable element order for list values,
/// so `[a, b]` and `[b, a]` compare equal here. Payloads still carry the
/// caller's order.
pub fn values_equivalent(a: &Value, b: &Value) -> bool {
    a.normalized() == b.normalized()
}

/// Order-insensitive equality for whole attribute maps
pub fn attributes_equivalent(a: &AttributeMap, b: &AttributeMap) -> bool {
    a.len() == b.len()
        && a.iter()
            .all(|(key, value)| b.get(key).is_some_and(|other| values_equivalent(value, other)))
}
