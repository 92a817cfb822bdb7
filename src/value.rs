//! Dynamically typed runtime values.
//!
//! # Design
//!
//! - [`Value`] is the tagged value every slot holds: JSON scalars,
//!   ordered collections, a lazy raw-JSON blob, and two opaque native
//!   kinds (iterator state, compiled sub-template).
//! - A raw blob ([`Value::Raw`]) is a byte-exact JSON text that is only
//!   parsed when structural access needs it; cloning one is an `Arc`
//!   bump.
//! - Truthiness ([`Value::is_empty`]) treats absent values, primitive
//!   zero values, empty collections, and blobs whose trimmed body is a
//!   zero token as empty.

use crate::funcs::iter::IterHandle;
use crate::funcs::FuncError;
use crate::strtpl::StrTemplate;
use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// A runtime value.
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Array(Vec<Value>),
    /// Object with source-ordered keys.
    Object(IndexMap<String, Value>),
    /// Raw JSON text, parsed lazily on structural access.
    Raw(Arc<str>),
    /// Opaque iterator state used by the foreach built-ins.
    Iter(IterHandle),
    /// Opaque compiled string sub-template.
    Tmpl(Arc<StrTemplate>),
}

impl Value {
    /// Wrap JSON text as a raw blob without parsing it.
    pub fn raw(text: impl Into<Arc<str>>) -> Value {
        Value::Raw(text.into())
    }

    /// Convert any serializable host value into a runtime value.
    pub fn from_serialize<T: Serialize>(v: &T) -> Result<Value, serde_json::Error> {
        Ok(Value::from(serde_json::to_value(v)?))
    }

    /// The JSON shape of this value. Fails on the opaque native kinds
    /// and on raw blobs that are not valid JSON.
    pub fn to_json(&self) -> Result<serde_json::Value, FuncError> {
        match self {
            Value::Null => Ok(serde_json::Value::Null),
            Value::Bool(b) => Ok(serde_json::Value::Bool(*b)),
            Value::Int(i) => Ok(serde_json::Value::from(*i)),
            Value::Float(f) => Ok(serde_json::Value::from(*f)),
            Value::Str(s) => Ok(serde_json::Value::String(s.clone())),
            Value::Array(items) => items
                .iter()
                .map(Value::to_json)
                .collect::<Result<Vec<_>, _>>()
                .map(serde_json::Value::Array),
            Value::Object(map) => {
                let mut out = serde_json::Map::with_capacity(map.len());
                for (key, val) in map {
                    out.insert(key.clone(), val.to_json()?);
                }
                Ok(serde_json::Value::Object(out))
            }
            Value::Raw(text) => serde_json::from_str(text)
                .map_err(|e| FuncError::new(format!("invalid JSON value: {e}"))),
            Value::Iter(_) | Value::Tmpl(_) => Err(FuncError::new(format!(
                "{} has no JSON representation",
                self.kind_name()
            ))),
        }
    }

    /// JSON-encode this value.
    pub fn encode(&self) -> Result<String, FuncError> {
        match self {
            Value::Raw(text) => Ok(text.to_string()),
            other => serde_json::to_string(&other.to_json()?)
                .map_err(|e| FuncError::new(e.to_string())),
        }
    }

    /// This value with a raw blob parsed into its structural form.
    /// Everything else passes through unchanged.
    pub fn decoded(&self) -> Result<Value, FuncError> {
        match self {
            Value::Raw(text) => {
                let parsed: serde_json::Value = serde_json::from_str(text)
                    .map_err(|e| FuncError::new(format!("invalid JSON value: {e}")))?;
                Ok(Value::from(parsed))
            }
            other => Ok(other.clone()),
        }
    }

    /// Truthiness: empty means absent, a primitive zero value, an empty
    /// collection, or a raw blob spelling one of those.
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Bool(b) => !b,
            Value::Int(i) => *i == 0,
            Value::Float(f) => *f == 0.0,
            Value::Str(s) => s.is_empty(),
            Value::Array(items) => items.is_empty(),
            Value::Object(map) => map.is_empty(),
            Value::Raw(text) => raw_is_empty(text),
            Value::Iter(_) | Value::Tmpl(_) => false,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Raw(_) => "json",
            Value::Iter(_) => "iterator",
            Value::Tmpl(_) => "template",
        }
    }
}

/// A raw blob is empty when its trimmed text is nothing, a zero token,
/// or a `{}`/`[]` wrapper around whitespace.
fn raw_is_empty(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return true;
    }
    if matches!(trimmed, "null" | "false" | "0" | "\"\"") {
        return true;
    }
    let bytes = trimmed.as_bytes();
    let wrapped = (bytes[0] == b'{' && bytes[bytes.len() - 1] == b'}')
        || (bytes[0] == b'[' && bytes[bytes.len() - 1] == b']');
    wrapped && trimmed[1..trimmed.len() - 1].trim().is_empty()
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                *a as f64 == *b
            }
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            (Value::Raw(a), Value::Raw(b)) => a == b,
            (Value::Iter(a), Value::Iter(b)) => a.ptr_eq(b),
            (Value::Tmpl(a), Value::Tmpl(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Raw(text) => f.write_str(text),
            Value::Iter(_) => f.write_str("<iterator>"),
            Value::Tmpl(_) => f.write_str("<template>"),
            other => match other.to_json() {
                Ok(json) => f.write_str(&json.to_string()),
                Err(_) => f.write_str(other.kind_name()),
            },
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Value {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::Object(
                map.into_iter().map(|(k, v)| (k, Value::from(v))).collect(),
            ),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Value {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Value {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Value {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Value {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Value {
        Value::Str(v)
    }
}
