//! Field values and raw model records.
//!
//! A [`Model`] is the raw record handed over by a persistence layer. Entity
//! fields hold [`FieldValue`]s, which distinguish plain scalars from
//! aggregates (arrays, JSON documents, byte buffers).
//!
//! ```rust
//! use kinship_runtime::{model, FieldValue};
//!
//! let post = model! {
//!     "id" => 1,
//!     "title" => "Hello",
//!     "tags" => vec!["rust", "async"],
//!     "author_id" => None::<i64>,
//! };
//!
//! assert_eq!(post["id"], FieldValue::Int(1));
//! assert!(post["tags"].is_aggregate());
//! assert!(post["author_id"].is_null());
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Raw model record: model key to value, in declaration order.
pub type Model = IndexMap<String, FieldValue>;

/// A value stored in an entity field or a raw model.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Null value.
    #[default]
    Null,
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Float value.
    Float(f64),
    /// String value.
    String(String),
    /// Array of values.
    Array(Vec<FieldValue>),
    /// JSON document.
    Json(serde_json::Value),
    /// Bytes value.
    Bytes(Vec<u8>),
}

impl FieldValue {
    /// Whether this value is a mutable aggregate rather than a scalar.
    ///
    /// Aggregates are deep-copied at the model boundary and compared
    /// structurally when computing dirty fields.
    pub fn is_aggregate(&self) -> bool {
        matches!(self, Self::Array(_) | Self::Json(_) | Self::Bytes(_))
    }

    /// Check for null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get the integer value, if any.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Get the float value, widening integers.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Get the boolean value, if any.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get the string value, if any.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get the array elements, if any.
    pub fn as_array(&self) -> Option<&[FieldValue]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        Self::Int(v as i64)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<serde_json::Value> for FieldValue {
    fn from(v: serde_json::Value) -> Self {
        Self::Json(v)
    }
}

impl From<Vec<u8>> for FieldValue {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Self::Null,
        }
    }
}

impl From<Vec<&str>> for FieldValue {
    fn from(v: Vec<&str>) -> Self {
        Self::Array(v.into_iter().map(Into::into).collect())
    }
}

impl From<Vec<i64>> for FieldValue {
    fn from(v: Vec<i64>) -> Self {
        Self::Array(v.into_iter().map(Into::into).collect())
    }
}

impl From<Vec<FieldValue>> for FieldValue {
    fn from(v: Vec<FieldValue>) -> Self {
        Self::Array(v)
    }
}

/// Build a [`Model`] from `key => value` pairs.
#[macro_export]
macro_rules! model {
    () => {
        $crate::value::Model::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut model = $crate::value::Model::new();
        $(
            model.insert(::std::string::String::from($key), $crate::value::FieldValue::from($value));
        )+
        model
    }};
}
