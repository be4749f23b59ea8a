//! Structured value model for snapshot records.
//!
//! A record's content is a tree of [`Value`]s. The snapshot loader resolves
//! every internal reference into a nested value and replaces back-edges with
//! [`CIRCULAR_REFERENCE_SENTINEL`], so values reaching this crate are always
//! finite trees.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Marker the snapshot loader substitutes for a reference that would close a cycle.
pub const CIRCULAR_REFERENCE_SENTINEL: &str = "CIRCULAR_REFERENCE_SANITIZED";

/// Grouping key used for values that have no string representation.
pub const UNDEFINED_KEY: &str = "undefined";

/// Class name given to objects whose class is not recorded.
pub const DEFAULT_CLASS: &str = "Object";

fn default_class() -> String {
    DEFAULT_CLASS.to_string()
}

/// A structured object: a class name plus an insertion-ordered property map.
///
/// Any other field is rejected, so a JSON object that is not in this shape
/// fails to decode instead of collapsing into an empty object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ObjectValue {
    /// Constructor / class name reported by the snapshot.
    #[serde(default = "default_class")]
    pub class: String,
    /// Properties in snapshot order.
    #[serde(default)]
    pub properties: IndexMap<String, Value>,
}

impl ObjectValue {
    /// Create an empty object of the given class.
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            properties: IndexMap::new(),
        }
    }

    /// Add a property, returning the object (builder style).
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// Number of direct properties.
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    /// Whether the object has no properties.
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

/// Content of a snapshot record.
///
/// Serialized untagged, so a normalized snapshot reads as plain JSON:
/// objects are `{"class": .., "properties": {..}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Null (also stands in for `undefined`).
    Null,
    /// Boolean scalar.
    Bool(bool),
    /// Numeric scalar.
    Number(f64),
    /// String scalar.
    String(String),
    /// Ordered sequence.
    Array(Vec<Value>),
    /// Structured object.
    Object(ObjectValue),
}

/// Discriminant of a [`Value`], used for logging and kind comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// `Value::Null`.
    Null,
    /// `Value::Bool`.
    Bool,
    /// `Value::Number`.
    Number,
    /// `Value::String`.
    String,
    /// `Value::Array`.
    Array,
    /// `Value::Object`.
    Object,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool => write!(f, "bool"),
            Self::Number => write!(f, "number"),
            Self::String => write!(f, "string"),
            Self::Array => write!(f, "array"),
            Self::Object => write!(f, "object"),
        }
    }
}

impl Value {
    /// Build an object value from a class name and properties.
    pub fn object<K, V, I>(class: impl Into<String>, properties: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Value::Object(ObjectValue {
            class: class.into(),
            properties: properties
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        })
    }

    /// Kind of this value.
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::Number(_) => ValueKind::Number,
            Value::String(_) => ValueKind::String,
            Value::Array(_) => ValueKind::Array,
            Value::Object(_) => ValueKind::Object,
        }
    }

    /// Whether this is an array or object.
    pub fn is_container(&self) -> bool {
        matches!(self, Value::Array(_) | Value::Object(_))
    }

    /// Strict identity-style equality.
    ///
    /// Scalars compare by value (`NaN` is never equal to itself); two
    /// containers are never strictly equal, since distinct heap objects
    /// have distinct identities.
    pub fn strict_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            _ => false,
        }
    }

    /// Deep structural equality.
    ///
    /// Objects must share a class and an identical key set with deeply equal
    /// values (key order is ignored). Arrays must have the same length and be
    /// equal as multisets. `NaN` equals `NaN`.
    pub fn deep_equal(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => arrays_equal_unordered(a, b),
            (Value::Object(a), Value::Object(b)) => {
                a.class == b.class
                    && a.properties.len() == b.properties.len()
                    && a.properties.iter().all(|(name, value)| {
                        b.properties
                            .get(name)
                            .is_some_and(|other| value.deep_equal(other))
                    })
            }
            _ => false,
        }
    }

    /// String representation used as a grouping key for scalar records.
    ///
    /// Null maps to [`UNDEFINED_KEY`]; numbers render the way a JavaScript
    /// runtime would print them for the common cases (`1`, `0.5`, `NaN`).
    pub fn scalar_key(&self) -> String {
        match self {
            Value::Null => UNDEFINED_KEY.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(s) => s.clone(),
            Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    Value::Null => String::new(),
                    other => other.scalar_key(),
                })
                .collect::<Vec<_>>()
                .join(","),
            Value::Object(_) => "[object Object]".to_string(),
        }
    }
}

/// Multiset equality of two arrays under [`Value::deep_equal`].
fn arrays_equal_unordered(lhs: &[Value], rhs: &[Value]) -> bool {
    if lhs.len() != rhs.len() {
        return false;
    }

    let mut used = vec![false; rhs.len()];
    lhs.iter().all(|item| {
        let slot = rhs
            .iter()
            .enumerate()
            .position(|(i, candidate)| !used[i] && item.deep_equal(candidate));
        match slot {
            Some(i) => {
                used[i] = true;
                true
            }
            None => false,
        }
    })
}

/// Render a number the way the snapshot's runtime prints it.
pub(crate) fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        let rendered = if n > 0.0 { "Infinity" } else { "-Infinity" };
        rendered.to_string()
    } else if n == 0.0 {
        // -0 prints as 0
        "0".to_string()
    } else {
        n.to_string()
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
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

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<ObjectValue> for Value {
    fn from(object: ObjectValue) -> Self {
        Value::Object(object)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(x: i64, y: i64) -> Value {
        Value::object("Point", [("x", x), ("y", y)])
    }

    #[test]
    fn test_deep_equal_ignores_key_order() {
        let a = Value::object("Point", [("x", 1), ("y", 2)]);
        let b = Value::object("Point", [("y", 2), ("x", 1)]);
        assert!(a.deep_equal(&b));
    }

    #[test]
    fn test_deep_equal_requires_same_class() {
        let a = Value::object("Point", [("x", 1)]);
        let b = Value::object("Vector", [("x", 1)]);
        assert!(!a.deep_equal(&b));
    }

    #[test]
    fn test_deep_equal_arrays_unordered() {
        let a = Value::Array(vec![point(1, 2), point(3, 4), 5.into()]);
        let b = Value::Array(vec![5.into(), point(3, 4), point(1, 2)]);
        assert!(a.deep_equal(&b));

        // Multiset, not set: duplicates must line up
        let c = Value::Array(vec![1.into(), 1.into(), 2.into()]);
        let d = Value::Array(vec![1.into(), 2.into(), 2.into()]);
        assert!(!c.deep_equal(&d));
    }

    #[test]
    fn test_nan_equality_rules() {
        let nan = Value::Number(f64::NAN);
        assert!(nan.deep_equal(&nan.clone()));
        assert!(!nan.strict_eq(&nan.clone()));
    }

    #[test]
    fn test_strict_eq_never_matches_containers() {
        let a = point(1, 2);
        assert!(!a.strict_eq(&a.clone()));
        assert!(Value::from("x").strict_eq(&Value::from("x")));
        assert!(!Value::from(1).strict_eq(&Value::from("1")));
    }

    #[test]
    fn test_scalar_key() {
        assert_eq!(Value::Null.scalar_key(), UNDEFINED_KEY);
        assert_eq!(Value::from(1).scalar_key(), "1");
        assert_eq!(Value::from(0.5).scalar_key(), "0.5");
        assert_eq!(Value::Number(-0.0).scalar_key(), "0");
        assert_eq!(Value::Number(f64::NAN).scalar_key(), "NaN");
        assert_eq!(Value::from(true).scalar_key(), "true");
    }

    #[test]
    fn test_untagged_json_shape() {
        let json = r#"{"class":"Point","properties":{"x":1,"tags":["a",null,true]}}"#;
        let value: Value = serde_json::from_str(json).unwrap();

        let Value::Object(object) = &value else {
            panic!("expected object, got {:?}", value.kind());
        };
        assert_eq!(object.class, "Point");
        assert_eq!(object.properties["x"], Value::Number(1.0));
        assert_eq!(
            object.properties["tags"],
            Value::Array(vec!["a".into(), Value::Null, true.into()])
        );
    }

    #[test]
    fn test_missing_class_defaults() {
        let value: Value = serde_json::from_str(r#"{"properties":{"a":1}}"#).unwrap();
        match value {
            Value::Object(object) => assert_eq!(object.class, DEFAULT_CLASS),
            other => panic!("expected object, got {:?}", other.kind()),
        }
    }

    #[test]
    fn test_foreign_object_shape_rejected() {
        assert!(serde_json::from_str::<Value>(r#"{"a":1}"#).is_err());
        assert!(serde_json::from_str::<Value>(r#"{"class":"P","properties":{},"extra":true}"#).is_err());

        // Nested values are checked too
        let nested = r#"{"class":"P","properties":{"inner":{"x":"totally different"}}}"#;
        assert!(serde_json::from_str::<Value>(nested).is_err());
    }

    #[test]
    fn test_class_without_properties_is_empty_object() {
        let value: Value = serde_json::from_str(r#"{"class":"Marker"}"#).unwrap();
        assert_eq!(value, Value::object("Marker", Vec::<(String, Value)>::new()));
    }
}
