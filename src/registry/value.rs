//! Runtime-typed values stored in registry nodes.
//!
//! Registry entries are heterogeneous: hyperparameters, metrics, and
//! architecture descriptors all live in the same tree. `Value` is the tagged
//! union covering those entries, and `ValueKind` is the runtime type
//! descriptor a key may declare to gate later writes.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::registry::node::Registry;

/// Runtime type descriptor for a registry entry.
///
/// A key may declare a kind once; every subsequent write under that key is
/// checked against the declared kind via [`ValueKind::accepts`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    /// Boolean flag
    Bool,
    /// Signed integer
    Int,
    /// Double-precision float
    Float,
    /// UTF-8 string
    Text,
    /// List of integers
    IntList,
    /// List of floats
    FloatList,
    /// Nested registry node
    Registry,
}

impl ValueKind {
    /// Whether a value may be written into a key declared with this kind.
    ///
    /// The assignability table is exact kind equality plus one widening
    /// rule: a `Float`-declared key accepts `Int` values, so an integer
    /// literal can land in a float hyperparameter. Nothing else coerces.
    pub fn accepts(&self, value: &Value) -> bool {
        self.accepts_kind(value.kind())
    }

    /// Kind-level assignability check backing [`ValueKind::accepts`].
    pub fn accepts_kind(&self, kind: ValueKind) -> bool {
        *self == kind || matches!((self, kind), (ValueKind::Float, ValueKind::Int))
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool => write!(f, "bool"),
            Self::Int => write!(f, "int"),
            Self::Float => write!(f, "float"),
            Self::Text => write!(f, "text"),
            Self::IntList => write!(f, "int_list"),
            Self::FloatList => write!(f, "float_list"),
            Self::Registry => write!(f, "registry"),
        }
    }
}

/// A value held by a registry entry.
///
/// `Registry` values nest a child node, forming the tree the resolver walks.
/// Handles are cheap to clone; two `Registry` values compare equal when they
/// refer to the same node.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Boolean flag
    Bool(bool),
    /// Signed integer
    Int(i64),
    /// Double-precision float
    Float(f64),
    /// UTF-8 string
    Text(String),
    /// List of integers
    IntList(Vec<i64>),
    /// List of floats
    FloatList(Vec<f64>),
    /// Nested registry node
    Registry(Registry),
}

impl Value {
    /// The runtime kind of this value.
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Bool(_) => ValueKind::Bool,
            Self::Int(_) => ValueKind::Int,
            Self::Float(_) => ValueKind::Float,
            Self::Text(_) => ValueKind::Text,
            Self::IntList(_) => ValueKind::IntList,
            Self::FloatList(_) => ValueKind::FloatList,
            Self::Registry(_) => ValueKind::Registry,
        }
    }

    /// The nested registry, if this value is one.
    pub fn as_registry(&self) -> Option<&Registry> {
        match self {
            Self::Registry(registry) => Some(registry),
            _ => None,
        }
    }

    /// Render this value as JSON for the status monitor boundary.
    ///
    /// Registries render as nested objects via [`Registry::snapshot`]; the
    /// tree must be acyclic.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Bool(b) => JsonValue::from(*b),
            Self::Int(i) => JsonValue::from(*i),
            Self::Float(x) => JsonValue::from(*x),
            Self::Text(s) => JsonValue::from(s.clone()),
            Self::IntList(items) => JsonValue::from(items.clone()),
            Self::FloatList(items) => JsonValue::from(items.clone()),
            Self::Registry(registry) => registry.snapshot(),
        }
    }

    /// Parse a JSON value coming from a UI or monitor into a `Value`.
    ///
    /// JSON does not distinguish `2` from `2.0`, so `expected` guides the
    /// numeric cases: with `Some(ValueKind::Float)` an integer literal
    /// parses as `Float`, and an all-integer array parses as `FloatList`
    /// when that kind is expected. Objects and nulls have no registry
    /// counterpart and return `None`.
    pub fn from_json(json: &JsonValue, expected: Option<ValueKind>) -> Option<Value> {
        match json {
            JsonValue::Bool(b) => Some(Value::Bool(*b)),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    if expected == Some(ValueKind::Float) {
                        Some(Value::Float(i as f64))
                    } else {
                        Some(Value::Int(i))
                    }
                } else {
                    n.as_f64().map(Value::Float)
                }
            }
            JsonValue::String(s) => Some(Value::Text(s.clone())),
            JsonValue::Array(items) => {
                if items.iter().all(|item| item.as_i64().is_some()) {
                    let ints: Vec<i64> = items.iter().filter_map(JsonValue::as_i64).collect();
                    if expected == Some(ValueKind::FloatList) {
                        Some(Value::FloatList(ints.into_iter().map(|i| i as f64).collect()))
                    } else {
                        Some(Value::IntList(ints))
                    }
                } else if items.iter().all(|item| item.as_f64().is_some()) {
                    Some(Value::FloatList(
                        items.iter().filter_map(JsonValue::as_f64).collect(),
                    ))
                } else {
                    None
                }
            }
            JsonValue::Object(_) | JsonValue::Null => None,
        }
    }
}

// Scalars render bare (log lines embed them); lists and registries render
// with their kind so a warning stays one line.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{}", x),
            Self::Text(s) => write!(f, "{}", s),
            Self::IntList(items) => write!(f, "int_list[{}]", items.len()),
            Self::FloatList(items) => write!(f, "float_list[{}]", items.len()),
            Self::Registry(registry) => write!(f, "registry '{}'", registry.name()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<Vec<i64>> for Value {
    fn from(items: Vec<i64>) -> Self {
        Value::IntList(items)
    }
}

impl From<Vec<f64>> for Value {
    fn from(items: Vec<f64>) -> Self {
        Value::FloatList(items)
    }
}

impl From<Registry> for Value {
    fn from(registry: Registry) -> Self {
        Value::Registry(registry)
    }
}

/// Typed extraction from a [`Value`].
///
/// This is the seam the typed resolver operations (`get_as`, `get_single`)
/// and the synchronization getters are generic over. A `None` means the
/// value is not assignable to the requested type; the conversions follow
/// the same table as [`ValueKind::accepts_kind`], so `f64` extracts from
/// `Int` values (widened) but `i64` never extracts from `Float`.
pub trait FromValue: Sized {
    /// Extract `Self` from a value, or `None` when not assignable.
    fn from_value(value: &Value) -> Option<Self>;
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Float(x) => Some(*x),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Text(s) => Some(s.clone()),
            _ => None,
        }
    }
}

impl FromValue for Vec<i64> {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::IntList(items) => Some(items.clone()),
            _ => None,
        }
    }
}

impl FromValue for Vec<f64> {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::FloatList(items) => Some(items.clone()),
            _ => None,
        }
    }
}

impl FromValue for Registry {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Registry(registry) => Some(registry.clone()),
            _ => None,
        }
    }
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Option<Self> {
        Some(value.clone())
    }
}
