//! Dynamic SQL values.

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// A dynamically-typed SQL value.
///
/// This enum represents every value a criteria object or record can carry,
/// and is the element type of the ordered parameter list handed to the
/// external executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// NULL value
    Null,

    /// Boolean value
    Bool(bool),

    /// 64-bit signed integer
    Int(i64),

    /// 64-bit floating point
    Double(f64),

    /// Text string
    Text(String),

    /// Date/time literal carried in its textual form. The compiler decides
    /// the engine cast (`::date`, `::timestamp`, `::timestamptz`) from the
    /// target column's declared type or the document-mode value dispatch.
    Timestamp(String),

    /// JSON value
    Json(serde_json::Value),

    /// Array of values
    Array(Vec<Value>),

    /// Placeholder for a value filled in by the statement itself rather than
    /// bound as a parameter. Deep inserts use it to mark the foreign-key
    /// slots of dependent records that receive the parent's generated key.
    Default,
}

impl Value {
    /// Check if this value is NULL.
    pub const fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get the type name of this value.
    pub const fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Bool(_) => "BOOLEAN",
            Value::Int(_) => "BIGINT",
            Value::Double(_) => "DOUBLE",
            Value::Text(_) => "TEXT",
            Value::Timestamp(_) => "TIMESTAMPTZ",
            Value::Json(_) => "JSON",
            Value::Array(_) => "ARRAY",
            Value::Default => "DEFAULT",
        }
    }

    /// Map a JSON value into the closed value set.
    ///
    /// Numbers become `Int` when integral, `Double` otherwise; objects stay
    /// JSON; arrays map element-wise.
    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map_or_else(|| Value::Double(n.as_f64().unwrap_or(f64::NAN)), Value::Int),
            serde_json::Value::String(s) => Value::Text(s.clone()),
            serde_json::Value::Array(items) => {
                Value::Array(items.iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(_) => Value::Json(json.clone()),
        }
    }

    /// Render this value back as JSON, for document containment parameters.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null | Value::Default => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(n) => serde_json::Value::from(*n),
            Value::Double(n) => serde_json::Value::from(*n),
            Value::Text(s) | Value::Timestamp(s) => serde_json::Value::String(s.clone()),
            Value::Json(v) => v.clone(),
            Value::Array(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
        }
    }

    /// Render the textual form used when the comparison target is text-typed
    /// (JSON traversals and document bodies read out as text).
    pub fn stringify(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(n) => n.to_string(),
            Value::Double(n) => n.to_string(),
            Value::Text(s) | Value::Timestamp(s) => s.clone(),
            Value::Json(v) => v.to_string(),
            Value::Array(items) => serde_json::Value::Array(
                items.iter().map(Value::to_json).collect(),
            )
            .to_string(),
            Value::Default => "DEFAULT".to_string(),
        }
    }

    /// Check whether this is an array whose first element is a JSON object.
    ///
    /// This is the "contains" shape document predicates optimize into a
    /// JSONB containment test.
    pub fn is_object_array(&self) -> bool {
        match self {
            Value::Array(items) => matches!(
                items.first(),
                Some(Value::Json(serde_json::Value::Object(_)))
            ),
            _ => false,
        }
    }
}

// Structural hashing so join specifications (which embed constant values in
// their ON mappings) can key the join-graph cache. Doubles hash by bit
// pattern; JSON values hash by their canonical text.
impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        core::mem::discriminant(self).hash(state);

        match self {
            Value::Null | Value::Default => {}
            Value::Bool(b) => b.hash(state),
            Value::Int(n) => n.hash(state),
            Value::Double(n) => n.to_bits().hash(state),
            Value::Text(s) | Value::Timestamp(s) => s.hash(state),
            Value::Json(v) => v.to_string().hash(state),
            Value::Array(items) => items.hash(state),
        }
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

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(i64::from(n))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Double(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::from_json(&v)
    }
}
