//! Dynamically-typed evaluation values.
//!
//! The interpreter produces numbers, strings and booleans; variable access
//! into a model or state can additionally surface whole JSON structures.
//! Coercion rules are explicit and documented here rather than inherited
//! from a host language:
//!
//! - Truthiness: falsy values are `0`, `NaN`, `""`, `false`, `Null` and
//!   JSON `null`; everything else (including empty arrays/objects) is
//!   truthy.
//! - Equality: values of the same variant compare by value; values of
//!   different variants are never equal.
//! - `+` adds two numbers, or concatenates when either side is a string.
//! - Ordering comparisons are defined for number/number and string/string
//!   pairs only.

use std::fmt;

/// A dynamically-typed result of evaluating an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    /// A structural value (object or array) read from the model or state.
    Json(serde_json::Value),
}

impl Value {
    /// Convert a JSON value, unwrapping leaf scalars into native variants.
    /// Objects and arrays stay structural.
    pub fn from_json(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::Str(s),
            other => Value::Json(other),
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            Value::Json(v) => !v.is_null(),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Loose equality across variants: same variant compares by value,
    /// different variants are never equal.
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Json(a), Value::Json(b)) => a == b,
            _ => false,
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl fmt::Display for Value {
    /// Text rendering used by message interpolation: numbers print without
    /// a trailing `.0`, structural values as compact JSON.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => {
                if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{n}")
                }
            }
            Value::Str(s) => write!(f, "{s}"),
            Value::Json(v) => write!(f, "{v}"),
        }
    }
}
