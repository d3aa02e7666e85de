//! Dynamic value representation
//!
//! Arguments and return values cross method boundaries as [`Value`]. The
//! enum is deliberately small: primitives plus object handles, no nested
//! containers. Typed method bodies convert at the edges via [`FromValue`]
//! and [`IntoValue`] so dispatch itself stays untyped.

use std::fmt;

use crate::error::CallError;
use crate::object::ObjectRef;

/// A dynamically typed runtime value.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// Absence of a value.
    Nil,
    /// Boolean value.
    Bool(bool),
    /// Signed integer value.
    Int(i64),
    /// Floating point value.
    Float(f64),
    /// String value.
    Str(String),
    /// Handle to a live (or formerly live) object.
    Object(ObjectRef),
}

impl Value {
    /// Checks if the value is nil.
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Short kind name, used in type mismatch diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Object(_) => "object",
        }
    }

    /// Attempts to get the value as a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Attempts to get the value as an integer.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Attempts to get the value as a float.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Attempts to get the value as a string slice.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Attempts to get the value as an object handle.
    pub fn as_object(&self) -> Option<ObjectRef> {
        match self {
            Value::Object(obj) => Some(*obj),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => write!(f, "\"{s}\""),
            Value::Object(obj) => write!(f, "{obj}"),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value as i64)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<ObjectRef> for Value {
    fn from(value: ObjectRef) -> Self {
        Value::Object(value)
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Nil
    }
}

/// Conversion from a dispatch argument into a typed parameter.
///
/// Conversions are strict: an `Int` does not coerce to `f64` and vice
/// versa. A failed conversion surfaces as [`CallError::TypeMismatch`].
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Result<Self, CallError>;
}

/// Conversion from a typed return value into a dispatch [`Value`].
pub trait IntoValue {
    fn into_value(self) -> Value;
}

impl<T: Into<Value>> IntoValue for T {
    fn into_value(self) -> Value {
        self.into()
    }
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self, CallError> {
        Ok(value.clone())
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self, CallError> {
        value.as_bool().ok_or(CallError::TypeMismatch {
            expected: "bool",
            found: value.kind(),
        })
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Result<Self, CallError> {
        value.as_int().ok_or(CallError::TypeMismatch {
            expected: "int",
            found: value.kind(),
        })
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self, CallError> {
        value.as_float().ok_or(CallError::TypeMismatch {
            expected: "float",
            found: value.kind(),
        })
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self, CallError> {
        value
            .as_str()
            .map(str::to_string)
            .ok_or(CallError::TypeMismatch {
                expected: "str",
                found: value.kind(),
            })
    }
}

impl FromValue for ObjectRef {
    fn from_value(value: &Value) -> Result<Self, CallError> {
        value.as_object().ok_or(CallError::TypeMismatch {
            expected: "object",
            found: value.kind(),
        })
    }
}
