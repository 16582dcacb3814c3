//! Dynamic script values
//!
//! The embedded scripting runtime works with untyped values; this is the
//! representation the binding decodes arguments from and encodes results
//! into. Conversions to fixed-width types are checked: an integer that does
//! not fit is an error, never a truncation.

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use crate::call::Output;
use crate::types::{RefId, TypeTag};

/// A value as seen by scripts.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    None,
    Bool(bool),
    S64(i64),
    U64(u64),
    F64(f64),
    String(String),
    List(Vec<Value>),
    Tuple(Vec<Value>),
}

impl Value {
    /// Short name of the value's runtime type, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "none",
            Value::Bool(_) => "bool",
            Value::S64(_) | Value::U64(_) => "int",
            Value::F64(_) => "float",
            Value::String(_) => "str",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
        }
    }

    pub fn tuple(items: impl IntoIterator<Item = Value>) -> Self {
        Value::Tuple(items.into_iter().collect())
    }

    /// Items of a tuple or list.
    pub fn items(&self) -> Option<&[Value]> {
        match self {
            Value::Tuple(items) | Value::List(items) => Some(items),
            _ => None,
        }
    }
}

/// Failure to convert a [`Value`] to a fixed-width type.
#[derive(Debug, Clone, PartialEq)]
pub enum ConversionError {
    TypeMismatch {
        expected: &'static str,
        got: &'static str,
    },
    OutOfRange {
        expected: &'static str,
        value: String,
    },
    /// Strings cross the boundary NUL-terminated, so they cannot contain NUL.
    InteriorNul,
}

impl fmt::Display for ConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversionError::TypeMismatch { expected, got } => {
                write!(f, "expected {}, got {}", expected, got)
            }
            ConversionError::OutOfRange { expected, value } => {
                write!(f, "{} does not fit in {}", value, expected)
            }
            ConversionError::InteriorNul => f.write_str("string contains a NUL byte"),
        }
    }
}

// ============================================================================
// Encoding: fixed-width → Value
// ============================================================================

impl From<bool> for Value {
    fn from(v: bool) -> Self { Value::Bool(v) }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self { Value::S64(v as i64) }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self { Value::S64(v) }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self { Value::U64(v) }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self { Value::F64(v as f64) }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self { Value::F64(v) }
}

impl From<String> for Value {
    fn from(v: String) -> Self { Value::String(v) }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self { Value::String(String::from(v)) }
}

impl From<RefId> for Value {
    fn from(v: RefId) -> Self { Value::U64(v.raw()) }
}

impl From<TypeTag> for Value {
    fn from(v: TypeTag) -> Self { Value::S64(v.as_raw() as i64) }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}

impl From<Output> for Value {
    fn from(output: Output) -> Self {
        match output {
            Output::RefId(id) => id.into(),
            Output::Int(n) => n.into(),
            Output::Float(x) => x.into(),
            Output::Double(x) => x.into(),
            Output::Str(s) => s.into(),
            Output::TypeTag(tag) => tag.into(),
            Output::RefIds(ids) => ids.into(),
        }
    }
}

// ============================================================================
// Decoding: Value → fixed-width
// ============================================================================

impl TryFrom<&Value> for bool {
    type Error = ConversionError;
    fn try_from(v: &Value) -> Result<Self, Self::Error> {
        match v {
            Value::Bool(b) => Ok(*b),
            Value::S64(n) => Ok(*n != 0),
            Value::U64(n) => Ok(*n != 0),
            other => Err(ConversionError::TypeMismatch {
                expected: "bool",
                got: other.type_name(),
            }),
        }
    }
}

impl TryFrom<&Value> for i32 {
    type Error = ConversionError;
    fn try_from(v: &Value) -> Result<Self, Self::Error> {
        let out_of_range = |value: String| ConversionError::OutOfRange {
            expected: "int32",
            value,
        };
        match v {
            Value::S64(n) => i32::try_from(*n).map_err(|_| out_of_range(format!("{}", n))),
            Value::U64(n) => i32::try_from(*n).map_err(|_| out_of_range(format!("{}", n))),
            Value::Bool(b) => Ok(*b as i32),
            other => Err(ConversionError::TypeMismatch {
                expected: "int",
                got: other.type_name(),
            }),
        }
    }
}

impl TryFrom<&Value> for u64 {
    type Error = ConversionError;
    fn try_from(v: &Value) -> Result<Self, Self::Error> {
        match v {
            Value::U64(n) => Ok(*n),
            Value::S64(n) => u64::try_from(*n).map_err(|_| ConversionError::OutOfRange {
                expected: "uint64",
                value: format!("{}", n),
            }),
            other => Err(ConversionError::TypeMismatch {
                expected: "int",
                got: other.type_name(),
            }),
        }
    }
}

impl TryFrom<&Value> for RefId {
    type Error = ConversionError;
    fn try_from(v: &Value) -> Result<Self, Self::Error> {
        match v {
            // Booleans are ints to most scripting runtimes, but never handles.
            Value::Bool(_) => Err(ConversionError::TypeMismatch {
                expected: "refid",
                got: "bool",
            }),
            other => u64::try_from(other).map(RefId),
        }
    }
}

// 2^63 and 2^64: the first floats past `i64::MAX` and `u64::MAX`.
const TWO_POW_63: f64 = 9_223_372_036_854_775_808.0;
const TWO_POW_64: f64 = 18_446_744_073_709_551_616.0;

fn inexact(expected: &'static str, value: impl fmt::Display) -> ConversionError {
    ConversionError::OutOfRange {
        expected,
        value: format!("{}", value),
    }
}

impl TryFrom<&Value> for f64 {
    type Error = ConversionError;
    fn try_from(v: &Value) -> Result<Self, Self::Error> {
        match v {
            Value::F64(x) => Ok(*x),
            // Integers must survive the trip back unchanged.
            Value::S64(n) => {
                let x = *n as f64;
                if x < TWO_POW_63 && x as i64 == *n {
                    Ok(x)
                } else {
                    Err(inexact("float", n))
                }
            }
            Value::U64(n) => {
                let x = *n as f64;
                if x < TWO_POW_64 && x as u64 == *n {
                    Ok(x)
                } else {
                    Err(inexact("float", n))
                }
            }
            other => Err(ConversionError::TypeMismatch {
                expected: "float",
                got: other.type_name(),
            }),
        }
    }
}

impl TryFrom<&Value> for f32 {
    type Error = ConversionError;
    fn try_from(v: &Value) -> Result<Self, Self::Error> {
        let x = f64::try_from(v)?;
        if x.is_finite() && (x > f32::MAX as f64 || x < f32::MIN as f64) {
            return Err(inexact("float32", x));
        }
        let narrowed = x as f32;
        if matches!(v, Value::S64(_) | Value::U64(_)) && narrowed as f64 != x {
            return Err(inexact("float32", x));
        }
        Ok(narrowed)
    }
}

impl TryFrom<&Value> for String {
    type Error = ConversionError;
    fn try_from(v: &Value) -> Result<Self, Self::Error> {
        match v {
            Value::String(s) if s.contains('\0') => Err(ConversionError::InteriorNul),
            Value::String(s) => Ok(s.clone()),
            other => Err(ConversionError::TypeMismatch {
                expected: "str",
                got: other.type_name(),
            }),
        }
    }
}
