use std::fmt;

use chrono::{DateTime, Duration, FixedOffset, NaiveDateTime};
use rust_decimal::Decimal;
use uuid::Uuid;

/// A dynamically-typed field value.
///
/// Each data-bearing column kind has a matching variant; `Null` stands for
/// an absent value (the empty string or the column's null sentinel on the
/// wire). Dispatching on a closed enum keeps the per-field hot path free
/// of virtual calls.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Value {
    /// An absent value.
    Null,
    /// A boolean.
    Bool(bool),
    /// An unsigned 8-bit integer.
    Byte(u8),
    /// A signed 16-bit integer.
    Short(i16),
    /// A signed 32-bit integer.
    Int32(i32),
    /// A signed 64-bit integer.
    Int64(i64),
    /// A 32-bit float.
    Single(f32),
    /// A 64-bit float.
    Double(f64),
    /// An exact decimal number.
    Decimal(Decimal),
    /// A single character.
    Char(char),
    /// A string.
    String(String),
    /// A globally unique identifier.
    Guid(Uuid),
    /// A date and time without offset.
    DateTime(NaiveDateTime),
    /// A date and time with a fixed offset from UTC.
    DateTimeOffset(DateTime<FixedOffset>),
    /// A signed span of time.
    TimeSpan(Duration),
    /// A byte buffer.
    ByteArray(Vec<u8>),
    /// A character buffer.
    CharArray(Vec<char>),
}

impl Value {
    /// True iff this is `Value::Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The name of the variant, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Byte(_) => "byte",
            Value::Short(_) => "short",
            Value::Int32(_) => "int32",
            Value::Int64(_) => "int64",
            Value::Single(_) => "single",
            Value::Double(_) => "double",
            Value::Decimal(_) => "decimal",
            Value::Char(_) => "char",
            Value::String(_) => "string",
            Value::Guid(_) => "guid",
            Value::DateTime(_) => "date-time",
            Value::DateTimeOffset(_) => "date-time-offset",
            Value::TimeSpan(_) => "time-span",
            Value::ByteArray(_) => "byte-array",
            Value::CharArray(_) => "char-array",
        }
    }

    /// The string payload, if this is a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// The boolean payload, if this is a boolean value.
    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Value::Bool(b) => Some(b),
            _ => None,
        }
    }

    /// The widened integer payload for any of the integer variants.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::Byte(v) => Some(i64::from(v)),
            Value::Short(v) => Some(i64::from(v)),
            Value::Int32(v) => Some(i64::from(v)),
            Value::Int64(v) => Some(v),
            _ => None,
        }
    }

    /// The widened float payload for either float variant.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Single(v) => Some(f64::from(v)),
            Value::Double(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Null => f.write_str(""),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Byte(v) => write!(f, "{}", v),
            Value::Short(v) => write!(f, "{}", v),
            Value::Int32(v) => write!(f, "{}", v),
            Value::Int64(v) => write!(f, "{}", v),
            Value::Single(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::Decimal(v) => write!(f, "{}", v),
            Value::Char(v) => write!(f, "{}", v),
            Value::String(v) => f.write_str(v),
            Value::Guid(v) => write!(f, "{}", v),
            Value::DateTime(v) => write!(f, "{}", v),
            Value::DateTimeOffset(v) => write!(f, "{}", v),
            Value::TimeSpan(v) => write!(f, "{}", v),
            Value::ByteArray(v) => write!(f, "{} bytes", v.len()),
            Value::CharArray(v) => {
                for ch in v {
                    write!(f, "{}", ch)?;
                }
                Ok(())
            }
        }
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Value {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Value {
        Value::String(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Value {
        Value::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Value {
        Value::Int64(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Value {
        Value::Double(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Value {
        Value::Bool(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Value {
        match v {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_is_null() {
        assert!(Value::Null.is_null());
        assert!(!Value::Int32(0).is_null());
    }

    #[test]
    fn integer_widening() {
        assert_eq!(Value::Byte(7).as_i64(), Some(7));
        assert_eq!(Value::Short(-3).as_i64(), Some(-3));
        assert_eq!(Value::Int64(1 << 40).as_i64(), Some(1 << 40));
        assert_eq!(Value::String("7".into()).as_i64(), None);
    }

    #[test]
    fn option_conversion() {
        assert_eq!(Value::from(None::<i32>), Value::Null);
        assert_eq!(Value::from(Some(5)), Value::Int32(5));
    }
}
