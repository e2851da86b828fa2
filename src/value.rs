//! The `Value` tagged union (§3), the single sum type every codec module
//! dispatches on by discriminant, never by subclass identity (§9).

use indexmap::IndexMap;

use crate::constants;
use crate::frame::{Column, Frame};

/// An insertion-ordered mapping from UTF-8 key to value. A plain hashmap is
/// not sufficient here: DICT's on-wire key order is observable and must
/// round-trip (§9).
pub type Dict = IndexMap<String, Value>;

/// A value exchanged between the engine and its peers (§3).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Int(i64),
    /// Signed day count since 1970-01-01.
    Date(i32),
    /// Signed nanoseconds since midnight.
    Time(i64),
    /// Signed milliseconds since the epoch, plus an IANA timezone name
    /// (empty string means "no zone").
    Datetime { millis: i64, tz: String },
    /// Signed nanoseconds since the epoch, plus an IANA timezone name.
    Timestamp { nanos: i64, tz: String },
    /// Signed nanoseconds.
    Duration(i64),
    Float(f64),
    String(String),
    /// Semantically a category label; wire-identical to `String`.
    Cat(String),
    Series(Column),
    DataFrame(Frame),
    List(Vec<Value>),
    Dict(Dict),
    /// A diagnostic message. At the top of a decoded response payload this
    /// must be surfaced to the caller as a failed result, not a value
    /// (§4.6).
    Err(String),
    /// Opaque reference to engine-side callable state; only the textual
    /// body/name round-trips (§9).
    Fn(String),
}

impl Value {
    /// The wire type code for this value's kind (§4.1).
    pub fn kind(&self) -> u8 {
        match self {
            Value::Null => constants::NULL,
            Value::Boolean(_) => constants::BOOLEAN,
            Value::Int(_) => constants::INT,
            Value::Date(_) => constants::DATE,
            Value::Time(_) => constants::TIME,
            Value::Datetime { .. } => constants::DATETIME,
            Value::Timestamp { .. } => constants::TIMESTAMP,
            Value::Duration(_) => constants::DURATION,
            Value::Float(_) => constants::FLOAT,
            Value::String(_) => constants::STRING,
            Value::Cat(_) => constants::CAT,
            Value::Series(_) => constants::SERIES,
            Value::DataFrame(_) => constants::DATAFRAME,
            Value::List(_) => constants::LIST,
            Value::Dict(_) => constants::DICT,
            Value::Err(_) => constants::ERR,
            Value::Fn(_) => constants::FN,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) | Value::Cat(v) | Value::Fn(v) | Value::Err(v) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&Dict> {
        match self {
            Value::Dict(v) => Some(v),
            _ => None,
        }
    }

    /// `Some(text)` if this value is an ERR, for surfacing evaluator
    /// failures without pattern-matching at every call site.
    pub fn as_err(&self) -> Option<&str> {
        match self {
            Value::Err(text) => Some(text.as_str()),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}
