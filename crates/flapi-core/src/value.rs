//! Local value space produced by decoding wire messages.
//!
//! A [`Value`] is a JSON tree enriched with the things JSON cannot express
//! directly: live remote-object proxies, tagged data types, and sets.

use crate::remote::RemoteObject;
use crate::types::{DataValue, FrameNumber, Keycode, Record, Timecode};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Server-assigned identifier of a remote object.
///
/// The server uses integers, but string ids are accepted so that any JSON
/// scalar it hands out can be echoed back verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HandleId {
    Int(i64),
    Str(String),
}

impl HandleId {
    /// Interpret a JSON scalar as a handle id.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Number(n) => n.as_i64().map(HandleId::Int),
            serde_json::Value::String(s) => Some(HandleId::Str(s.clone())),
            _ => None,
        }
    }

    /// Interpret a decoded value as a handle id.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(HandleId::Int),
            Value::String(s) => Some(HandleId::Str(s.clone())),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            HandleId::Int(i) => serde_json::Value::from(*i),
            HandleId::Str(s) => serde_json::Value::String(s.clone()),
        }
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandleId::Int(i) => write!(f, "{}", i),
            HandleId::Str(s) => f.write_str(s),
        }
    }
}

impl From<i64> for HandleId {
    fn from(id: i64) -> Self {
        HandleId::Int(id)
    }
}

impl From<&str> for HandleId {
    fn from(id: &str) -> Self {
        HandleId::Str(id.to_string())
    }
}

impl From<String> for HandleId {
    fn from(id: String) -> Self {
        HandleId::Str(id)
    }
}

/// A decoded FLAPI value.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    Array(Vec<Value>),
    Object(BTreeMap<String, Value>),
    /// Unordered collection of unique string elements.
    Set(BTreeSet<String>),
    /// Live proxy for a server-side object.
    Remote(RemoteObject),
    /// Tagged data value such as a timecode.
    Data(DataValue),
}

impl Value {
    /// Build an empty object value.
    pub fn object() -> Self {
        Value::Object(BTreeMap::new())
    }

    /// Insert a key into an object value, converting `self` into an object first
    /// if it is null. Other variants are left untouched.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        if self.is_null() {
            self = Value::object();
        }
        if let Value::Object(map) = &mut self {
            map.insert(key.into(), value.into());
        }
        self
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_set(&self) -> Option<&BTreeSet<String>> {
        match self {
            Value::Set(set) => Some(set),
            _ => None,
        }
    }

    pub fn as_remote(&self) -> Option<&RemoteObject> {
        match self {
            Value::Remote(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn as_data(&self) -> Option<&DataValue> {
        match self {
            Value::Data(data) => Some(data),
            _ => None,
        }
    }

    /// Look up a key in an object value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_object().and_then(|map| map.get(key))
    }

    /// True for values the server treats as a successful flag (`1` or `true`).
    pub fn is_truthy_flag(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Number(n) => n.as_i64() == Some(1) || n.as_f64() == Some(1.0),
            _ => false,
        }
    }
}

/// Plain structural conversion. Tagged nodes are NOT interpreted here; use
/// the codec for that.
impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

macro_rules! impl_from_integer {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(n: $ty) -> Self {
                    Value::Number(serde_json::Number::from(n))
                }
            }
        )*
    };
}

impl_from_integer!(i32, i64, u32, u64, usize);

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or(Value::Null)
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

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

impl From<BTreeSet<String>> for Value {
    fn from(set: BTreeSet<String>) -> Self {
        Value::Set(set)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Value::Object(map)
    }
}

impl From<RemoteObject> for Value {
    fn from(obj: RemoteObject) -> Self {
        Value::Remote(obj)
    }
}

impl From<&RemoteObject> for Value {
    fn from(obj: &RemoteObject) -> Self {
        Value::Remote(obj.clone())
    }
}

impl From<DataValue> for Value {
    fn from(data: DataValue) -> Self {
        Value::Data(data)
    }
}

impl From<Timecode> for Value {
    fn from(tc: Timecode) -> Self {
        Value::Data(DataValue::Timecode(tc))
    }
}

impl From<Keycode> for Value {
    fn from(kc: Keycode) -> Self {
        Value::Data(DataValue::Keycode(kc))
    }
}

impl From<FrameNumber> for Value {
    fn from(frame: FrameNumber) -> Self {
        Value::Data(DataValue::FrameNumber(frame))
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        Value::Data(DataValue::Record(record))
    }
}
