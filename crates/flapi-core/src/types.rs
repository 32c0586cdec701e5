//! Tagged data types carried on the wire.
//!
//! Each type serializes to a JSON object with a fixed `_type` tag. They have
//! no identity: two values with equal fields are interchangeable.

use crate::codec::{self, TYPE_KEY};
use crate::error::Result;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// SMPTE timecode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timecode {
    #[serde(rename = "h")]
    pub hour: u32,
    #[serde(rename = "m")]
    pub minute: u32,
    #[serde(rename = "s")]
    pub second: u32,
    #[serde(rename = "f")]
    pub frame: u32,
    #[serde(default)]
    pub phase: i32,
    #[serde(default)]
    pub fps: Option<u32>,
    /// Hour at which the timecode wraps around.
    #[serde(default)]
    pub wrap: Option<u32>,
}

impl Timecode {
    pub const TAG: &'static str = "timecode";

    pub fn new(hour: u32, minute: u32, second: u32, frame: u32, fps: u32) -> Self {
        Self {
            hour,
            minute,
            second,
            frame,
            phase: 0,
            fps: Some(fps),
            wrap: Some(24),
        }
    }
}

impl fmt::Display for Timecode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02}:{:02}:{:02}",
            self.hour, self.minute, self.second, self.frame
        )
    }
}

/// Film keycode (edge code).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keycode {
    #[serde(default)]
    pub stock: Option<String>,
    pub feet: i64,
    pub frames: i64,
    #[serde(default)]
    pub perfs: i64,
    /// Film gearing, passed through as the server reports it.
    #[serde(default)]
    pub gearing: serde_json::Value,
}

impl Keycode {
    pub const TAG: &'static str = "keycode";
}

impl fmt::Display for Keycode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let gearing = match &self.gearing {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        match self.stock.as_deref() {
            Some(stock) if !stock.is_empty() => write!(
                f,
                "{} {:05}+{:02}.{},{}",
                stock, self.feet, self.frames, self.perfs, gearing
            ),
            _ => write!(
                f,
                "{:05}+{:02}.{},{}",
                self.feet, self.frames, self.perfs, gearing
            ),
        }
    }
}

/// A bare frame number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameNumber {
    pub frame: i64,
}

impl FrameNumber {
    pub const TAG: &'static str = "framenumber";

    pub fn new(frame: i64) -> Self {
        Self { frame }
    }
}

impl fmt::Display for FrameNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.frame)
    }
}

/// Generic tagged data holder (`Rational`, `ShotInfo`, `RenderStatus`, ...).
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub type_tag: String,
    pub fields: BTreeMap<String, Value>,
}

impl Record {
    pub fn new(type_tag: impl Into<String>) -> Self {
        Self {
            type_tag: type_tag.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }
}

/// Any tagged data value.
#[derive(Debug, Clone, PartialEq)]
pub enum DataValue {
    Timecode(Timecode),
    Keycode(Keycode),
    FrameNumber(FrameNumber),
    Record(Record),
}

impl DataValue {
    pub fn type_tag(&self) -> &str {
        match self {
            DataValue::Timecode(_) => Timecode::TAG,
            DataValue::Keycode(_) => Keycode::TAG,
            DataValue::FrameNumber(_) => FrameNumber::TAG,
            DataValue::Record(record) => &record.type_tag,
        }
    }

    /// Serialize to the tagged wire object.
    pub fn to_wire(&self) -> Result<serde_json::Value> {
        let mut node = match self {
            DataValue::Timecode(tc) => serde_json::to_value(tc)?,
            DataValue::Keycode(kc) => serde_json::to_value(kc)?,
            DataValue::FrameNumber(frame) => serde_json::to_value(frame)?,
            DataValue::Record(record) => {
                serde_json::Value::Object(codec::encode_fields(&record.fields)?)
            }
        };
        if let serde_json::Value::Object(map) = &mut node {
            map.insert(
                TYPE_KEY.to_string(),
                serde_json::Value::String(self.type_tag().to_string()),
            );
        }
        Ok(node)
    }
}

impl fmt::Display for DataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataValue::Timecode(tc) => tc.fmt(f),
            DataValue::Keycode(kc) => kc.fmt(f),
            DataValue::FrameNumber(frame) => frame.fmt(f),
            DataValue::Record(record) => write!(f, "{}({} fields)", record.type_tag, record.fields.len()),
        }
    }
}

/// Constructor selected by the type registry for a `_type` tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataKind {
    Timecode,
    Keycode,
    FrameNumber,
    Record,
}

impl DataKind {
    /// Build a data value from the (already decoded) fields of a tagged node.
    ///
    /// `fields` must not contain the `_type` key.
    pub fn construct(self, tag: &str, fields: BTreeMap<String, Value>) -> Result<DataValue> {
        match self {
            DataKind::Record => Ok(DataValue::Record(Record {
                type_tag: tag.to_string(),
                fields,
            })),
            DataKind::Timecode => Ok(DataValue::Timecode(from_fields(&fields)?)),
            DataKind::Keycode => Ok(DataValue::Keycode(from_fields(&fields)?)),
            DataKind::FrameNumber => Ok(DataValue::FrameNumber(from_fields(&fields)?)),
        }
    }
}

fn from_fields<T: serde::de::DeserializeOwned>(fields: &BTreeMap<String, Value>) -> Result<T> {
    let node = serde_json::Value::Object(codec::encode_fields(fields)?);
    Ok(serde_json::from_value(node)?)
}
