//! Message codec between JSON wire trees and local [`Value`]s.
//!
//! Wire conventions:
//!
//! ```text
//! {"_handle": "<Class>", "_id": <id>}        remote-object reference
//! {"_type": "set", "<elem>": 1, ...}          unordered unique elements
//! {"_type": "<tag>", ...fields}               tagged data value
//! ```
//!
//! Decoding is bottom-up: children are decoded before the node that contains
//! them, so handles and data values nested at any depth come out fully typed.

use crate::error::{FlapiError, Result};
use crate::registry::TypeRegistry;
use crate::remote::RemoteObject;
use crate::value::{HandleId, Value};
use std::collections::{BTreeMap, BTreeSet};

/// Discriminator key carrying the proxy class of a handle reference.
pub const HANDLE_KEY: &str = "_handle";
/// Key carrying the server-assigned id of a handle reference.
pub const ID_KEY: &str = "_id";
/// Discriminator key of tagged data values and sets.
pub const TYPE_KEY: &str = "_type";
/// Reserved `_type` tag for sets.
pub const SET_TAG: &str = "set";
/// Marker stored against every set element.
pub const SET_MARKER: i64 = 1;

/// Maps handle references to local proxies during decoding.
pub trait HandleResolver {
    /// Return the proxy for `id`, creating one of class `tag` if none exists.
    fn resolve(&mut self, types: &TypeRegistry, tag: &str, id: HandleId) -> Result<RemoteObject>;
}

/// Encode a local value into its wire tree.
///
/// Sets become tagged objects; proxies and data values serialize themselves;
/// everything else passes through.
pub fn encode(value: &Value) -> Result<serde_json::Value> {
    Ok(match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Number(n) => serde_json::Value::Number(n.clone()),
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::Array(items) => serde_json::Value::Array(
            items.iter().map(encode).collect::<Result<Vec<_>>>()?,
        ),
        Value::Object(map) => serde_json::Value::Object(encode_fields(map)?),
        Value::Set(set) => encode_set(set),
        Value::Remote(obj) => obj.to_wire()?,
        Value::Data(data) => data.to_wire()?,
    })
}

/// Encode the fields of an object value.
pub fn encode_fields(
    fields: &BTreeMap<String, Value>,
) -> Result<serde_json::Map<String, serde_json::Value>> {
    fields
        .iter()
        .map(|(k, v)| Ok((k.clone(), encode(v)?)))
        .collect()
}

fn encode_set(set: &BTreeSet<String>) -> serde_json::Value {
    let mut node = serde_json::Map::with_capacity(set.len() + 1);
    node.insert(
        TYPE_KEY.to_string(),
        serde_json::Value::String(SET_TAG.to_string()),
    );
    for element in set {
        node.insert(element.clone(), serde_json::Value::from(SET_MARKER));
    }
    serde_json::Value::Object(node)
}

/// Decode a wire tree into a local value.
pub fn decode<R: HandleResolver>(
    node: serde_json::Value,
    types: &TypeRegistry,
    resolver: &mut R,
) -> Result<Value> {
    Decoder { types, resolver }.decode(node)
}

/// Parse a raw text frame and decode it.
pub fn decode_str<R: HandleResolver>(
    text: &str,
    types: &TypeRegistry,
    resolver: &mut R,
) -> Result<Value> {
    let node: serde_json::Value = serde_json::from_str(text)?;
    decode(node, types, resolver)
}

struct Decoder<'a, R> {
    types: &'a TypeRegistry,
    resolver: &'a mut R,
}

impl<R: HandleResolver> Decoder<'_, R> {
    fn decode(&mut self, node: serde_json::Value) -> Result<Value> {
        match node {
            serde_json::Value::Array(items) => Ok(Value::Array(
                items
                    .into_iter()
                    .map(|item| self.decode(item))
                    .collect::<Result<Vec<_>>>()?,
            )),
            serde_json::Value::Object(map) => {
                let mut fields = BTreeMap::new();
                for (key, child) in map {
                    fields.insert(key, self.decode(child)?);
                }
                self.decode_object(fields)
            }
            scalar => Ok(Value::from(scalar)),
        }
    }

    fn decode_object(&mut self, mut fields: BTreeMap<String, Value>) -> Result<Value> {
        let handle_tag = fields.get(HANDLE_KEY).and_then(Value::as_str);
        let handle_id = fields.get(ID_KEY).and_then(HandleId::from_value);
        if let (Some(tag), Some(id)) = (handle_tag, handle_id) {
            let obj = self.resolver.resolve(self.types, tag, id)?;
            return Ok(Value::Remote(obj));
        }

        let type_tag = match fields.get(TYPE_KEY) {
            Some(Value::String(tag)) => tag.clone(),
            _ => return Ok(Value::Object(fields)),
        };

        if type_tag == SET_TAG {
            let elements = fields.into_keys().filter(|k| k != TYPE_KEY).collect();
            return Ok(Value::Set(elements));
        }

        let kind = self.types.data_kind(&type_tag)?;
        fields.remove(TYPE_KEY);
        Ok(Value::Data(kind.construct(&type_tag, fields)?))
    }
}

/// Resolver that refuses every handle; for decoding payloads that must not
/// carry remote references.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHandles;

impl HandleResolver for NoHandles {
    fn resolve(&mut self, _types: &TypeRegistry, tag: &str, id: HandleId) -> Result<RemoteObject> {
        Err(FlapiError::protocol(format!(
            "unexpected {} handle {} in payload",
            tag, id
        )))
    }
}
