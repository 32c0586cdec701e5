//! Wire envelopes exchanged with the FLAPI server.
//!
//! One JSON document per WebSocket text frame. Outgoing calls carry an `id`
//! and expect a response; notifications omit it.
//!
//! ```text
//! -> {"jsonrpc": "2.0", "id": 4, "method": "Scene.get_name", "target": 12, "params": {}}
//! <- {"id": 4, "result": "Reel1"}
//! <- {"method": "signal", "target": 3, "params": {"signal": "SceneOpened", "args": {...}}}
//! ```

use crate::error::{FlapiError, Result};
use crate::value::{HandleId, Value};
use serde::Serialize;

pub const JSONRPC_VERSION: &str = "2.0";

pub const METHOD_CONNECT: &str = "connect";
pub const METHOD_SIGNAL: &str = "signal";
pub const METHOD_SIGNAL_RESULT: &str = "signal_result";
pub const METHOD_CONNECT_SIGNAL: &str = "connect_signal";
pub const METHOD_DISCONNECT_SIGNAL: &str = "disconnect_signal";
pub const METHOD_FORGET: &str = "forget";
pub const METHOD_REGISTER_SCRIPT: &str = "register_script";
pub const METHOD_GET_PERMISSIONS: &str = "get_permissions";

/// Outgoing call or notification.
#[derive(Debug, Clone, Serialize)]
pub struct OutgoingMessage {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub method: String,
    pub target: Option<HandleId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl OutgoingMessage {
    /// A call expecting a response correlated by `id`.
    pub fn call(
        id: u64,
        method: impl Into<String>,
        target: Option<HandleId>,
        params: serde_json::Value,
    ) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: Some(id),
            method: method.into(),
            target,
            params: Some(params),
        }
    }

    /// A fire-and-forget notification.
    pub fn notification(
        method: impl Into<String>,
        target: Option<HandleId>,
        params: Option<serde_json::Value>,
    ) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: None,
            method: method.into(),
            target,
            params,
        }
    }

    pub fn connect_signal(target: HandleId, signal: &str) -> Self {
        Self::notification(
            METHOD_CONNECT_SIGNAL,
            Some(target),
            Some(serde_json::json!({ "signal": signal })),
        )
    }

    pub fn disconnect_signal(target: HandleId, signal: &str) -> Self {
        Self::notification(
            METHOD_DISCONNECT_SIGNAL,
            Some(target),
            Some(serde_json::json!({ "signal": signal })),
        )
    }

    pub fn forget(target: HandleId) -> Self {
        Self::notification(METHOD_FORGET, Some(target), None)
    }

    /// Answer to a synchronous signal.
    pub fn signal_result(
        target: HandleId,
        sigid: serde_json::Value,
        result: serde_json::Value,
    ) -> Self {
        Self::notification(
            METHOD_SIGNAL_RESULT,
            Some(target),
            Some(serde_json::json!({ "sigid": sigid, "result": result })),
        )
    }
}

/// Authentication handshake. Credentials travel at the top level.
#[derive(Debug, Clone, Serialize)]
pub struct Handshake {
    pub id: u64,
    pub method: &'static str,
    pub username: Option<String>,
    pub password: Option<String>,
    pub token: Option<String>,
}

impl Handshake {
    pub fn new(
        id: u64,
        username: Option<String>,
        password: Option<String>,
        token: Option<String>,
    ) -> Self {
        Self {
            id,
            method: METHOD_CONNECT,
            username,
            password,
            token,
        }
    }
}

/// Registration of a plugin script with the host application.
#[derive(Debug, Clone, Serialize)]
pub struct ScriptRegistration {
    pub jsonrpc: &'static str,
    pub method: &'static str,
    pub path: String,
    pub status: serde_json::Value,
}

impl ScriptRegistration {
    pub fn new(path: impl Into<String>, status: serde_json::Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            method: METHOD_REGISTER_SCRIPT,
            path: path.into(),
            status,
        }
    }
}

/// Error payload of a failed call.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteError {
    pub message: String,
    pub code: Option<i64>,
}

impl From<RemoteError> for FlapiError {
    fn from(err: RemoteError) -> Self {
        FlapiError::Remote {
            message: err.message,
            code: err.code,
        }
    }
}

/// Server-pushed signal notification.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalNotification {
    pub target: HandleId,
    pub signal: String,
    pub args: Value,
    /// Present on synchronous signals; echoed back in the `signal_result`.
    pub sigid: Value,
    pub sync: bool,
}

/// Classified inbound message.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Response {
        id: u64,
        outcome: std::result::Result<Value, RemoteError>,
    },
    Signal(SignalNotification),
    /// Anything else: no id and not a signal.
    Unsolicited { method: Option<String> },
}

impl Inbound {
    /// Classify a decoded envelope.
    pub fn classify(message: Value) -> Result<Self> {
        let mut fields = match message {
            Value::Object(fields) => fields,
            _ => return Err(FlapiError::protocol("message is not an object")),
        };

        let method = fields.get("method").and_then(Value::as_str).map(String::from);
        if method.as_deref() == Some(METHOD_SIGNAL) {
            return Self::classify_signal(fields).map(Inbound::Signal);
        }

        let id = match fields.get("id").and_then(Value::as_i64) {
            Some(id) if id >= 0 => id as u64,
            _ => return Ok(Inbound::Unsolicited { method }),
        };

        let outcome = match fields.remove("error") {
            Some(error) if !error.is_null() => Err(remote_error(&error)),
            _ => Ok(fields.remove("result").unwrap_or_default()),
        };
        Ok(Inbound::Response { id, outcome })
    }

    fn classify_signal(
        mut fields: std::collections::BTreeMap<String, Value>,
    ) -> Result<SignalNotification> {
        let target = fields
            .get("target")
            .and_then(HandleId::from_value)
            .ok_or_else(|| FlapiError::protocol("'signal' message has no target"))?;

        let mut params = match fields.remove("params") {
            Some(Value::Object(params)) => params,
            _ => return Err(FlapiError::protocol("'signal' message has no params")),
        };

        let signal = match params.remove("signal") {
            Some(Value::String(name)) => name,
            _ => return Err(FlapiError::protocol("'signal' params has no signal name")),
        };

        Ok(SignalNotification {
            target,
            signal,
            args: params.remove("args").unwrap_or_default(),
            sigid: params.remove("sigid").unwrap_or_default(),
            sync: params.get("sync").is_some_and(Value::is_truthy_flag),
        })
    }
}

fn remote_error(error: &Value) -> RemoteError {
    match error {
        Value::String(message) => RemoteError {
            message: message.clone(),
            code: None,
        },
        other => RemoteError {
            message: other
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("Unknown error")
                .to_string(),
            code: other.get("code").and_then(Value::as_i64),
        },
    }
}

/// Read the correlation id from a raw (undecoded) envelope.
pub fn peek_id(raw: &serde_json::Value) -> Option<u64> {
    if raw.get("method").and_then(|m| m.as_str()) == Some(METHOD_SIGNAL) {
        return None;
    }
    raw.get("id").and_then(|id| id.as_u64())
}
