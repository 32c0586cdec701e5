//! Session-level conditions broadcast to the host application.

use crate::error::{ErrorCategory, FlapiError};
use std::fmt;

/// A condition not tied to any single call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The transport could not be opened or the handshake was rejected.
    ConnectFailed { message: String },
    /// Transport error or routing/decoding failure after the session was up.
    Error {
        category: ErrorCategory,
        message: String,
    },
    /// The connection ended, locally or remotely.
    Close,
}

impl SessionEvent {
    pub fn connect_failed(err: &FlapiError) -> Self {
        SessionEvent::ConnectFailed {
            message: err.to_string(),
        }
    }

    pub fn error(err: &FlapiError) -> Self {
        SessionEvent::Error {
            category: err.category(),
            message: err.to_string(),
        }
    }
}

impl fmt::Display for SessionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionEvent::ConnectFailed { message } => write!(f, "connect failed: {}", message),
            SessionEvent::Error { category, message } => {
                write!(f, "{} error: {}", category, message)
            }
            SessionEvent::Close => f.write_str("closed"),
        }
    }
}
