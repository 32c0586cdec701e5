//! Error types for the FilmLight API client.
//!
//! Every failure the session core can produce is a variant of [`FlapiError`].
//! Variants fall into the categories reported by [`FlapiError::category`]:
//! transport failures, remote call failures, protocol/routing failures, and
//! programmer misuse of a proxy.

use crate::value::HandleId;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the FLAPI client.
#[derive(Debug, Error)]
pub enum FlapiError {
    // Transport errors
    #[error("Cannot connect to {host}: {message}")]
    ConnectFailed { host: String, message: String },

    #[error("Authentication failed for {host}")]
    AuthenticationFailed { host: String },

    #[error("Not connected")]
    NotConnected,

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Transport error: {message}")]
    Transport { message: String },

    #[error("Request timeout after {0:?}")]
    Timeout(std::time::Duration),

    // Remote call errors
    #[error("{message}")]
    Remote {
        message: String,
        code: Option<i64>,
    },

    // Protocol and routing errors
    #[error("Unknown data type: {tag}")]
    UnknownDataType { tag: String },

    #[error("Unknown handle type: {tag}")]
    UnknownHandleType { tag: String },

    #[error("Signal target not found: {target}")]
    TargetNotFound { target: HandleId },

    #[error("Protocol error: {message}")]
    Protocol { message: String },

    // Misuse errors
    #[error("{class}.{operation} called on object with no instance")]
    NoInstance { class: String, operation: String },

    #[error("Static method {class}.{operation} called on instance")]
    StaticOnInstance { class: String, operation: String },

    #[error("Session for {class} object has been dropped")]
    SessionDropped { class: String },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Result type alias for FLAPI operations.
pub type Result<T> = std::result::Result<T, FlapiError>;

/// Broad classification of an error, used to decide how it propagates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Connection establishment, mid-session transport failure, or close.
    Transport,
    /// An error payload returned by the server for one call.
    Remote,
    /// Malformed traffic, unknown type tags, or unroutable signals.
    Protocol,
    /// A proxy used in a way that can never succeed.
    Misuse,
    /// Local I/O, serialization, or configuration failures.
    Local,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorCategory::Transport => "transport",
            ErrorCategory::Remote => "remote",
            ErrorCategory::Protocol => "protocol",
            ErrorCategory::Misuse => "misuse",
            ErrorCategory::Local => "local",
        };
        f.write_str(name)
    }
}

impl From<std::io::Error> for FlapiError {
    fn from(err: std::io::Error) -> Self {
        FlapiError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for FlapiError {
    fn from(err: serde_json::Error) -> Self {
        FlapiError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for FlapiError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        FlapiError::Transport {
            message: err.to_string(),
        }
    }
}

impl FlapiError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        FlapiError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Create a protocol error from a message.
    pub fn protocol(message: impl Into<String>) -> Self {
        FlapiError::Protocol {
            message: message.into(),
        }
    }

    /// Classify this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            FlapiError::ConnectFailed { .. }
            | FlapiError::AuthenticationFailed { .. }
            | FlapiError::NotConnected
            | FlapiError::ConnectionClosed
            | FlapiError::Transport { .. }
            | FlapiError::Timeout(_) => ErrorCategory::Transport,

            FlapiError::Remote { .. } => ErrorCategory::Remote,

            FlapiError::UnknownDataType { .. }
            | FlapiError::UnknownHandleType { .. }
            | FlapiError::TargetNotFound { .. }
            | FlapiError::Protocol { .. } => ErrorCategory::Protocol,

            FlapiError::NoInstance { .. }
            | FlapiError::StaticOnInstance { .. }
            | FlapiError::SessionDropped { .. } => ErrorCategory::Misuse,

            FlapiError::Json { .. } | FlapiError::Io { .. } | FlapiError::Config { .. } => {
                ErrorCategory::Local
            }
        }
    }

    /// Check if a reconnect could make this error go away.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FlapiError::ConnectFailed { .. }
                | FlapiError::ConnectionClosed
                | FlapiError::Transport { .. }
                | FlapiError::Timeout(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FlapiError::NoInstance {
            class: "Scene".into(),
            operation: "get_name".into(),
        };
        assert_eq!(
            err.to_string(),
            "Scene.get_name called on object with no instance"
        );

        let err = FlapiError::Remote {
            message: "Scene not open".into(),
            code: None,
        };
        assert_eq!(err.to_string(), "Scene not open");
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(
            FlapiError::ConnectionClosed.category(),
            ErrorCategory::Transport
        );
        assert_eq!(
            FlapiError::UnknownDataType { tag: "x".into() }.category(),
            ErrorCategory::Protocol
        );
        assert_eq!(
            FlapiError::TargetNotFound {
                target: HandleId::from(7)
            }
            .category(),
            ErrorCategory::Protocol
        );
        assert_eq!(
            FlapiError::StaticOnInstance {
                class: "Timer".into(),
                operation: "create".into()
            }
            .category(),
            ErrorCategory::Misuse
        );
    }

    #[test]
    fn test_retryable_errors() {
        assert!(FlapiError::Timeout(std::time::Duration::from_secs(5)).is_retryable());
        assert!(!FlapiError::Remote {
            message: "nope".into(),
            code: None
        }
        .is_retryable());
    }
}
