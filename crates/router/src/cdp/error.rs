//! Error types for CDP operations
//!
//! Everything a caller of `send` can see comes through `CDPError`.
//! Problems with no caller to report to are `Diagnostic`s on the event bus.

use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use super::protocol::{ErrorPayload, SessionId};

/// Result type for CDP operations
pub type Result<T> = std::result::Result<T, CDPError>;

#[derive(Error, Debug)]
pub enum CDPError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Protocol error ({method}): {code} - {message}")]
    Protocol {
        method: String,
        code: i64,
        message: String,
        data: Option<Value>,
    },

    #[error("{method} timed out after {timeout:?}")]
    Timeout { method: String, timeout: Duration },

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Session closed: {session_id}")]
    SessionClosed { session_id: SessionId },

    #[error("Unknown session: {0}")]
    UnknownSession(SessionId),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid response for {method}: {reason}")]
    InvalidResponse { method: String, reason: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl CDPError {
    pub(crate) fn protocol(method: &str, payload: ErrorPayload) -> Self {
        CDPError::Protocol {
            method: method.to_string(),
            code: payload.code,
            message: payload.message,
            data: payload.data,
        }
    }

    /// True when the failure means the scope the call ran in is gone.
    pub fn is_target_closed(&self) -> bool {
        matches!(
            self,
            CDPError::ConnectionClosed | CDPError::SessionClosed { .. }
        )
    }

    /// Protocol error code, if the remote peer rejected the command.
    pub fn protocol_code(&self) -> Option<i64> {
        match self {
            CDPError::Protocol { code, .. } => Some(*code),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_error_carries_payload() {
        let err = CDPError::protocol(
            "Foo.bar",
            ErrorPayload {
                code: -32601,
                message: "'Foo.bar' wasn't found".to_string(),
                data: None,
            },
        );
        assert_eq!(err.protocol_code(), Some(-32601));
        assert!(!err.is_target_closed());
        assert_eq!(
            err.to_string(),
            "Protocol error (Foo.bar): -32601 - 'Foo.bar' wasn't found"
        );
    }

    #[test]
    fn test_target_closed_classification() {
        assert!(CDPError::ConnectionClosed.is_target_closed());
        assert!(CDPError::SessionClosed {
            session_id: "S1".into()
        }
        .is_target_closed());
        assert!(!CDPError::Transport("x".into()).is_target_closed());
    }
}
