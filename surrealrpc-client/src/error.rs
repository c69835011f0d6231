//! Client error types.

use crate::codec::DecodeError;
use std::time::Duration;
use surrealrpc_protocol::{classify, ErrorKind};
use thiserror::Error;

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("connection timed out")]
    ConnectionTimeout,

    #[error("not connected")]
    NotConnected,

    #[error("server error {code}: {kind}")]
    Server {
        code: i64,
        message: String,
        kind: ErrorKind,
    },

    #[error("failed to decode result of `{method}`: {source}")]
    Decode {
        method: String,
        #[source]
        source: DecodeError,
    },

    #[error("call `{method}` timed out after {timeout:?}")]
    RequestTimeout { method: String, timeout: Duration },

    #[error("call id {0} is already pending")]
    DuplicateCallId(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("TLS configuration error: {0}")]
    TlsConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] surrealrpc_protocol::ProtocolError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ClientError {
    /// Builds the error for a server error response.
    pub fn from_server(code: i64, message: impl Into<String>) -> Self {
        let message = message.into();
        ClientError::Server {
            code,
            kind: classify(&message),
            message,
        }
    }

    /// Returns the taxonomy kind of this error, if it has one.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            ClientError::ConnectionTimeout => Some(ErrorKind::ConnectionTimeout),
            ClientError::NotConnected => Some(ErrorKind::NotConnected),
            ClientError::Server { kind, .. } => Some(kind.clone()),
            _ => None,
        }
    }

    /// Returns whether this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::ConnectionTimeout => true,
            ClientError::NotConnected => true,
            ClientError::RequestTimeout { .. } => true,
            ClientError::Io(_) => true,
            _ => false,
        }
    }
}

impl From<ErrorKind> for ClientError {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::ConnectionTimeout => ClientError::ConnectionTimeout,
            ErrorKind::NotConnected => ClientError::NotConnected,
            kind => ClientError::Server {
                code: 0,
                message: kind.to_string(),
                kind,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_server_classifies() {
        let err = ClientError::from_server(-32000, "There was a problem with authentication");
        assert_eq!(err.kind(), Some(ErrorKind::AuthenticationFailed));

        let err = ClientError::from_server(-32000, "Database record `person:1` already exists");
        assert_eq!(
            err.kind(),
            Some(ErrorKind::RecordAlreadyExists {
                table: "person".to_string(),
                id: "1".to_string(),
            })
        );
    }

    #[test]
    fn test_generic_server_error_keeps_message() {
        let err = ClientError::from_server(-32602, "Invalid params");
        match &err {
            ClientError::Server {
                code,
                message,
                kind,
            } => {
                assert_eq!(*code, -32602);
                assert_eq!(message, "Invalid params");
                assert_eq!(*kind, ErrorKind::Generic("Invalid params".to_string()));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().contains("Invalid params"));
    }

    #[test]
    fn test_connection_kinds() {
        assert_eq!(
            ClientError::ConnectionTimeout.kind(),
            Some(ErrorKind::ConnectionTimeout)
        );
        assert_eq!(
            ClientError::NotConnected.kind(),
            Some(ErrorKind::NotConnected)
        );
        assert_eq!(ClientError::InvalidUrl("x".to_string()).kind(), None);
    }

    #[test]
    fn test_from_error_kind() {
        assert!(matches!(
            ClientError::from(ErrorKind::NotConnected),
            ClientError::NotConnected
        ));
        assert_eq!(
            ClientError::from(ErrorKind::NoDatabaseSelected).kind(),
            Some(ErrorKind::NoDatabaseSelected)
        );
    }

    #[test]
    fn test_retryable() {
        assert!(ClientError::NotConnected.is_retryable());
        assert!(ClientError::ConnectionTimeout.is_retryable());
        assert!(!ClientError::from_server(-1, "Specify a namespace to use").is_retryable());
        assert!(!ClientError::DuplicateCallId("1".to_string()).is_retryable());
    }
}
