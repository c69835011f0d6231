//! Protocol error types and the server error taxonomy.

use thiserror::Error;

/// Errors raised while encoding or decoding frames.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("frame is not a JSON object")]
    NotAnObject,
}

/// Closed set of failure kinds a call can end with.
///
/// `ConnectionTimeout` and `NotConnected` come from the connection itself;
/// every other kind is produced by [`classify`](crate::classify()) from a
/// server error message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
pub enum ErrorKind {
    #[error("connection timed out")]
    ConnectionTimeout,

    #[error("not connected")]
    NotConnected,

    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("no namespace or database selected")]
    NoDatabaseSelected,

    #[error("record `{table}:{id}` already exists")]
    RecordAlreadyExists { table: String, id: String },

    #[error("index `{index}` already contains record `{table}:{id}`")]
    UniqueIndexViolation {
        table: String,
        index: String,
        id: String,
    },

    #[error("{0}")]
    Generic(String),
}

impl ErrorKind {
    /// Returns whether retrying on a fresh connection may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::ConnectionTimeout | ErrorKind::NotConnected)
    }
}
