//! JSON envelope types for RPC requests and responses.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request message envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    /// Call identifier, echoed verbatim by the server.
    pub id: String,

    /// RPC method name.
    pub method: String,

    /// Positional parameters.
    #[serde(default)]
    pub params: Vec<Value>,
}

impl RequestEnvelope {
    pub fn new(id: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            method: method.into(),
            params: Vec::new(),
        }
    }

    pub fn with_params(mut self, params: Vec<Value>) -> Self {
        self.params = params;
        self
    }

    pub fn with_param(mut self, param: impl Into<Value>) -> Self {
        self.params.push(param.into());
        self
    }
}

/// Error details in a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseError {
    /// Server error code. Zero when the server omits it.
    #[serde(default)]
    pub code: i64,

    /// Human-readable error message, matched by the classifier.
    #[serde(default)]
    pub message: String,
}

impl ResponseError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Response message envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    /// Call identifier this response correlates to.
    #[serde(deserialize_with = "call_id::deserialize")]
    pub id: String,

    /// Result payload (for successful responses).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    /// Error details (for error responses).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ResponseError>,
}

/// The meaningful half of a response.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponsePayload {
    Result(Value),
    Error(ResponseError),
}

impl ResponseEnvelope {
    pub fn ok(id: impl Into<String>, result: Value) -> Self {
        Self {
            id: id.into(),
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: impl Into<String>, error: ResponseError) -> Self {
        Self {
            id: id.into(),
            result: None,
            error: Some(error),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Splits the envelope into its id and payload.
    ///
    /// An error wins over a result; a missing result is JSON `null`.
    pub fn into_parts(self) -> (String, ResponsePayload) {
        let payload = match self.error {
            Some(error) => ResponsePayload::Error(error),
            None => ResponsePayload::Result(self.result.unwrap_or(Value::Null)),
        };
        (self.id, payload)
    }
}

/// Accepts call ids sent either as strings or as integers.
mod call_id {
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum WireId {
        Text(String),
        Unsigned(u64),
        Signed(i64),
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match WireId::deserialize(deserializer)? {
            WireId::Text(id) => id,
            WireId::Unsigned(id) => id.to_string(),
            WireId::Signed(id) => id.to_string(),
        })
    }
}
