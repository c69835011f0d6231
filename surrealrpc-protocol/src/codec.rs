//! Encoder and decoder for RPC text frames.

use crate::error::ProtocolError;
use crate::message::{RequestEnvelope, ResponseEnvelope};
use crate::MAX_FRAME_SIZE;
use serde_json::Value;

/// Encodes envelopes into text frames.
pub struct Encoder;

impl Encoder {
    /// Encodes a request into a frame.
    pub fn encode_request(request: &RequestEnvelope) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(request)?)
    }

    /// Encodes a response into a frame.
    pub fn encode_response(response: &ResponseEnvelope) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(response)?)
    }
}

/// Decodes and validates inbound frames.
#[derive(Debug, Clone)]
pub struct Decoder {
    max_frame_size: usize,
}

impl Decoder {
    pub fn new() -> Self {
        Self {
            max_frame_size: MAX_FRAME_SIZE,
        }
    }

    pub fn with_max_frame_size(mut self, max: usize) -> Self {
        self.max_frame_size = max;
        self
    }

    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    /// Decodes a response frame.
    ///
    /// The frame must be a JSON object with an `id`.
    pub fn decode_response(&self, frame: &str) -> Result<ResponseEnvelope, ProtocolError> {
        let value = self.parse_object(frame)?;
        Ok(serde_json::from_value(value)?)
    }

    /// Decodes a request frame (used by peers and test servers).
    pub fn decode_request(&self, frame: &str) -> Result<RequestEnvelope, ProtocolError> {
        let value = self.parse_object(frame)?;
        if value.get("method").is_none() {
            return Err(ProtocolError::MissingField("method"));
        }
        Ok(serde_json::from_value(value)?)
    }

    fn parse_object(&self, frame: &str) -> Result<Value, ProtocolError> {
        if frame.len() > self.max_frame_size {
            return Err(ProtocolError::FrameTooLarge {
                size: frame.len(),
                max: self.max_frame_size,
            });
        }

        let value: Value = serde_json::from_str(frame)?;
        let object = value.as_object().ok_or(ProtocolError::NotAnObject)?;
        if !object.contains_key("id") {
            return Err(ProtocolError::MissingField("id"));
        }
        Ok(value)
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}
