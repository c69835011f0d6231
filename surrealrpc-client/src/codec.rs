//! Result decoders.
//!
//! A [`ResultDecoder`] is supplied with every call and describes how the
//! successful `result` payload becomes the value the caller awaits. The core
//! never inspects types at runtime; it only hands the JSON payload to the
//! decoder registered for that call.

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::marker::PhantomData;
use thiserror::Error;

/// Error produced by a result decoder.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Custom(String),
}

impl DecodeError {
    pub fn custom(message: impl fmt::Display) -> Self {
        DecodeError::Custom(message.to_string())
    }
}

/// Turns a successful result payload into the caller's type.
pub trait ResultDecoder: Send + 'static {
    type Output: Send + 'static;

    fn decode(&self, value: Value) -> Result<Self::Output, DecodeError>;
}

/// No result expected: the payload is discarded.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoResult;

impl ResultDecoder for NoResult {
    type Output = ();

    fn decode(&self, _value: Value) -> Result<(), DecodeError> {
        Ok(())
    }
}

/// Keeps the raw JSON payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct Raw;

impl ResultDecoder for Raw {
    type Output = Value;

    fn decode(&self, value: Value) -> Result<Value, DecodeError> {
        Ok(value)
    }
}

/// Deserializes the payload with serde.
pub struct Json<T>(PhantomData<fn() -> T>);

impl<T> Json<T> {
    pub fn new() -> Self {
        Json(PhantomData)
    }
}

impl<T> Default for Json<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Json<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Json")
            .field(&std::any::type_name::<T>())
            .finish()
    }
}

impl<T> ResultDecoder for Json<T>
where
    T: DeserializeOwned + Send + 'static,
{
    type Output = T;

    fn decode(&self, value: Value) -> Result<T, DecodeError> {
        Ok(serde_json::from_value(value)?)
    }
}

/// Deserializes a list of records.
///
/// The server answers with a bare object when only one record matches and
/// with `null` when nothing does, so both are accepted: an object becomes a
/// one-element list and `null` an empty one.
pub struct JsonList<T>(PhantomData<fn() -> T>);

impl<T> JsonList<T> {
    pub fn new() -> Self {
        JsonList(PhantomData)
    }
}

impl<T> Default for JsonList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for JsonList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("JsonList")
            .field(&std::any::type_name::<T>())
            .finish()
    }
}

impl<T> ResultDecoder for JsonList<T>
where
    T: DeserializeOwned + Send + 'static,
{
    type Output = Vec<T>;

    fn decode(&self, value: Value) -> Result<Vec<T>, DecodeError> {
        match value {
            Value::Null => Ok(Vec::new()),
            Value::Array(items) => items
                .into_iter()
                .map(|item| serde_json::from_value(item).map_err(DecodeError::from))
                .collect(),
            Value::Object(_) => Ok(vec![serde_json::from_value(value)?]),
            other => Err(DecodeError::custom(format!(
                "expected a list or a record, got {other}"
            ))),
        }
    }
}

/// Decoder backed by a closure. See [`decode_with`].
pub struct FnDecoder<F>(F);

impl<F, T> ResultDecoder for FnDecoder<F>
where
    F: Fn(Value) -> Result<T, DecodeError> + Send + 'static,
    T: Send + 'static,
{
    type Output = T;

    fn decode(&self, value: Value) -> Result<T, DecodeError> {
        (self.0)(value)
    }
}

/// Builds a decoder from a closure.
pub fn decode_with<F, T>(f: F) -> FnDecoder<F>
where
    F: Fn(Value) -> Result<T, DecodeError> + Send + 'static,
    T: Send + 'static,
{
    FnDecoder(f)
}
