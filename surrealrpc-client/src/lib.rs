//! # surrealrpc-client
//!
//! Async RPC client for the SurrealDB WebSocket endpoint.
//!
//! This crate provides:
//! - Call correlation: unique ids, a pending-call table, exactly-once completion
//! - Connection lifecycle over a WebSocket, with optional TLS
//! - Typed server errors and pluggable result decoders
//! - Per-call timeouts and wire message observers

pub mod client;
pub mod codec;
pub mod config;
mod dispatcher;
pub mod error;
pub mod handle;
pub mod id;
pub mod observer;
pub mod pending;
pub mod tls;
pub mod transport;

pub use client::RpcClient;
pub use codec::{decode_with, DecodeError, FnDecoder, Json, JsonList, NoResult, Raw, ResultDecoder};
pub use config::{ConfigError, ConnectionConfig, Scheme, TlsClientConfig};
pub use error::ClientError;
pub use handle::CompletionHandle;
pub use id::IdGenerator;
pub use observer::{MessageObserver, NoopObserver, TracingObserver};
pub use pending::{CallRecord, PendingCalls, RegisterError};
pub use surrealrpc_protocol::ErrorKind;
pub use transport::{ConnectionState, Transport, TransportEvent};
