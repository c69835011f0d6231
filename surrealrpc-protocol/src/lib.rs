//! # surrealrpc-protocol
//!
//! Wire protocol for the SurrealDB WebSocket RPC endpoint.
//!
//! This crate provides:
//! - Request/response envelope types (one JSON text frame per message)
//! - Frame encoding and validated response decoding
//! - The closed [`ErrorKind`] taxonomy and the server error classifier

pub mod classify;
pub mod codec;
pub mod error;
pub mod message;

pub use classify::classify;
pub use codec::{Decoder, Encoder};
pub use error::{ErrorKind, ProtocolError};
pub use message::{RequestEnvelope, ResponseEnvelope, ResponseError, ResponsePayload};

/// Default port of a SurrealDB server.
pub const DEFAULT_PORT: u16 = 8000;

/// Path of the RPC endpoint on the server.
pub const RPC_PATH: &str = "/rpc";

/// Maximum inbound frame size (16 MiB).
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;
