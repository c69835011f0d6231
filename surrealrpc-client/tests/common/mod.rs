//! In-process WebSocket peer for client integration tests.

#![allow(dead_code)]

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use surrealrpc_client::{ConnectionConfig, Scheme};
use surrealrpc_protocol::{Decoder, Encoder, RequestEnvelope, ResponseEnvelope, ResponseError};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

/// What the peer does in answer to one request.
#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    Binary(Vec<u8>),
    Close,
}

impl Reply {
    pub fn ok(id: &str, result: Value) -> Self {
        let response = ResponseEnvelope::ok(id, result);
        Reply::Text(Encoder::encode_response(&response).unwrap())
    }

    pub fn error(id: &str, code: i64, message: &str) -> Self {
        let response = ResponseEnvelope::error(id, ResponseError::new(code, message));
        Reply::Text(Encoder::encode_response(&response).unwrap())
    }
}

type Handler = dyn Fn(&RequestEnvelope) -> Vec<Reply> + Send + Sync;

/// A peer that answers every request through a handler.
pub struct MockServer {
    addr: SocketAddr,
    task: JoinHandle<()>,
}

impl MockServer {
    pub async fn start<F>(handler: F) -> Self
    where
        F: Fn(&RequestEnvelope) -> Vec<Reply> + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handler: Arc<Handler> = Arc::new(handler);

        let task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(serve(stream, handler.clone()));
            }
        });

        Self { addr, task }
    }

    /// A peer that answers `ping` with `null` and everything else with an
    /// echo of its params.
    pub async fn echo() -> Self {
        Self::start(|request| match request.method.as_str() {
            "ping" => vec![Reply::ok(&request.id, Value::Null)],
            _ => vec![Reply::ok(&request.id, Value::Array(request.params.clone()))],
        })
        .await
    }

    pub fn config(&self) -> ConnectionConfig {
        ConnectionConfig::from_components(Scheme::Ws, "127.0.0.1", self.addr.port())
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve(stream: TcpStream, handler: Arc<Handler>) {
    let Ok(ws) = accept_async(stream).await else {
        return;
    };
    let (mut sink, mut source) = ws.split();
    let decoder = Decoder::new();

    while let Some(Ok(message)) = source.next().await {
        let text = match message {
            Message::Text(text) => text,
            Message::Close(_) => return,
            _ => continue,
        };
        let Ok(request) = decoder.decode_request(&text) else {
            continue;
        };
        for reply in handler(&request) {
            let sent = match reply {
                Reply::Text(text) => sink.send(Message::Text(text)).await,
                Reply::Binary(bytes) => sink.send(Message::Binary(bytes)).await,
                Reply::Close => {
                    let _ = sink.send(Message::Close(None)).await;
                    return;
                }
            };
            if sent.is_err() {
                return;
            }
        }
    }
}

/// A port with a listener that accepts TCP but never completes the
/// WebSocket handshake.
pub async fn silent_listener() -> (TcpListener, ConnectionConfig) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let config = ConnectionConfig::from_components(Scheme::Ws, "127.0.0.1", port);
    (listener, config)
}

/// A port nothing listens on.
pub async fn closed_port() -> ConnectionConfig {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    ConnectionConfig::from_components(Scheme::Ws, "127.0.0.1", port)
}
