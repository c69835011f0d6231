//! WebSocket transport and connection lifecycle.
//!
//! The transport owns the socket. Opening it spawns a reader task and a
//! writer task and hands back a channel of [`TransportEvent`]s, which the
//! dispatcher consumes. Outbound frames go through an unbounded queue so
//! [`Transport::send`] never suspends.
//!
//! ```text
//! Disconnected --open()--> Connecting --(socket open)--> Connected
//!      ^                       |                             |
//!      +--(timeout / refused)--+                             |
//!      +-----------------(close() / socket closed)-----------+
//! ```
//!
//! Every successful open starts a new generation. Close and error callbacks
//! carry the generation they belong to and are ignored once a newer
//! generation exists.

use crate::config::{ConnectionConfig, Scheme, MAX_FRAME_SIZE_LIMIT};
use crate::error::ClientError;
use crate::tls;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async_tls_with_config, Connector, MaybeTlsStream, WebSocketStream};

/// How long `close` waits for the close frame to flush.
pub const CLOSE_GRACE: Duration = Duration::from_secs(1);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Inbound events delivered to the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A text frame (or a binary frame holding valid UTF-8).
    Frame(String),
    /// The socket closed, by either side.
    Closed { code: Option<u16>, reason: String },
    /// The socket failed.
    Failed(String),
}

/// Handed back by a successful [`Transport::open`].
#[derive(Debug)]
pub struct Opened {
    pub generation: u64,
    pub events: mpsc::UnboundedReceiver<TransportEvent>,
}

struct Link {
    outbound: mpsc::UnboundedSender<Message>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl Link {
    fn abort(&self) {
        self.reader.abort();
        self.writer.abort();
    }
}

#[derive(Default)]
struct Inner {
    generation: u64,
    link: Option<Link>,
}

/// The persistent socket and its state machine.
pub struct Transport {
    config: ConnectionConfig,
    state: watch::Sender<ConnectionState>,
    inner: Mutex<Inner>,
}

impl Transport {
    pub fn new(config: ConnectionConfig) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            config,
            state,
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Opens the socket, waiting at most `timeout`.
    ///
    /// Configuration problems are reported before any state change. Every
    /// failure after that, including the timeout, is `ConnectionTimeout`.
    pub async fn open(&self, timeout: Duration) -> Result<Opened, ClientError> {
        let connector = match self.config.scheme() {
            Some(Scheme::Ws) => Connector::Plain,
            Some(Scheme::Wss) => Connector::Rustls(tls::client_config(&self.config.tls)?),
            None => return Err(ClientError::InvalidUrl(self.config.url.clone())),
        };

        // The decoder enforces the configured limit and drops oversized
        // replies; the socket only refuses frames beyond the hard ceiling.
        let ceiling = socket_size_ceiling(self.config.max_frame_size);
        let mut ws_config = WebSocketConfig::default();
        ws_config.max_message_size = Some(ceiling);
        ws_config.max_frame_size = Some(ceiling);

        let generation = self.on_connecting();
        tracing::debug!(url = %self.config.url, generation, "Connecting...");

        let connecting = connect_async_tls_with_config(
            self.config.url.as_str(),
            Some(ws_config),
            true,
            Some(connector),
        );
        let stream = match tokio::time::timeout(timeout, connecting).await {
            Ok(Ok((stream, _response))) => stream,
            Ok(Err(e)) => {
                tracing::debug!(url = %self.config.url, "Connection failed: {}", e);
                self.on_open_failed(generation);
                return Err(ClientError::ConnectionTimeout);
            }
            Err(_) => {
                tracing::debug!(url = %self.config.url, ?timeout, "Connection timeout");
                self.on_open_failed(generation);
                return Err(ClientError::ConnectionTimeout);
            }
        };

        let (sink, source) = stream.split();
        let (events_tx, events) = mpsc::unbounded_channel();
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let link = Link {
            outbound,
            writer: tokio::spawn(write_loop(sink, outbound_rx, events_tx.clone())),
            reader: tokio::spawn(read_loop(source, events_tx)),
        };

        if !self.on_open(generation, link) {
            return Err(ClientError::NotConnected);
        }
        tracing::debug!(url = %self.config.url, generation, "WebSocket open");
        Ok(Opened { generation, events })
    }

    /// Queues a text frame. Fails at once with `NotConnected` unless connected.
    pub fn send(&self, frame: String) -> Result<(), ClientError> {
        if self.state() != ConnectionState::Connected {
            return Err(ClientError::NotConnected);
        }
        let inner = self.inner.lock();
        let link = inner.link.as_ref().ok_or(ClientError::NotConnected)?;
        link.outbound
            .send(Message::Text(frame))
            .map_err(|_| ClientError::NotConnected)
    }

    /// Closes the socket gracefully. Idempotent.
    pub async fn close(&self) {
        let link = {
            let mut inner = self.inner.lock();
            let link = inner.link.take();
            self.set_state(ConnectionState::Disconnected);
            link
        };
        let Some(mut link) = link else {
            return;
        };

        tracing::debug!("Closing WebSocket...");
        if link.outbound.send(Message::Close(None)).is_ok()
            && tokio::time::timeout(CLOSE_GRACE, &mut link.writer)
                .await
                .is_err()
        {
            tracing::debug!("Close frame not flushed within {:?}", CLOSE_GRACE);
        }
        link.abort();
    }

    /// Tears the socket down without a close handshake.
    pub fn abort(&self) {
        let mut inner = self.inner.lock();
        if let Some(link) = inner.link.take() {
            link.abort();
        }
        self.set_state(ConnectionState::Disconnected);
    }

    /// Lifecycle callback: the socket of `generation` closed.
    pub(crate) fn on_close(&self, generation: u64) {
        self.end_generation(generation, "closed");
    }

    /// Lifecycle callback: the socket of `generation` failed.
    pub(crate) fn on_transport_error(&self, generation: u64) {
        self.end_generation(generation, "failed");
    }

    fn on_connecting(&self) -> u64 {
        let mut inner = self.inner.lock();
        inner.generation += 1;
        if let Some(stale) = inner.link.take() {
            stale.abort();
        }
        self.set_state(ConnectionState::Connecting);
        inner.generation
    }

    fn on_open(&self, generation: u64, link: Link) -> bool {
        let mut inner = self.inner.lock();
        if inner.generation != generation {
            link.abort();
            return false;
        }
        inner.link = Some(link);
        self.set_state(ConnectionState::Connected);
        true
    }

    fn on_open_failed(&self, generation: u64) {
        let inner = self.inner.lock();
        if inner.generation == generation {
            self.set_state(ConnectionState::Disconnected);
        }
    }

    fn end_generation(&self, generation: u64, how: &str) {
        let mut inner = self.inner.lock();
        if inner.generation != generation {
            tracing::debug!(generation, current = inner.generation, "Ignoring stale {} event", how);
            return;
        }
        if let Some(link) = inner.link.take() {
            link.abort();
        }
        self.set_state(ConnectionState::Disconnected);
    }

    fn set_state(&self, next: ConnectionState) {
        self.state.send_if_modified(|state| {
            if *state == next {
                false
            } else {
                tracing::debug!(from = ?state, to = ?next, "Connection state changed");
                *state = next;
                true
            }
        });
    }

    /// Builds a transport that reports `Connected` without a socket. Frames
    /// passed to `send` arrive on the returned receiver.
    #[cfg(test)]
    pub(crate) fn connected_for_test() -> (Self, mpsc::UnboundedReceiver<Message>) {
        let transport = Self::new(ConnectionConfig::default());
        let generation = transport.on_connecting();
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let link = Link {
            outbound,
            reader: tokio::spawn(async {}),
            writer: tokio::spawn(async {}),
        };
        transport.on_open(generation, link);
        (transport, outbound_rx)
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        if let Some(link) = self.inner.get_mut().link.take() {
            link.abort();
        }
    }
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("url", &self.config.url)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

async fn write_loop(
    mut sink: SplitSink<WsStream, Message>,
    mut outbound: mpsc::UnboundedReceiver<Message>,
    events: mpsc::UnboundedSender<TransportEvent>,
) {
    while let Some(message) = outbound.recv().await {
        let closing = matches!(message, Message::Close(_));
        if let Err(e) = sink.send(message).await {
            tracing::debug!("write_loop: send failed: {}", e);
            let _ = events.send(TransportEvent::Failed(e.to_string()));
            return;
        }
        if closing {
            return;
        }
    }
}

/// Largest message the WebSocket layer accepts for a decoder `limit`.
fn socket_size_ceiling(limit: usize) -> usize {
    limit.saturating_mul(2).max(MAX_FRAME_SIZE_LIMIT)
}

async fn read_loop(
    mut source: SplitStream<WsStream>,
    events: mpsc::UnboundedSender<TransportEvent>,
) {
    while let Some(message) = source.next().await {
        let event = match message {
            Ok(Message::Text(text)) => TransportEvent::Frame(text),
            Ok(Message::Binary(bytes)) => match String::from_utf8(bytes) {
                Ok(text) => TransportEvent::Frame(text),
                Err(_) => {
                    tracing::warn!("read_loop: dropping binary frame that is not UTF-8");
                    continue;
                }
            },
            Ok(Message::Close(frame)) => {
                let (code, reason) = match frame {
                    Some(frame) => (Some(u16::from(frame.code)), frame.reason.into_owned()),
                    None => (None, String::new()),
                };
                let _ = events.send(TransportEvent::Closed { code, reason });
                return;
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => continue,
            Err(e) => {
                tracing::debug!("read_loop: receive failed: {}", e);
                let _ = events.send(TransportEvent::Failed(e.to_string()));
                return;
            }
        };
        if events.send(event).is_err() {
            return;
        }
    }
    let _ = events.send(TransportEvent::Closed {
        code: None,
        reason: "stream ended".to_string(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_transport_is_disconnected() {
        let transport = Transport::new(ConnectionConfig::default());
        assert_eq!(transport.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_send_while_disconnected_fails_synchronously() {
        let transport = Transport::new(ConnectionConfig::default());
        let err = transport.send("{}".to_string()).unwrap_err();
        assert!(matches!(err, ClientError::NotConnected));
    }

    #[test]
    fn test_socket_ceiling_exceeds_decoder_limit() {
        assert_eq!(socket_size_ceiling(1024), MAX_FRAME_SIZE_LIMIT);
        assert_eq!(socket_size_ceiling(MAX_FRAME_SIZE_LIMIT), 2 * MAX_FRAME_SIZE_LIMIT);
        assert!(socket_size_ceiling(16 * 1024 * 1024) > 16 * 1024 * 1024);
    }

    #[tokio::test]
    async fn test_open_rejects_non_websocket_url() {
        let transport = Transport::new(ConnectionConfig::new("http://localhost:8000/rpc"));
        let err = transport.open(Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, ClientError::InvalidUrl(_)));
        assert_eq!(transport.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_open_refused_is_connection_timeout() {
        // Bind then drop to get a port nothing listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let config = ConnectionConfig::from_components(Scheme::Ws, "127.0.0.1", port);
        let transport = Transport::new(config);
        let mut states = transport.subscribe();

        let err = transport.open(Duration::from_secs(2)).await.unwrap_err();
        assert!(matches!(err, ClientError::ConnectionTimeout));
        assert_eq!(transport.state(), ConnectionState::Disconnected);
        assert!(states.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_send_queues_text_frame() {
        let (transport, mut outbound) = Transport::connected_for_test();
        assert_eq!(transport.state(), ConnectionState::Connected);

        transport.send("{\"id\":\"1\"}".to_string()).unwrap();
        assert_eq!(
            outbound.recv().await,
            Some(Message::Text("{\"id\":\"1\"}".to_string()))
        );
    }

    #[tokio::test]
    async fn test_send_fails_when_writer_is_gone() {
        let (transport, outbound) = Transport::connected_for_test();
        drop(outbound);
        assert!(matches!(
            transport.send("{}".to_string()),
            Err(ClientError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_stale_close_is_ignored() {
        let (transport, _outbound) = Transport::connected_for_test();
        transport.on_close(0);
        assert_eq!(transport.state(), ConnectionState::Connected);

        transport.on_transport_error(1);
        assert_eq!(transport.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (transport, _outbound) = Transport::connected_for_test();
        transport.close().await;
        assert_eq!(transport.state(), ConnectionState::Disconnected);
        transport.close().await;
        assert_eq!(transport.state(), ConnectionState::Disconnected);
        assert!(transport.send("{}".to_string()).is_err());
    }
}
