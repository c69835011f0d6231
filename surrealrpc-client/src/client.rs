//! High-level client API.

use crate::codec::{NoResult, ResultDecoder};
use crate::config::ConnectionConfig;
use crate::dispatcher::Dispatcher;
use crate::error::ClientError;
use crate::handle::CompletionHandle;
use crate::id::IdGenerator;
use crate::observer::{MessageObserver, NoopObserver};
use crate::pending::{CallRecord, PendingCalls};
use crate::transport::{ConnectionState, Transport};
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use surrealrpc_protocol::{Encoder, RequestEnvelope};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use uuid::Uuid;

/// Shortest and longest interval between watchdog sweeps.
const WATCHDOG_MIN_PERIOD: Duration = Duration::from_millis(10);
const WATCHDOG_MAX_PERIOD: Duration = Duration::from_secs(1);

/// State scoped to one connection. Replaced on every connect.
struct Session {
    id: Uuid,
    ids: IdGenerator,
    pending: Arc<PendingCalls>,
    dispatcher: JoinHandle<()>,
    watchdog: Option<JoinHandle<()>>,
}

impl Session {
    /// Ends the session: fails whatever is still pending.
    fn shutdown(&self) {
        if let Some(ref watchdog) = self.watchdog {
            watchdog.abort();
        }
        let drained = self.pending.close();
        if !drained.is_empty() {
            tracing::debug!(session = %self.id, count = drained.len(), "Failing pending calls");
        }
        for record in drained {
            record.fail(ClientError::NotConnected);
        }
    }
}

/// RPC client for a SurrealDB WebSocket endpoint.
///
/// Calls may be issued from any number of tasks at once. Each call gets a
/// [`CompletionHandle`] that resolves exactly once: with the decoded result,
/// with a server error, or with `NotConnected` if the connection goes away
/// first.
pub struct RpcClient {
    config: ConnectionConfig,
    transport: Arc<Transport>,
    session: RwLock<Option<Arc<Session>>>,
    /// Serializes connect and disconnect.
    lifecycle: Mutex<()>,
    observer: Arc<dyn MessageObserver>,
}

impl RpcClient {
    /// Creates a new client (not yet connected).
    pub fn new(config: ConnectionConfig) -> Self {
        Self::with_observer(config, Arc::new(NoopObserver))
    }

    /// Creates a new client that reports every frame to `observer`.
    pub fn with_observer(config: ConnectionConfig, observer: Arc<dyn MessageObserver>) -> Self {
        Self {
            transport: Arc::new(Transport::new(config.clone())),
            config,
            session: RwLock::new(None),
            lifecycle: Mutex::new(()),
            observer,
        }
    }

    /// Creates a client and connects it if `auto_connect` is set.
    pub async fn start(config: ConnectionConfig) -> Result<Self, ClientError> {
        let client = Self::new(config);
        if client.config.auto_connect {
            client.connect_default().await?;
        }
        Ok(client)
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Connects, waiting at most `timeout`. A no-op when already connected.
    ///
    /// The deadline also covers waiting for a concurrent connect or
    /// disconnect to finish.
    pub async fn connect(&self, timeout: Duration) -> Result<(), ClientError> {
        let deadline = Instant::now() + timeout;
        let _guard = tokio::time::timeout_at(deadline, self.lifecycle.lock())
            .await
            .map_err(|_| {
                tracing::debug!(?timeout, "Connection timeout waiting for lifecycle lock");
                ClientError::ConnectionTimeout
            })?;
        if self.is_connected() {
            return Ok(());
        }

        // A session left over from a dropped socket.
        if let Some(stale) = self.session.write().take() {
            stale.shutdown();
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        let opened = self.transport.open(remaining).await?;

        let id = Uuid::new_v4();
        let pending = Arc::new(PendingCalls::new());
        let dispatcher = Dispatcher::new(
            id,
            opened.generation,
            pending.clone(),
            self.transport.clone(),
            self.observer.clone(),
        );
        let dispatcher = tokio::spawn(dispatcher.run(opened.events));
        let watchdog = self
            .config
            .request_timeout
            .map(|timeout| tokio::spawn(watchdog(id, pending.clone(), timeout)));

        *self.session.write() = Some(Arc::new(Session {
            id,
            ids: IdGenerator::new(),
            pending,
            dispatcher,
            watchdog,
        }));

        tracing::info!(session = %id, url = %self.config.url, "Connected");
        Ok(())
    }

    /// Connects using the configured connect timeout.
    pub async fn connect_default(&self) -> Result<(), ClientError> {
        self.connect(self.config.connect_timeout).await
    }

    /// Closes the connection and fails every pending call with
    /// `NotConnected`. A no-op when already disconnected.
    pub async fn disconnect(&self) {
        let _guard = self.lifecycle.lock().await;
        let session = self.session.write().take();
        self.transport.close().await;
        if let Some(session) = session {
            session.shutdown();
            tracing::info!(session = %session.id, "Disconnected");
        }
    }

    /// Issues a call and returns the handle its result arrives on.
    ///
    /// Never suspends. A call issued while not connected, or whose frame
    /// cannot be sent, gets a handle that is already failed.
    pub fn issue_call<D: ResultDecoder>(
        &self,
        method: &str,
        params: Vec<Value>,
        decoder: D,
    ) -> CompletionHandle<D::Output> {
        let Some(session) = self.current_session() else {
            return CompletionHandle::failed(ClientError::NotConnected);
        };

        let id = session.ids.next_id();
        let (record, handle) = CallRecord::new(id.clone(), method, decoder);

        // Registered before sending, so a fast reply always finds its record.
        if let Err(e) = session.pending.register(record) {
            let (record, error) = e.into_parts();
            record.fail(error);
            return handle;
        }

        let request = RequestEnvelope::new(&id, method).with_params(params);
        let sent = Encoder::encode_request(&request)
            .map_err(ClientError::from)
            .and_then(|frame| {
                self.observer.on_outgoing(&frame);
                self.transport.send(frame)
            });

        match sent {
            Ok(()) => {
                tracing::debug!(session = %session.id, id = %id, method, "Call sent");
            }
            Err(e) => {
                tracing::debug!(session = %session.id, id = %id, method, "Call not sent: {}", e);
                if let Some(record) = session.pending.resolve(&id) {
                    record.fail(e);
                }
            }
        }
        handle
    }

    /// Issues a call and waits for its result.
    pub async fn call<D: ResultDecoder>(
        &self,
        method: &str,
        params: Vec<Value>,
        decoder: D,
    ) -> Result<D::Output, ClientError> {
        self.issue_call(method, params, decoder).await
    }

    /// Sends `ping`.
    pub async fn ping(&self) -> Result<(), ClientError> {
        self.call("ping", Vec::new(), NoResult).await
    }

    pub fn state(&self) -> ConnectionState {
        self.transport.state()
    }

    /// Returns a receiver that sees every connection state change.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.transport.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected && self.session.read().is_some()
    }

    /// Returns the id of the current session, if connected.
    pub fn session_id(&self) -> Option<Uuid> {
        self.current_session().map(|session| session.id)
    }

    /// Returns the number of calls awaiting a response.
    pub fn pending_count(&self) -> usize {
        self.session
            .read()
            .as_ref()
            .map(|session| session.pending.len())
            .unwrap_or(0)
    }

    fn current_session(&self) -> Option<Arc<Session>> {
        if self.transport.state() != ConnectionState::Connected {
            return None;
        }
        self.session.read().clone()
    }
}

impl Drop for RpcClient {
    fn drop(&mut self) {
        if let Some(session) = self.session.get_mut().take() {
            session.dispatcher.abort();
            session.shutdown();
        }
        self.transport.abort();
    }
}

impl std::fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcClient")
            .field("url", &self.config.url)
            .field("state", &self.state())
            .field("session", &self.session_id())
            .field("pending", &self.pending_count())
            .finish()
    }
}

/// Fails calls that have waited longer than `timeout`.
async fn watchdog(session: Uuid, pending: Arc<PendingCalls>, timeout: Duration) {
    let period = (timeout / 4).clamp(WATCHDOG_MIN_PERIOD, WATCHDOG_MAX_PERIOD);
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if pending.is_closed() {
            return;
        }
        for record in pending.take_expired(timeout) {
            tracing::debug!(session = %session, id = record.id(), method = record.method(), "Call timed out");
            let method = record.method().to_string();
            record.fail(ClientError::RequestTimeout { method, timeout });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Raw;
    use crate::observer::tests::Recording;
    use tokio_tungstenite::tungstenite::Message;

    /// A client wired to a socketless transport.
    fn connected_client(
        observer: Arc<dyn MessageObserver>,
    ) -> (RpcClient, tokio::sync::mpsc::UnboundedReceiver<Message>) {
        let (transport, outbound) = Transport::connected_for_test();
        let transport = Arc::new(transport);
        let client = RpcClient {
            config: ConnectionConfig::default(),
            transport,
            session: RwLock::new(None),
            lifecycle: Mutex::new(()),
            observer,
        };
        *client.session.write() = Some(Arc::new(Session {
            id: Uuid::new_v4(),
            ids: IdGenerator::new(),
            pending: Arc::new(PendingCalls::new()),
            dispatcher: tokio::spawn(async {}),
            watchdog: None,
        }));
        (client, outbound)
    }

    #[tokio::test]
    async fn test_connect_deadline_covers_lifecycle_wait() {
        let client = RpcClient::new(ConnectionConfig::default());
        let _held = client.lifecycle.lock().await;

        let started = std::time::Instant::now();
        let err = client.connect(Duration::from_millis(100)).await.unwrap_err();
        assert!(matches!(err, ClientError::ConnectionTimeout));
        assert!(started.elapsed() < Duration::from_millis(900));
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_call_while_disconnected_fails_immediately() {
        let client = RpcClient::new(ConnectionConfig::default());
        assert_eq!(client.state(), ConnectionState::Disconnected);

        let handle = client.issue_call("ping", Vec::new(), NoResult);
        assert_eq!(handle.id(), None);
        assert!(matches!(handle.await, Err(ClientError::NotConnected)));
        assert_eq!(client.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_start_without_auto_connect() {
        let client = RpcClient::start(ConnectionConfig::default()).await.unwrap();
        assert!(!client.is_connected());
        assert_eq!(client.session_id(), None);
    }

    #[tokio::test]
    async fn test_issue_call_registers_then_sends() {
        let observer = Arc::new(Recording::default());
        let (client, mut outbound) = connected_client(observer.clone());

        let handle = client.issue_call("version", Vec::new(), Raw);
        assert_eq!(handle.id(), Some("1"));
        assert_eq!(client.pending_count(), 1);

        let Some(Message::Text(frame)) = outbound.recv().await else {
            panic!("expected a text frame");
        };
        assert_eq!(frame, r#"{"id":"1","method":"version","params":[]}"#);
        assert_eq!(*observer.outgoing.lock(), vec![frame]);
    }

    #[tokio::test]
    async fn test_send_failure_removes_record() {
        let (client, outbound) = connected_client(Arc::new(NoopObserver));
        drop(outbound);

        let before = client.pending_count();
        let handle = client.issue_call("ping", Vec::new(), NoResult);
        assert!(handle.id().is_some());
        assert_eq!(client.pending_count(), before);
        assert!(matches!(handle.await, Err(ClientError::NotConnected)));
    }

    #[tokio::test]
    async fn test_disconnect_fails_pending_calls() {
        let (client, _outbound) = connected_client(Arc::new(NoopObserver));

        let handles: Vec<_> = (0..5)
            .map(|_| client.issue_call("ping", Vec::new(), NoResult))
            .collect();
        assert_eq!(client.pending_count(), 5);

        client.disconnect().await;
        assert_eq!(client.state(), ConnectionState::Disconnected);
        for handle in handles {
            assert!(matches!(handle.await, Err(ClientError::NotConnected)));
        }
        assert_eq!(client.pending_count(), 0);

        // Idempotent.
        client.disconnect().await;
    }

    #[tokio::test]
    async fn test_drop_fails_pending_calls() {
        let (client, _outbound) = connected_client(Arc::new(NoopObserver));
        let handle = client.issue_call("ping", Vec::new(), NoResult);
        drop(client);
        assert!(matches!(handle.await, Err(ClientError::NotConnected)));
    }

    #[tokio::test]
    async fn test_watchdog_times_out_calls() {
        let pending = Arc::new(PendingCalls::new());
        let (record, handle) = CallRecord::new("1", "query", Raw);
        pending.register(record).unwrap();

        let task = tokio::spawn(watchdog(
            Uuid::new_v4(),
            pending.clone(),
            Duration::from_millis(100),
        ));

        match handle.await {
            Err(ClientError::RequestTimeout { method, timeout }) => {
                assert_eq!(method, "query");
                assert_eq!(timeout, Duration::from_millis(100));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(pending.is_empty());

        pending.close();
        task.await.unwrap();
    }
}
