//! Inbound frame dispatch.
//!
//! One dispatcher task runs per session. It is the only consumer of the
//! transport's events and the only place responses meet their calls.

use crate::error::ClientError;
use crate::observer::MessageObserver;
use crate::pending::PendingCalls;
use crate::transport::{Transport, TransportEvent};
use std::sync::Arc;
use surrealrpc_protocol::{Decoder, ResponsePayload};
use tokio::sync::mpsc;
use uuid::Uuid;

pub(crate) struct Dispatcher {
    session: Uuid,
    generation: u64,
    pending: Arc<PendingCalls>,
    transport: Arc<Transport>,
    decoder: Decoder,
    observer: Arc<dyn MessageObserver>,
}

impl Dispatcher {
    pub(crate) fn new(
        session: Uuid,
        generation: u64,
        pending: Arc<PendingCalls>,
        transport: Arc<Transport>,
        observer: Arc<dyn MessageObserver>,
    ) -> Self {
        let decoder = Decoder::new().with_max_frame_size(transport.config().max_frame_size);
        Self {
            session,
            generation,
            pending,
            transport,
            decoder,
            observer,
        }
    }

    /// Consumes transport events until the socket goes away.
    pub(crate) async fn run(self, mut events: mpsc::UnboundedReceiver<TransportEvent>) {
        tracing::debug!(session = %self.session, "Dispatcher started");
        let failed = loop {
            match events.recv().await {
                Some(TransportEvent::Frame(frame)) => self.on_message(&frame),
                Some(TransportEvent::Closed { code, reason }) => {
                    tracing::info!(session = %self.session, ?code, %reason, "Connection closed by peer");
                    break false;
                }
                Some(TransportEvent::Failed(reason)) => {
                    tracing::warn!(session = %self.session, %reason, "Connection failed");
                    break true;
                }
                None => break false,
            }
        };
        self.on_close(failed);
    }

    /// Matches one inbound frame to its call and completes it.
    pub(crate) fn on_message(&self, frame: &str) {
        self.observer.on_incoming(frame);

        let envelope = match self.decoder.decode_response(frame) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(session = %self.session, "Dropping malformed frame: {}", e);
                return;
            }
        };

        let (id, payload) = envelope.into_parts();
        let Some(record) = self.pending.resolve(&id) else {
            tracing::warn!(session = %self.session, id = %id, "Dropping response for unknown call id");
            return;
        };

        tracing::debug!(
            session = %self.session,
            id = %id,
            method = record.method(),
            elapsed = ?record.elapsed(),
            "Response received"
        );
        match payload {
            ResponsePayload::Result(value) => record.fulfill(value),
            ResponsePayload::Error(error) => {
                record.fail(ClientError::from_server(error.code, error.message))
            }
        }
    }

    /// Fails every pending call and marks the transport disconnected.
    fn on_close(&self, failed: bool) {
        let drained = self.pending.close();
        if !drained.is_empty() {
            tracing::debug!(
                session = %self.session,
                count = drained.len(),
                "Failing pending calls"
            );
        }
        for record in drained {
            record.fail(ClientError::NotConnected);
        }

        if failed {
            self.transport.on_transport_error(self.generation);
        } else {
            self.transport.on_close(self.generation);
        }
        tracing::debug!(session = %self.session, "Dispatcher stopped");
    }
}
