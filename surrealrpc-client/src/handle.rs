//! Completion handles.

use crate::codec::ResultDecoder;
use crate::error::ClientError;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// Type-erased resolving half of a call.
///
/// Both methods consume the box, so a completion resolves at most once.
pub(crate) trait Completion: Send {
    fn fulfill(self: Box<Self>, value: Value);

    fn fail(self: Box<Self>, error: ClientError);
}

struct TypedCompletion<D: ResultDecoder> {
    method: String,
    decoder: D,
    tx: oneshot::Sender<Result<D::Output, ClientError>>,
}

impl<D: ResultDecoder> Completion for TypedCompletion<D> {
    fn fulfill(self: Box<Self>, value: Value) {
        let TypedCompletion {
            method,
            decoder,
            tx,
        } = *self;
        let outcome = decoder
            .decode(value)
            .map_err(|source| ClientError::Decode { method, source });
        // The caller may have dropped its handle.
        let _ = tx.send(outcome);
    }

    fn fail(self: Box<Self>, error: ClientError) {
        let _ = self.tx.send(Err(error));
    }
}

/// Caller-side result slot of one call.
///
/// Resolves exactly once, with the decoded value or a [`ClientError`].
/// Resolution happens on the dispatcher task, not on the caller's.
#[must_use = "a completion handle does nothing unless awaited"]
#[derive(Debug)]
pub struct CompletionHandle<T> {
    id: Option<String>,
    rx: oneshot::Receiver<Result<T, ClientError>>,
}

impl<T: Send + 'static> CompletionHandle<T> {
    /// Creates a handle together with its resolving half.
    pub(crate) fn pair<D>(id: &str, method: &str, decoder: D) -> (Box<dyn Completion>, Self)
    where
        D: ResultDecoder<Output = T>,
    {
        let (tx, rx) = oneshot::channel();
        let completion = TypedCompletion {
            method: method.to_string(),
            decoder,
            tx,
        };
        let handle = Self {
            id: Some(id.to_string()),
            rx,
        };
        (Box::new(completion), handle)
    }

    /// Creates a handle that is already failed, for calls rejected before
    /// an id was assigned.
    pub(crate) fn failed(error: ClientError) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(Err(error));
        Self { id: None, rx }
    }
}

impl<T> CompletionHandle<T> {
    /// Call id, or `None` if the call was rejected before it was issued.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

impl<T> Future for CompletionHandle<T> {
    type Output = Result<T, ClientError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            // Resolving half dropped without an outcome: the session is gone.
            Poll::Ready(Err(_)) => Poll::Ready(Err(ClientError::NotConnected)),
            Poll::Pending => Poll::Pending,
        }
    }
}
