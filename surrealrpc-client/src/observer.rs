//! Wire message observers.

/// Sees every text frame the client sends and receives.
///
/// Observers run on the calling task (outgoing) and on the dispatcher task
/// (incoming), so they must not block.
pub trait MessageObserver: Send + Sync + 'static {
    fn on_outgoing(&self, _frame: &str) {}

    fn on_incoming(&self, _frame: &str) {}
}

/// Observer that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl MessageObserver for NoopObserver {}

/// Logs every frame at trace level under the `surrealrpc::wire` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl MessageObserver for TracingObserver {
    fn on_outgoing(&self, frame: &str) {
        tracing::trace!(target: "surrealrpc::wire", direction = "out", "{}", frame);
    }

    fn on_incoming(&self, frame: &str) {
        tracing::trace!(target: "surrealrpc::wire", direction = "in", "{}", frame);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use parking_lot::Mutex;

    /// Records frames for assertions.
    #[derive(Default)]
    pub(crate) struct Recording {
        pub outgoing: Mutex<Vec<String>>,
        pub incoming: Mutex<Vec<String>>,
    }

    impl MessageObserver for Recording {
        fn on_outgoing(&self, frame: &str) {
            self.outgoing.lock().push(frame.to_string());
        }

        fn on_incoming(&self, frame: &str) {
            self.incoming.lock().push(frame.to_string());
        }
    }

    #[test]
    fn test_default_methods_are_noops() {
        NoopObserver.on_outgoing("{}");
        NoopObserver.on_incoming("{}");
        TracingObserver.on_outgoing("{}");
    }

    #[test]
    fn test_recording_observer() {
        let observer = Recording::default();
        observer.on_outgoing("a");
        observer.on_incoming("b");
        assert_eq!(*observer.outgoing.lock(), vec!["a".to_string()]);
        assert_eq!(*observer.incoming.lock(), vec!["b".to_string()]);
    }
}
