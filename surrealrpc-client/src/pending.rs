//! Pending-call table.
//!
//! Every in-flight call has exactly one [`CallRecord`] here. Records leave the
//! table only by being removed under the table lock (`resolve`, `drain_all`,
//! `close`, `take_expired`), and a record is consumed by the act of completing
//! it, so a racing response and a racing disconnect can never both complete
//! the same call.

use crate::codec::ResultDecoder;
use crate::error::ClientError;
use crate::handle::{Completion, CompletionHandle};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

/// One in-flight call.
pub struct CallRecord {
    id: String,
    method: String,
    issued_at: Instant,
    completion: Box<dyn Completion>,
}

impl CallRecord {
    /// Creates a record and the handle its caller will await.
    pub fn new<D: ResultDecoder>(
        id: impl Into<String>,
        method: impl Into<String>,
        decoder: D,
    ) -> (Self, CompletionHandle<D::Output>) {
        let id = id.into();
        let method = method.into();
        let (completion, handle) = CompletionHandle::pair(&id, &method, decoder);
        let record = Self {
            id,
            method,
            issued_at: Instant::now(),
            completion,
        };
        (record, handle)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn issued_at(&self) -> Instant {
        self.issued_at
    }

    pub fn elapsed(&self) -> Duration {
        self.issued_at.elapsed()
    }

    /// Completes the call with a successful payload, decoding it first.
    pub fn fulfill(self, value: Value) {
        self.completion.fulfill(value);
    }

    /// Completes the call with an error.
    pub fn fail(self, error: ClientError) {
        self.completion.fail(error);
    }
}

impl fmt::Debug for CallRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallRecord")
            .field("id", &self.id)
            .field("method", &self.method)
            .field("issued_at", &self.issued_at)
            .finish_non_exhaustive()
    }
}

/// Why a record could not be registered. The record is handed back so the
/// caller can fail it.
#[derive(Debug)]
pub enum RegisterError {
    /// The table belongs to a session that has ended.
    Closed(CallRecord),
    /// A record with the same id is already pending.
    Duplicate(CallRecord),
}

impl RegisterError {
    pub fn into_parts(self) -> (CallRecord, ClientError) {
        match self {
            RegisterError::Closed(record) => (record, ClientError::NotConnected),
            RegisterError::Duplicate(record) => {
                let error = ClientError::DuplicateCallId(record.id.clone());
                (record, error)
            }
        }
    }
}

#[derive(Default)]
struct Table {
    calls: HashMap<String, CallRecord>,
    closed: bool,
}

/// Concurrency-safe map from call id to in-flight call, scoped to one session.
#[derive(Default)]
pub struct PendingCalls {
    table: Mutex<Table>,
}

impl PendingCalls {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a record.
    pub fn register(&self, record: CallRecord) -> Result<(), RegisterError> {
        let mut table = self.table.lock();
        if table.closed {
            return Err(RegisterError::Closed(record));
        }
        if table.calls.contains_key(&record.id) {
            return Err(RegisterError::Duplicate(record));
        }
        table.calls.insert(record.id.clone(), record);
        Ok(())
    }

    /// Removes and returns the record for `id`, if it is still pending.
    pub fn resolve(&self, id: &str) -> Option<CallRecord> {
        self.table.lock().calls.remove(id)
    }

    /// Removes and returns every pending record.
    pub fn drain_all(&self) -> Vec<CallRecord> {
        self.table.lock().calls.drain().map(|(_, record)| record).collect()
    }

    /// Drains the table and refuses any further registrations.
    pub fn close(&self) -> Vec<CallRecord> {
        let mut table = self.table.lock();
        table.closed = true;
        table.calls.drain().map(|(_, record)| record).collect()
    }

    /// Removes and returns every record older than `timeout`.
    pub fn take_expired(&self, timeout: Duration) -> Vec<CallRecord> {
        let mut table = self.table.lock();
        let expired: Vec<String> = table
            .calls
            .values()
            .filter(|record| record.elapsed() >= timeout)
            .map(|record| record.id.clone())
            .collect();
        expired
            .iter()
            .filter_map(|id| table.calls.remove(id))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.table.lock().calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.table.lock().closed
    }
}

impl fmt::Debug for PendingCalls {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let table = self.table.lock();
        f.debug_struct("PendingCalls")
            .field("pending", &table.calls.len())
            .field("closed", &table.closed)
            .finish()
    }
}
