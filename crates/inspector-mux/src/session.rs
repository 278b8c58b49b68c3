//! Per-session state: the pending-request table and the event sink.

use std::collections::HashMap;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{broadcast, oneshot};

use crate::error::{Error, Result};
use crate::protocol::WorkerInfo;

/// Event emitted by a worker, delivered to that session's subscribers only.
#[derive(Debug, Clone)]
pub struct SessionEvent {
    pub method: String,
    pub params: Value,
}

type PendingTable = HashMap<u64, oneshot::Sender<Result<Value>>>;

/// Pending requests plus the teardown flag, guarded by one mutex so a
/// registration can never slip in after the table was drained.
struct PendingState {
    closed: bool,
    table: PendingTable,
}

const EVENT_CAPACITY: usize = 256;

/// One logical debugging conversation with a worker thread.
///
/// Owns the table of requests awaiting a response and the broadcast sink
/// that per-session event listeners subscribe to. A request id lives in at
/// most one session's table at a time and is removed exactly once: on
/// response, on send failure, or when the session is torn down.
pub struct VirtualSession {
    worker_info: WorkerInfo,
    pending: Mutex<PendingState>,
    events: broadcast::Sender<SessionEvent>,
}

impl VirtualSession {
    pub(crate) fn new(worker_info: WorkerInfo) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            worker_info,
            pending: Mutex::new(PendingState {
                closed: false,
                table: HashMap::new(),
            }),
            events,
        }
    }

    /// Metadata delivered on attach, with the sessionId folded in.
    pub fn worker_info(&self) -> &WorkerInfo {
        &self.worker_info
    }

    /// The sessionId this conversation is addressed by.
    pub fn session_id(&self) -> &str {
        &self.worker_info.session_id
    }

    /// Subscribes to events emitted by this worker.
    ///
    /// Events for other sessions are never observed here; listeners match on
    /// [`SessionEvent::method`] for the topics they care about.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Registers a pending request.
    ///
    /// Refused once the session has been torn down: the session is gone from
    /// the registry by then, so no response could ever settle the entry.
    pub(crate) fn add_pending(&self, id: u64, tx: oneshot::Sender<Result<Value>>) -> Result<()> {
        let mut pending = self.pending.lock();
        if pending.closed {
            return Err(Error::SessionInvalid);
        }
        pending.table.insert(id, tx);
        Ok(())
    }

    /// Removes a pending request; `None` for a duplicate or stale delivery.
    pub(crate) fn take_pending(&self, id: u64) -> Option<oneshot::Sender<Result<Value>>> {
        self.pending.lock().table.remove(&id)
    }

    /// Fails every outstanding request of this session and refuses new ones.
    ///
    /// Runs when the session is detached or displaced by a duplicate attach,
    /// so in-flight callers settle instead of waiting forever.
    pub(crate) fn reject_all_pending(&self, make_err: impl Fn() -> Error) {
        let drained: Vec<_> = {
            let mut pending = self.pending.lock();
            pending.closed = true;
            pending.table.drain().collect()
        };
        for (id, tx) in drained {
            if tx.send(Err(make_err())).is_err() {
                tracing::debug!(id, "pending request already abandoned by caller");
            }
        }
    }

    pub(crate) fn emit(&self, event: SessionEvent) {
        // A send error only means there are no subscribers right now.
        let _ = self.events.send(event);
    }

    #[cfg(test)]
    pub(crate) fn pending_count(&self) -> usize {
        self.pending.lock().table.len()
    }
}
