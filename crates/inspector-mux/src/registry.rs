//! Session registry: sessionId → [`VirtualSession`], driven by attach and
//! detach notifications from the control channel.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::error::Error;
use crate::protocol::{AttachedToWorker, WorkerInfo};
use crate::session::VirtualSession;

/// Attach/detach notification delivered to inspector-level listeners.
#[derive(Clone)]
pub enum InspectorEvent {
    /// A worker session came up.
    Attached(Arc<VirtualSession>),
    /// A worker session went away.
    Detached(String),
}

const EVENT_CAPACITY: usize = 64;

/// Owns the live sessions of one inspector instance.
///
/// Entries are created on attach notifications and destroyed on detach
/// notifications; nothing else mutates the mapping.
pub struct SessionRegistry {
    sessions: DashMap<Arc<str>, Arc<VirtualSession>>,
    events: broadcast::Sender<InspectorEvent>,
}

impl SessionRegistry {
    pub(crate) fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            sessions: DashMap::new(),
            events,
        }
    }

    /// Handles an attach notification.
    ///
    /// A duplicate attach for a live sessionId replaces the entry; the
    /// displaced session's outstanding requests are rejected with
    /// [`Error::SessionInvalid`] rather than left unsettled.
    pub(crate) fn attach(&self, notification: AttachedToWorker) -> Arc<VirtualSession> {
        let AttachedToWorker {
            session_id,
            worker_info,
        } = notification;

        let session = Arc::new(VirtualSession::new(WorkerInfo {
            session_id: session_id.clone(),
            extra: worker_info,
        }));

        let key: Arc<str> = Arc::from(session_id.as_str());
        if let Some(displaced) = self.sessions.insert(key, Arc::clone(&session)) {
            tracing::warn!(%session_id, "duplicate attach displaced a live session");
            displaced.reject_all_pending(|| Error::SessionInvalid);
        }

        tracing::debug!(%session_id, "worker session attached");
        let _ = self.events.send(InspectorEvent::Attached(Arc::clone(&session)));
        session
    }

    /// Handles a detach notification.
    ///
    /// Outstanding requests of the removed session are rejected with
    /// [`Error::SessionInvalid`]; no response can arrive for them anymore.
    pub(crate) fn detach(&self, session_id: &str) {
        if let Some((_, session)) = self.sessions.remove(session_id) {
            tracing::debug!(%session_id, "worker session detached");
            session.reject_all_pending(|| Error::SessionInvalid);
        }
        let _ = self
            .events
            .send(InspectorEvent::Detached(session_id.to_string()));
    }

    /// Looks up a session for dispatch; `None` means the delivery is late or
    /// misaddressed and is dropped by the caller.
    pub(crate) fn lookup(&self, session_id: &str) -> Option<Arc<VirtualSession>> {
        self.sessions
            .get(session_id)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Snapshot of the currently attached sessions.
    pub fn sessions(&self) -> Vec<Arc<VirtualSession>> {
        self.sessions
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<InspectorEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::sync::oneshot;

    fn attach_notification(session_id: &str) -> AttachedToWorker {
        serde_json::from_value(json!({
            "sessionId": session_id,
            "workerInfo": {"workerId": "1"}
        }))
        .unwrap()
    }

    #[test]
    fn test_attach_registers_session() {
        let registry = SessionRegistry::new();
        let session = registry.attach(attach_notification("s1"));

        assert_eq!(session.session_id(), "s1");
        assert_eq!(session.worker_info().extra["workerId"], "1");
        assert!(registry.lookup("s1").is_some());
        assert_eq!(registry.sessions().len(), 1);
    }

    #[tokio::test]
    async fn test_attach_emits_notification() {
        let registry = SessionRegistry::new();
        let mut events = registry.subscribe();

        registry.attach(attach_notification("s1"));

        match events.recv().await.unwrap() {
            InspectorEvent::Attached(session) => assert_eq!(session.session_id(), "s1"),
            InspectorEvent::Detached(_) => panic!("Expected Attached"),
        }
    }

    #[tokio::test]
    async fn test_duplicate_attach_rejects_displaced_pending() {
        let registry = SessionRegistry::new();
        let first = registry.attach(attach_notification("s1"));

        let (tx, rx) = oneshot::channel();
        first.add_pending(1, tx).unwrap();

        let second = registry.attach(attach_notification("s1"));

        assert!(rx.await.unwrap().unwrap_err().is_session_invalid());
        assert_eq!(first.pending_count(), 0);
        assert!(Arc::ptr_eq(&registry.lookup("s1").unwrap(), &second));
    }

    #[tokio::test]
    async fn test_detach_removes_session_and_rejects_pending() {
        let registry = SessionRegistry::new();
        let session = registry.attach(attach_notification("s1"));
        let mut events = registry.subscribe();

        let (tx, rx) = oneshot::channel();
        session.add_pending(1, tx).unwrap();

        registry.detach("s1");

        assert!(registry.lookup("s1").is_none());
        assert!(registry.sessions().is_empty());
        assert!(rx.await.unwrap().unwrap_err().is_session_invalid());
        match events.recv().await.unwrap() {
            InspectorEvent::Detached(id) => assert_eq!(id, "s1"),
            InspectorEvent::Attached(_) => panic!("Expected Detached"),
        }
    }

    #[test]
    fn test_registration_after_detach_is_refused() {
        let registry = SessionRegistry::new();
        let session = registry.attach(attach_notification("s1"));

        // A sender resolved the session, then the detach notification ran
        // before the request made it into the pending table. The late
        // registration must fail instead of waiting forever on a table
        // nothing will ever settle.
        let looked_up = registry.lookup("s1").unwrap();
        registry.detach("s1");

        let (tx, _rx) = oneshot::channel();
        let err = looked_up.add_pending(1, tx).unwrap_err();

        assert!(err.is_session_invalid());
        assert_eq!(session.pending_count(), 0);
    }

    #[test]
    fn test_detach_unknown_session_is_harmless() {
        let registry = SessionRegistry::new();
        registry.detach("never-attached");
        assert!(registry.sessions().is_empty());
    }
}
