//! Request dispatch and inbound demultiplexing.
//!
//! The dispatcher allocates request ids, wraps outgoing commands in the outer
//! envelope, forwards them through the control channel, and splits inbound
//! worker traffic into responses (correlated by id) and events (no id), each
//! delivered to the owning [`VirtualSession`](crate::session::VirtualSession)
//! only.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::{Value, json};
use tokio::sync::oneshot;

use crate::channel::ControlChannel;
use crate::error::{Error, Result};
use crate::protocol::{self, Message, OuterEnvelope, Response};
use crate::registry::SessionRegistry;
use crate::session::SessionEvent;

pub(crate) struct RequestDispatcher {
    channel: Arc<dyn ControlChannel>,
    registry: Arc<SessionRegistry>,
    /// Shared across all sessions of this inspector instance; starts at 1,
    /// never reused or reset while the instance lives.
    next_id: AtomicU64,
}

impl RequestDispatcher {
    pub(crate) fn new(channel: Arc<dyn ControlChannel>, registry: Arc<SessionRegistry>) -> Self {
        Self {
            channel,
            registry,
            next_id: AtomicU64::new(1),
        }
    }

    /// Sends an inner envelope to a worker and awaits the matching response.
    ///
    /// Validation and transport failures surface here synchronously; domain
    /// and remote errors arrive later through [`dispatch`](Self::dispatch)
    /// and settle only this request.
    pub(crate) async fn post(&self, session_id: &str, message: Value) -> Result<Value> {
        let session = self
            .registry
            .lookup(session_id)
            .ok_or(Error::SessionInvalid)?;

        let method = match message.get("method").and_then(Value::as_str) {
            Some(method) => method.to_string(),
            None => return Err(Error::InvalidMessage),
        };
        let Value::Object(mut inner) = message else {
            return Err(Error::InvalidMessage);
        };

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        inner.insert("id".to_string(), json!(id));

        let envelope = OuterEnvelope {
            session_id: session_id.to_string(),
            message: serde_json::to_string(&Value::Object(inner))?,
        };
        let params = serde_json::to_value(&envelope)?;

        let (tx, rx) = oneshot::channel();
        // Fails if the session was detached between lookup and registration.
        session.add_pending(id, tx)?;

        tracing::debug!(session_id, id, %method, "forwarding command to worker");

        if let Err(err) = self.channel.post(protocol::SEND_TO_WORKER_METHOD, params).await {
            // The command never reached the worker; nothing will answer it.
            session.take_pending(id);
            return Err(err);
        }

        match rx.await {
            Ok(settled) => settled,
            Err(_) => Err(Error::ChannelClosed),
        }
    }

    /// Routes one inbound worker message to its session.
    ///
    /// Unknown sessions and unmatched ids are dropped silently: a late
    /// delivery for an already-detached session is not an error visible to
    /// callers.
    pub(crate) fn dispatch(&self, session_id: &str, raw: &str) {
        let Some(session) = self.registry.lookup(session_id) else {
            tracing::debug!(session_id, "message for unknown session dropped");
            return;
        };

        let message = match serde_json::from_str::<Message>(raw) {
            Ok(message) => message,
            Err(err) => {
                tracing::error!(session_id, %err, "failed to parse worker message");
                return;
            }
        };

        match message {
            Message::Response(response) => {
                let id = response.id;
                let Some(tx) = session.take_pending(id) else {
                    tracing::debug!(session_id, id, "response without pending request dropped");
                    return;
                };
                let _ = tx.send(settle(response));
            }
            Message::Event(event) => {
                session.emit(SessionEvent {
                    method: event.method,
                    params: event.params,
                });
            }
            Message::Unknown(value) => {
                tracing::debug!(session_id, %value, "unrecognized worker message dropped");
            }
        }
    }
}

/// Settles a correlated response: domain-level errors take precedence, then
/// explicit error objects, then the result payload.
fn settle(response: Response) -> Result<Value> {
    if let Some(result) = &response.result {
        if let Some(err) = protocol::domain_error(result) {
            return Err(err);
        }
    }
    if let Some(error) = response.error {
        return Err(Error::Remote {
            code: error.code,
            message: error.message,
        });
    }
    Ok(response.result.unwrap_or(Value::Null))
}
