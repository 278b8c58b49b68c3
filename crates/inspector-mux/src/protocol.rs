//! Wire types for the worker debugging protocol.
//!
//! Messages nest two levels deep: the outer envelope addresses one worker
//! session over the control channel, and its `message` field carries a
//! JSON-encoded inner envelope: the actual debugger command, response, or
//! event. Responses are told apart from events by the presence of an `id`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Error;

/// Command enabling worker multiplexing on the control channel.
pub const ENABLE_METHOD: &str = "NodeWorker.enable";
/// Command disabling worker multiplexing.
pub const DISABLE_METHOD: &str = "NodeWorker.disable";
/// Command forwarding an outer envelope to a worker.
pub const SEND_TO_WORKER_METHOD: &str = "NodeWorker.sendMessageToWorker";

/// Notification topic delivering `{sessionId, workerInfo}` on attach.
pub const ATTACHED_TOPIC: &str = "NodeWorker.attachedToWorker";
/// Notification topic delivering `{sessionId}` on detach.
pub const DETACHED_TOPIC: &str = "NodeWorker.detachedFromWorker";
/// Notification topic delivering `{sessionId, message}` for inbound traffic.
pub const MESSAGE_TOPIC: &str = "NodeWorker.receivedMessageFromWorker";

/// Outer envelope sent through the channel's forwarding command.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OuterEnvelope {
    pub session_id: String,
    /// JSON-encoded inner envelope.
    pub message: String,
}

/// Inner response, correlated back to a pending request by `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub id: u64,
    /// Success result (may still encode a domain-level error, see
    /// [`domain_error`]).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Explicit error result.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorPayload>,
}

/// Explicit error object in an inner response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub code: i64,
    pub message: String,
}

/// Inner event: carries no `id`, routed to the owning session's sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

/// Discriminated union of inbound inner messages.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Message {
    /// Response message (has `id` field).
    Response(Response),
    /// Event message (no `id` field).
    Event(Event),
    /// Unknown message type (forward-compatible catch-all).
    Unknown(Value),
}

/// Worker metadata held by a session, with the sessionId folded in.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerInfo {
    pub session_id: String,
    /// Opaque collaborator-supplied metadata.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Payload of [`ATTACHED_TOPIC`] notifications.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachedToWorker {
    pub session_id: String,
    #[serde(default)]
    pub worker_info: Map<String, Value>,
}

/// Payload of [`DETACHED_TOPIC`] notifications.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetachedFromWorker {
    pub session_id: String,
}

/// Payload of [`MESSAGE_TOPIC`] notifications.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageFromWorker {
    pub session_id: String,
    /// JSON-encoded inner envelope from the worker.
    pub message: String,
}

/// Classifies a result payload that encodes a failed remote evaluation.
///
/// An evaluate-style result reports failure as a normal-looking payload whose
/// `result.subtype` is `"error"`. The remote class name becomes the error
/// code and the remote description the message, so callers observe the same
/// error shape on the multiplexed and the single-session path.
pub fn domain_error(result: &Value) -> Option<Error> {
    let inner = result.get("result")?;
    if inner.get("subtype").and_then(Value::as_str) != Some("error") {
        return None;
    }
    let class_name = inner
        .get("className")
        .and_then(Value::as_str)
        .unwrap_or("Error")
        .to_string();
    let description = inner
        .get("description")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| result.to_string());
    Some(Error::Domain {
        class_name,
        description,
    })
}
