//! Single-session adapter over the control channel.

use std::sync::Arc;

use serde_json::Value;

use crate::channel::ControlChannel;
use crate::error::Result;
use crate::protocol;

/// Direct, non-multiplexed access to the default session.
///
/// No identifier bookkeeping is needed here: the channel's request/response
/// primitive already guarantees one response per call. Result payloads go
/// through the same domain-error translation as the multiplexed path, so
/// callers observe one consistent error shape on both.
pub struct MasterInspector {
    channel: Arc<dyn ControlChannel>,
}

impl MasterInspector {
    pub fn new(channel: Arc<dyn ControlChannel>) -> Self {
        Self { channel }
    }

    /// Connects the underlying channel.
    pub fn start(&self) -> Result<()> {
        self.channel.connect()
    }

    /// Disconnects the underlying channel.
    pub fn stop(&self) {
        self.channel.disconnect();
    }

    /// Issues a command on the default session and awaits its result.
    pub async fn post(&self, method: &str, params: Option<Value>) -> Result<Value> {
        let result = self
            .channel
            .post(method, params.unwrap_or(Value::Null))
            .await?;
        if let Some(err) = protocol::domain_error(&result) {
            return Err(err);
        }
        Ok(result)
    }
}
