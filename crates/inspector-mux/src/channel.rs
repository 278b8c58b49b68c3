//! Contract required from the physical control channel.

use futures_util::future::BoxFuture;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::Result;

/// Handle to the native debugging connection.
///
/// The channel offers exactly one request/response stream (with its own
/// internal correlation) and one notification stream keyed by method name;
/// everything above it is multiplexed by this crate. One connect/disconnect
/// pair guards the connection's lifetime: implementations must never be
/// connected twice without an intervening disconnect, and the
/// [`ThreadInspector`](crate::ThreadInspector) owning the channel rejects a
/// second `start` until `stop` has run.
pub trait ControlChannel: Send + Sync {
    /// Opens the underlying connection.
    fn connect(&self) -> Result<()>;

    /// Closes the underlying connection. Idempotent.
    fn disconnect(&self);

    /// Issues a command and awaits its response.
    ///
    /// This is the channel's single in-flight request/response primitive; a
    /// failure here means the command never reached the target.
    fn post(&self, method: &str, params: Value) -> BoxFuture<'_, Result<Value>>;

    /// Subscribes to a notification topic.
    ///
    /// Params of matching notifications are delivered on the returned
    /// receiver, in arrival order, until [`unsubscribe`](Self::unsubscribe)
    /// is called for the same topic.
    fn subscribe(&self, method: &str) -> mpsc::UnboundedReceiver<Value>;

    /// Drops the subscription for a topic.
    fn unsubscribe(&self, method: &str);
}
