//! Lifecycle control and the multiplexed public surface.
//!
//! [`ThreadInspector`] owns the control channel, the session registry, and
//! the request dispatcher, and drives the enable/disable state machine that
//! gates whether multiplexing is active. Notification topics are pumped into
//! the registry and dispatcher by a single background task, so all registry
//! and pending-table mutations happen on sequential deliveries.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::channel::ControlChannel;
use crate::dispatcher::RequestDispatcher;
use crate::error::{Error, Result};
use crate::protocol::{self, AttachedToWorker, DetachedFromWorker, MessageFromWorker};
use crate::registry::{InspectorEvent, SessionRegistry};
use crate::session::VirtualSession;

/// Lifecycle of the multiplexing layer.
///
/// `Stopped → Starting → Enabled → Stopping → Stopped`. Callers must
/// serialize lifecycle calls; overlapping `start`/`stop` is unsupported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Stopped,
    Starting,
    Enabled,
    Stopping,
}

/// Options applied when multiplexing is enabled.
#[derive(Debug, Clone, Default)]
pub struct InspectorOptions {
    /// Ask newly spawned workers to pause until a debugger resumes them.
    pub wait_for_debugger_on_start: bool,
}

/// Multiplexes per-worker debugging sessions over one control channel.
pub struct ThreadInspector {
    channel: Arc<dyn ControlChannel>,
    registry: Arc<SessionRegistry>,
    dispatcher: Arc<RequestDispatcher>,
    options: InspectorOptions,
    state: Mutex<LifecycleState>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl ThreadInspector {
    pub fn new(channel: Arc<dyn ControlChannel>) -> Self {
        Self::with_options(channel, InspectorOptions::default())
    }

    pub fn with_options(channel: Arc<dyn ControlChannel>, options: InspectorOptions) -> Self {
        let registry = Arc::new(SessionRegistry::new());
        let dispatcher = Arc::new(RequestDispatcher::new(
            Arc::clone(&channel),
            Arc::clone(&registry),
        ));
        Self {
            channel,
            registry,
            dispatcher,
            options,
            state: Mutex::new(LifecycleState::Stopped),
            pump: Mutex::new(None),
        }
    }

    /// Connects the channel and enables worker multiplexing.
    ///
    /// Only valid on a stopped inspector: the channel must never be
    /// connected twice without an intervening disconnect, so a second
    /// `start` before `stop` fails with [`Error::InvalidState`].
    ///
    /// Notification topics are subscribed before the enable command is
    /// issued, so no attach or message notification is missed once enable
    /// lands. A failed start leaves the instance fully disconnected and
    /// unsubscribed; a subsequent `start` can then succeed cleanly.
    pub async fn start(&self) -> Result<()> {
        {
            let mut state = self.state.lock();
            if *state != LifecycleState::Stopped {
                return Err(Error::InvalidState("start requires a stopped inspector"));
            }
            *state = LifecycleState::Starting;
        }

        let attached = self.channel.subscribe(protocol::ATTACHED_TOPIC);
        let detached = self.channel.subscribe(protocol::DETACHED_TOPIC);
        let messages = self.channel.subscribe(protocol::MESSAGE_TOPIC);
        self.spawn_pump(attached, detached, messages);

        let enabled: Result<()> = async {
            self.channel.connect()?;
            self.channel
                .post(
                    protocol::ENABLE_METHOD,
                    json!({"waitForDebuggerOnStart": self.options.wait_for_debugger_on_start}),
                )
                .await?;
            Ok(())
        }
        .await;

        match enabled {
            Ok(()) => {
                *self.state.lock() = LifecycleState::Enabled;
                Ok(())
            }
            Err(err) => {
                tracing::warn!(%err, "enable failed; tearing down channel");
                self.teardown();
                *self.state.lock() = LifecycleState::Stopped;
                Err(err)
            }
        }
    }

    /// Disables worker multiplexing.
    ///
    /// Cleanup (unsubscribe, pump shutdown, disconnect) runs on every exit
    /// path; a disable failure is re-raised only after cleanup has run.
    pub async fn stop(&self) -> Result<()> {
        *self.state.lock() = LifecycleState::Stopping;

        let disabled = self
            .channel
            .post(protocol::DISABLE_METHOD, Value::Null)
            .await;

        self.teardown();
        *self.state.lock() = LifecycleState::Stopped;

        disabled.map(|_| ())
    }

    /// Sends an inner envelope (`{method, params?}`) to a worker session and
    /// awaits the inner `result`.
    pub async fn post(&self, session_id: &str, message: Value) -> Result<Value> {
        self.dispatcher.post(session_id, message).await
    }

    /// Convenience wrapper around [`post`](Self::post) for a typed
    /// method/params pair.
    pub async fn post_method(
        &self,
        session_id: &str,
        method: &str,
        params: Option<Value>,
    ) -> Result<Value> {
        let mut message = serde_json::Map::new();
        message.insert("method".to_string(), Value::String(method.to_string()));
        if let Some(params) = params {
            message.insert("params".to_string(), params);
        }
        self.post(session_id, Value::Object(message)).await
    }

    /// Snapshot of the currently attached sessions.
    pub fn sessions(&self) -> Vec<Arc<VirtualSession>> {
        self.registry.sessions()
    }

    /// Stream of attach/detach notifications.
    pub fn events(&self) -> broadcast::Receiver<InspectorEvent> {
        self.registry.subscribe()
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.lock()
    }

    fn spawn_pump(
        &self,
        mut attached: mpsc::UnboundedReceiver<Value>,
        mut detached: mpsc::UnboundedReceiver<Value>,
        mut messages: mpsc::UnboundedReceiver<Value>,
    ) {
        let registry = Arc::clone(&self.registry);
        let dispatcher = Arc::clone(&self.dispatcher);

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    // Attach before message delivery when both are queued, so
                    // a worker's first messages find its session registered.
                    biased;
                    notification = attached.recv() => match notification {
                        Some(params) => match serde_json::from_value::<AttachedToWorker>(params) {
                            Ok(attach) => {
                                registry.attach(attach);
                            }
                            Err(err) => tracing::error!(%err, "malformed attach notification"),
                        },
                        None => break,
                    },
                    notification = detached.recv() => match notification {
                        Some(params) => match serde_json::from_value::<DetachedFromWorker>(params) {
                            Ok(detach) => registry.detach(&detach.session_id),
                            Err(err) => tracing::error!(%err, "malformed detach notification"),
                        },
                        None => break,
                    },
                    notification = messages.recv() => match notification {
                        Some(params) => match serde_json::from_value::<MessageFromWorker>(params) {
                            Ok(delivery) => dispatcher.dispatch(&delivery.session_id, &delivery.message),
                            Err(err) => tracing::error!(%err, "malformed worker message notification"),
                        },
                        None => break,
                    },
                }
            }
        });

        if let Some(stale) = self.pump.lock().replace(handle) {
            stale.abort();
        }
    }

    fn teardown(&self) {
        self.channel.unsubscribe(protocol::ATTACHED_TOPIC);
        self.channel.unsubscribe(protocol::DETACHED_TOPIC);
        self.channel.unsubscribe(protocol::MESSAGE_TOPIC);
        if let Some(pump) = self.pump.lock().take() {
            pump.abort();
        }
        self.channel.disconnect();
    }
}

impl Drop for ThreadInspector {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.lock().take() {
            pump.abort();
        }
    }
}
