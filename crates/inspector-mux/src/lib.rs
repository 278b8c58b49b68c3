//! inspector-mux - Multiplexed worker debugging sessions over one channel
//!
//! The native debugging connection exposes a single request/response stream
//! and a single event stream. This crate multiplexes an arbitrary number of
//! logical per-worker sessions over that one channel:
//!
//! - **Correlation**: responses are matched to outstanding requests by a
//!   per-instance request id, never crossing sessions
//! - **Event routing**: unsolicited worker events reach the owning session's
//!   subscribers only
//! - **Lifecycle**: attach/detach notifications create and destroy sessions
//!   consistently with in-flight work
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐   ┌──────────────────┐
//! │ ThreadInspector  │   │ MasterInspector  │  default session,
//! │  (multiplexed)   │   │ (pass-through)   │  no id bookkeeping
//! │ ┌──────────────┐ │   └────────┬─────────┘
//! │ │ Dispatcher   │ │            │
//! │ └──────────────┘ │            │
//! │ ┌──────────────┐ │            │
//! │ │ Registry     │ │            │
//! │ │  └ Session*  │ │            │
//! │ └──────────────┘ │            │
//! └────────┬─────────┘            │
//!          ▼                      ▼
//!       ┌──────────────────────────┐
//!       │      ControlChannel      │  one connect/disconnect,
//!       └──────────────────────────┘  one post(), topic events
//! ```
//!
//! The physical channel is an external collaborator behind the
//! [`ControlChannel`] trait; its connect/disconnect mechanics and message
//! framing are out of scope here.

pub mod channel;
mod dispatcher;
pub mod error;
pub mod inspector;
pub mod master;
pub mod protocol;
pub mod registry;
pub mod session;

// Re-export key types at crate root
pub use channel::ControlChannel;
pub use error::{Error, Result};
pub use inspector::{InspectorOptions, LifecycleState, ThreadInspector};
pub use master::MasterInspector;
pub use protocol::{
    Event, Message, OuterEnvelope, Response, WorkerInfo, domain_error,
};
pub use registry::{InspectorEvent, SessionRegistry};
pub use session::{SessionEvent, VirtualSession};
