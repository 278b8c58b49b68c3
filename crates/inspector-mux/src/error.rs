//! Error types for the inspector multiplexing runtime.

use thiserror::Error;

/// Result type alias for inspector operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the multiplexed and single-session inspector paths.
#[derive(Debug, Error)]
pub enum Error {
    /// Channel-level failure: the forwarding, enable, or disable command
    /// itself failed. The inner command never reached the worker.
    #[error("Transport error: {0}")]
    Transport(String),

    /// A result payload that encodes a failed remote evaluation
    /// (`result.subtype == "error"`). Carries the remote class name as the
    /// classification code.
    #[error("{description}")]
    Domain {
        /// Remote class name of the thrown value (e.g. "TypeError").
        class_name: String,
        /// Remote description, or the raw payload when none was given.
        description: String,
    },

    /// Explicit `error` object in an inner response.
    #[error("{message}")]
    Remote { code: i64, message: String },

    /// Outgoing message is missing its `method` string.
    #[error("Message must have string 'method' property")]
    InvalidMessage,

    /// The addressed sessionId is not present in the registry, or its
    /// session was detached while a request was still in flight.
    #[error("sessionId invalid")]
    SessionInvalid,

    /// Lifecycle call made in the wrong state, e.g. `start` on an inspector
    /// that is already enabled.
    #[error("Invalid lifecycle state: {0}")]
    InvalidState(&'static str),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A pending request was dropped without ever being settled.
    #[error("Channel closed unexpectedly")]
    ChannelClosed,
}

impl Error {
    /// Returns the remote error code if this is a [`Error::Remote`].
    pub fn remote_code(&self) -> Option<i64> {
        match self {
            Error::Remote { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Returns the domain classification if this is a [`Error::Domain`].
    pub fn class_name(&self) -> Option<&str> {
        match self {
            Error::Domain { class_name, .. } => Some(class_name),
            _ => None,
        }
    }

    /// Returns true if the addressed session was unknown or already detached.
    pub fn is_session_invalid(&self) -> bool {
        matches!(self, Error::SessionInvalid)
    }
}
