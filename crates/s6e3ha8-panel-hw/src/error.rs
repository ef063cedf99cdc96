//! Error types for the S6E3HA8 panel library.

use crate::state::{LifecycleState, Operation};
use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Error reported by a collaborator subsystem (regulator, DSI host, GPIO provider).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while binding or sequencing the panel.
#[derive(Error, Debug)]
pub enum Error {
    /// A supply rail failed to energize.
    #[error("failed to enable {supply} supply")]
    Power {
        supply: String,
        #[source]
        source: BoxError,
    },

    /// The DSI host rejected or failed to deliver a DCS command.
    #[error("failed to {action}")]
    Command {
        action: &'static str,
        #[source]
        source: BoxError,
    },

    /// A resource is not ready yet. Binding should be retried later.
    #[error("{resource} not ready, retry later")]
    ResourceUnavailable { resource: String },

    /// A resource could not be acquired and retrying will not help.
    #[error("failed to acquire {resource}")]
    Acquire {
        resource: String,
        #[source]
        source: BoxError,
    },

    /// The DSI host refused to attach the panel.
    #[error("failed to attach DSI device")]
    Attach(#[source] BoxError),

    /// A lifecycle operation was called from a state that does not allow it.
    #[error("cannot {operation} panel while {state}")]
    InvalidState {
        operation: Operation,
        state: LifecycleState,
    },

    /// Storage for the returned display mode could not be allocated.
    #[error("out of memory while adding display mode")]
    NoMemory,

    /// No driver configuration matches the device's compatible string.
    #[error("no driver matches compatible {0:?}")]
    NoMatch(String),

    /// A panel with this device name is already registered.
    #[error("panel {0} is already registered")]
    AlreadyRegistered(String),

    /// Configuration value outside the supported range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// DCS command name not known to the panel.
    #[error("unknown DCS command {0:?}")]
    UnknownCommand(String),

    /// Unparseable bench fault description.
    #[error("invalid fault: {0}")]
    InvalidFault(String),
}

impl Error {
    /// Returns true if the failure is transient and binding should be deferred.
    pub fn is_retry_later(&self) -> bool {
        matches!(self, Error::ResourceUnavailable { .. })
    }
}
