//! Live call sessions and the process-wide session registry.
//!
//! A [`CallSession`] binds a telephony call to its media stream and to the backend
//! conversation thread. Sessions are owned by the [`SessionRegistry`]; call handlers
//! only borrow an `Arc` for the lifetime of the call.

mod call;
mod registry;

use thiserror::Error;

pub use call::{CallSession, CallState};
pub use registry::SessionRegistry;

/// Session errors.
///
/// Everything except [`SessionError::NotFound`] is a contract violation: call identifiers
/// are unique and the orchestrator drives state transitions in a fixed order.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// A session with this call id already exists
    #[error("Duplicate session for call {0}")]
    DuplicateSession(String),

    /// No session is registered under this call id
    #[error("Session not found for call {0}")]
    NotFound(String),

    /// The requested state change is not part of the lifecycle
    #[error("Invalid state transition for call {call_id}: {from} -> {to}")]
    InvalidTransition {
        call_id: String,
        from: CallState,
        to: CallState,
    },

    /// The session is already closed
    #[error("Session for call {0} is closed")]
    Closed(String),
}

impl SessionError {
    /// Whether the error indicates a caller bug rather than a runtime condition.
    pub fn is_contract_violation(&self) -> bool {
        !matches!(self, SessionError::NotFound(_))
    }
}

pub type SessionResult<T> = Result<T, SessionError>;
