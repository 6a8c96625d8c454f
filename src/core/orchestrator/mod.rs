//! Turn orchestrator: the per-call state machine.

mod outcome;
mod turn;

use thiserror::Error;

use crate::core::realtime::RealtimeError;
use crate::core::session::SessionError;

pub use outcome::{CallOutcome, EndReason};
pub use turn::TurnOrchestrator;

/// Errors that end a call before it becomes active.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Speech channel could not be opened
    #[error("Speech channel handshake failed: {0}")]
    Handshake(RealtimeError),

    #[error("Speech channel error: {0}")]
    Speech(RealtimeError),
}

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;
