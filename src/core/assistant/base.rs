//! Conversation backend abstraction.
//!
//! A conversation backend answers caller utterances. Each call gets one
//! backend thread, and a turn is "submit utterance, await final answer".
//! A turn always yields speakable text: when the backend fails, the
//! configured fallback line is returned instead.

use async_trait::async_trait;
use thiserror::Error;

use super::messages::RunStatus;
use crate::core::session::{CallSession, SessionError};

/// Line spoken when the backend cannot produce an answer.
pub const DEFAULT_FALLBACK_TEXT: &str =
    "I'm having technical difficulties. Let me transfer you to an agent.";

// =============================================================================
// Error Types
// =============================================================================

/// Errors from the conversation backend.
#[derive(Debug, Error)]
pub enum AssistantError {
    /// Request never got an HTTP response
    #[error("Transport error: {0}")]
    Transport(String),

    /// Non-success HTTP status
    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    /// Response body did not match the expected shape
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// Run reached a terminal state other than completed
    #[error("Run ended with status {status}")]
    RunFailed {
        status: RunStatus,
        last_error: Option<String>,
    },

    /// Run still pending after the maximum number of polls
    #[error("Run still pending after {0} polls")]
    PollsExhausted(u32),

    /// Completed run without assistant text
    #[error("Run completed without an assistant answer")]
    EmptyAnswer,

    /// Turn exceeded its overall deadline
    #[error("Turn timed out after {0}ms")]
    Timeout(u64),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error(transparent)]
    Session(#[from] SessionError),
}

impl AssistantError {
    /// Transport failures, rate limiting and server errors.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for AssistantError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}

/// Result type for backend operations.
pub type AssistantResult<T> = Result<T, AssistantError>;

// =============================================================================
// Turn Result
// =============================================================================

/// Outcome of one conversational turn. `response_text` is never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendTurnResult {
    pub response_text: String,
    pub succeeded: bool,
    pub used_fallback: bool,
}

impl BackendTurnResult {
    /// Answer produced by the backend.
    ///
    /// Blank answers are not valid here; callers treat them as failures.
    pub fn success(response_text: impl Into<String>) -> Self {
        Self {
            response_text: response_text.into(),
            succeeded: true,
            used_fallback: false,
        }
    }

    /// Fallback line, substituted when the backend failed.
    pub fn fallback(fallback_text: &str) -> Self {
        let text = if fallback_text.trim().is_empty() {
            DEFAULT_FALLBACK_TEXT
        } else {
            fallback_text
        };
        Self {
            response_text: text.to_string(),
            succeeded: false,
            used_fallback: true,
        }
    }
}

// =============================================================================
// Trait
// =============================================================================

/// Conversational backend holding one thread per call.
#[async_trait]
pub trait ConversationBackend: Send + Sync {
    /// Thread id for the session, creating the thread on first use.
    ///
    /// Concurrent callers for the same call share a single create request.
    /// The id is recorded on the session.
    async fn ensure_thread(&self, session: &CallSession) -> AssistantResult<String>;

    /// Submit one utterance and wait for the answer.
    ///
    /// Never fails and never hangs: timeouts, exhausted polls and failed
    /// runs all yield the fallback.
    async fn submit_turn(&self, thread_id: &str, utterance: &str) -> BackendTurnResult;

    /// Forget the call's thread. The remote thread is left in place.
    fn release(&self, call_id: &str);

    /// Line spoken when a turn cannot be answered.
    fn fallback_text(&self) -> &str;
}
