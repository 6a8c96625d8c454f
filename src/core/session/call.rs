use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, SystemTime};

use parking_lot::RwLock;

use super::{SessionError, SessionResult};

/// Lifecycle state of a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CallState {
    /// Telephony stream started, speech channel handshake in progress
    #[default]
    Connecting,
    /// Audio is flowing in both directions
    Active,
    /// Loops are being cancelled and resources released
    Closing,
    /// Terminal
    Closed,
}

impl CallState {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Active => "active",
            Self::Closing => "closing",
            Self::Closed => "closed",
        }
    }

    fn can_transition_to(self, next: CallState) -> bool {
        matches!(
            (self, next),
            (Self::Connecting, Self::Active)
                | (Self::Connecting, Self::Closing)
                | (Self::Connecting, Self::Closed)
                | (Self::Active, Self::Closing)
                | (Self::Closing, Self::Closed)
        )
    }
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Bridge state for one phone call.
#[derive(Debug)]
pub struct CallSession {
    call_id: String,
    media_stream_id: String,
    conversation_thread_id: RwLock<Option<String>>,
    state: RwLock<CallState>,
    created_at: SystemTime,
    turn_count: AtomicU32,
    fallback_count: AtomicU32,
}

impl CallSession {
    pub fn new(call_id: impl Into<String>, media_stream_id: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            media_stream_id: media_stream_id.into(),
            conversation_thread_id: RwLock::new(None),
            state: RwLock::new(CallState::Connecting),
            created_at: SystemTime::now(),
            turn_count: AtomicU32::new(0),
            fallback_count: AtomicU32::new(0),
        }
    }

    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    pub fn media_stream_id(&self) -> &str {
        &self.media_stream_id
    }

    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    /// Time since the session was created.
    pub fn age(&self) -> Duration {
        self.created_at.elapsed().unwrap_or_default()
    }

    pub fn state(&self) -> CallState {
        *self.state.read()
    }

    pub fn is_closed(&self) -> bool {
        self.state() == CallState::Closed
    }

    /// Move the session to `next`, enforcing the lifecycle order.
    pub fn transition(&self, next: CallState) -> SessionResult<()> {
        let mut state = self.state.write();
        if *state == CallState::Closed {
            return Err(SessionError::Closed(self.call_id.clone()));
        }
        if !state.can_transition_to(next) {
            return Err(SessionError::InvalidTransition {
                call_id: self.call_id.clone(),
                from: *state,
                to: next,
            });
        }
        *state = next;
        Ok(())
    }

    pub fn conversation_thread_id(&self) -> Option<String> {
        self.conversation_thread_id.read().clone()
    }

    /// Record the backend thread bound to this call.
    ///
    /// Setting the same id again is a no-op; a different id would break the
    /// one-thread-per-call invariant and is kept out.
    pub fn set_conversation_thread_id(&self, thread_id: &str) -> SessionResult<()> {
        if self.is_closed() {
            return Err(SessionError::Closed(self.call_id.clone()));
        }

        let mut current = self.conversation_thread_id.write();
        match current.as_deref() {
            Some(existing) if existing != thread_id => {
                tracing::warn!(
                    call_id = %self.call_id,
                    existing = %existing,
                    rejected = %thread_id,
                    "Conversation thread already bound to call"
                );
            }
            Some(_) => {}
            None => *current = Some(thread_id.to_string()),
        }
        Ok(())
    }

    pub fn record_turn(&self, used_fallback: bool) {
        self.turn_count.fetch_add(1, Ordering::Relaxed);
        if used_fallback {
            self.fallback_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn turn_count(&self) -> u32 {
        self.turn_count.load(Ordering::Relaxed)
    }

    pub fn fallback_count(&self) -> u32 {
        self.fallback_count.load(Ordering::Relaxed)
    }
}
