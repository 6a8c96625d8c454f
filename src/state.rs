use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::config::ServerConfig;
use crate::core::assistant::{AssistantsClient, ConversationBackend};
use crate::core::audio::Transcoder;
use crate::core::orchestrator::TurnOrchestrator;
use crate::core::realtime::{OpenAIRealtimeConnector, SpeechConnector};
use crate::core::session::SessionRegistry;
use crate::errors::AppResult;

/// Error returned when a new call cannot be admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionLimitError {
    GlobalLimitReached,
}

/// Holds one call slot until the last clone is dropped.
///
/// The connection limit middleware puts this into the request extensions and
/// the media stream handler keeps it alive for the duration of the call.
#[derive(Debug, Clone)]
pub struct CallSlot(Arc<SlotGuard>);

#[derive(Debug)]
struct SlotGuard {
    active: Arc<AtomicUsize>,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Application state shared by every handler.
pub struct AppState {
    pub config: ServerConfig,
    pub registry: Arc<SessionRegistry>,
    pub backend: Arc<dyn ConversationBackend>,
    pub speech: Arc<dyn SpeechConnector>,
    pub transcoder: Transcoder,
    /// Upgrades currently holding a call slot
    active_connections: Arc<AtomicUsize>,
}

impl AppState {
    /// Build the state with the OpenAI speech connector and Assistants client.
    pub async fn new(config: ServerConfig) -> AppResult<Arc<Self>> {
        let backend: Arc<dyn ConversationBackend> =
            Arc::new(AssistantsClient::new(config.backend_config())?);
        let speech: Arc<dyn SpeechConnector> =
            Arc::new(OpenAIRealtimeConnector::new(config.realtime_config()));

        Self::with_components(config, speech, backend)
    }

    /// Build the state around caller-provided speech and backend components.
    pub fn with_components(
        config: ServerConfig,
        speech: Arc<dyn SpeechConnector>,
        backend: Arc<dyn ConversationBackend>,
    ) -> AppResult<Arc<Self>> {
        let transcoder = config.transcoder()?;

        Ok(Arc::new(Self {
            config,
            registry: Arc::new(SessionRegistry::new()),
            backend,
            speech,
            transcoder,
            active_connections: Arc::new(AtomicUsize::new(0)),
        }))
    }

    /// Orchestrator bound to this state's registry and components.
    pub fn orchestrator(&self) -> TurnOrchestrator {
        TurnOrchestrator::new(
            self.registry.clone(),
            self.speech.clone(),
            self.backend.clone(),
            self.transcoder,
        )
    }

    /// Calls currently registered.
    pub fn active_calls(&self) -> usize {
        self.registry.len()
    }

    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::Acquire)
    }

    /// Reserve a call slot, honoring `max_concurrent_calls`.
    pub fn try_acquire_call(&self) -> Result<CallSlot, ConnectionLimitError> {
        let limit = self.config.max_concurrent_calls.unwrap_or(usize::MAX);

        self.active_connections
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current < limit).then_some(current + 1)
            })
            .map_err(|_| ConnectionLimitError::GlobalLimitReached)?;

        Ok(CallSlot(Arc::new(SlotGuard {
            active: self.active_connections.clone(),
        })))
    }
}
