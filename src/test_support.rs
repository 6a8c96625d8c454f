//! Shared fixtures for unit tests.

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::ServerConfig;
use crate::core::assistant::{AssistantResult, BackendTurnResult, ConversationBackend};
use crate::core::realtime::{RealtimeError, RealtimeResult, SpeechChannel, SpeechConnector};
use crate::core::session::CallSession;

pub(crate) fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        tls: None,
        max_concurrent_calls: None,
        cors_allowed_origins: None,
        openai_api_key: Some("sk-test".to_string()),
        realtime_url: "ws://127.0.0.1:1/v1/realtime".to_string(),
        realtime_model: "gpt-4o-realtime-preview".to_string(),
        voice: "alloy".to_string(),
        speech_instructions: "Repeat what you are given.".to_string(),
        transcription_model: "whisper-1".to_string(),
        vad_threshold: 0.5,
        vad_prefix_padding_ms: 300,
        vad_silence_duration_ms: 500,
        speech_handshake_timeout_ms: 1_000,
        api_base_url: "http://127.0.0.1:1/v1".to_string(),
        assistant_id: Some("asst_test".to_string()),
        backend_poll_interval_ms: 10,
        backend_max_poll_attempts: 5,
        backend_turn_timeout_ms: 1_000,
        backend_max_retries: 0,
        backend_retry_base_delay_ms: 10,
        backend_fallback_text: "Please hold.".to_string(),
        wideband_sample_rate: 24_000,
    }
}

/// Connector whose handshake always fails.
pub(crate) struct NoopConnector;

#[async_trait]
impl SpeechConnector for NoopConnector {
    async fn open(&self, _call_id: &str) -> RealtimeResult<Arc<dyn SpeechChannel>> {
        Err(RealtimeError::ConnectionFailed("no speech backend".to_string()))
    }
}

/// Backend that answers every turn with its fallback line.
pub(crate) struct NoopBackend;

#[async_trait]
impl ConversationBackend for NoopBackend {
    async fn ensure_thread(&self, session: &CallSession) -> AssistantResult<String> {
        Ok(format!("thread_{}", session.call_id()))
    }

    async fn submit_turn(&self, _thread_id: &str, _utterance: &str) -> BackendTurnResult {
        BackendTurnResult::fallback(self.fallback_text())
    }

    fn release(&self, _call_id: &str) {}

    fn fallback_text(&self) -> &str {
        "Please hold."
    }
}
