//! Base traits and types for the speech channel.
//!
//! A speech channel is one duplex connection to a realtime speech backend,
//! scoped to a single call. Caller audio goes in as wideband PCM16, and the
//! backend produces synthesized audio plus finalized transcriptions of the
//! caller's utterances. Utterance boundaries are decided by the backend's
//! server-side VAD.
//!
//! Channels are opened through a [`SpeechConnector`], which lets the turn
//! orchestrator run against any implementation.

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use super::openai::{
    DEFAULT_REALTIME_MODEL, DEFAULT_TRANSCRIPTION_MODEL, OPENAI_REALTIME_URL, OpenAIRealtimeVoice,
};

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during realtime operations.
#[derive(Debug, Error)]
pub enum RealtimeError {
    /// Connection or handshake with the provider failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Not connected
    #[error("Not connected")]
    NotConnected,

    /// The event stream was already handed out
    #[error("Event stream already taken")]
    EventStreamTaken,
}

/// Result type for realtime operations.
pub type RealtimeResult<T> = Result<T, RealtimeError>;

// =============================================================================
// Events
// =============================================================================

/// Inbound event from the speech backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechEvent {
    /// Chunk of synthesized audio, PCM16 at the wideband rate
    AudioDelta { bytes: Bytes },
    /// Finalized transcription of one caller utterance
    TranscriptionComplete { text: String },
    /// Error reported by the backend
    Error { code: String, message: String },
}

/// Lazy stream of speech events. Ends when the channel closes.
pub type SpeechEventStream = Pin<Box<dyn Stream<Item = SpeechEvent> + Send>>;

// =============================================================================
// Configuration Types
// =============================================================================

/// Instructions used when none are configured.
pub const DEFAULT_SPEECH_INSTRUCTIONS: &str = "You are the voice of a customer service line. \
Only speak the responses you are asked to say, word for word. \
Never answer the caller on your own.";

/// Default handshake timeout in milliseconds.
pub const DEFAULT_HANDSHAKE_TIMEOUT_MS: u64 = 10_000;

/// Server-side voice activity detection settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VadConfig {
    /// Activation threshold (0.0 to 1.0)
    pub threshold: f32,
    /// Audio kept before detected speech (ms)
    pub prefix_padding_ms: u32,
    /// Trailing silence that completes an utterance (ms)
    pub silence_duration_ms: u32,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            prefix_padding_ms: 300,
            silence_duration_ms: 500,
        }
    }
}

/// Configuration for opening speech channels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// API key for authentication
    pub api_key: String,

    /// WebSocket endpoint, without query string
    #[serde(default = "default_url")]
    pub url: String,

    /// Model to use (e.g., "gpt-4o-realtime-preview")
    #[serde(default = "default_model")]
    pub model: String,

    /// Voice for synthesized output
    #[serde(default)]
    pub voice: OpenAIRealtimeVoice,

    /// System instructions for the voice interface
    #[serde(default = "default_instructions")]
    pub instructions: String,

    /// Model used to transcribe caller audio
    #[serde(default = "default_transcription_model")]
    pub transcription_model: String,

    #[serde(default)]
    pub vad: VadConfig,

    /// Upper bound for connect plus `session.created`
    #[serde(default = "default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,
}

fn default_url() -> String {
    OPENAI_REALTIME_URL.to_string()
}

fn default_model() -> String {
    DEFAULT_REALTIME_MODEL.to_string()
}

fn default_instructions() -> String {
    DEFAULT_SPEECH_INSTRUCTIONS.to_string()
}

fn default_transcription_model() -> String {
    DEFAULT_TRANSCRIPTION_MODEL.to_string()
}

fn default_handshake_timeout_ms() -> u64 {
    DEFAULT_HANDSHAKE_TIMEOUT_MS
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            url: default_url(),
            model: default_model(),
            voice: OpenAIRealtimeVoice::default(),
            instructions: default_instructions(),
            transcription_model: default_transcription_model(),
            vad: VadConfig::default(),
            handshake_timeout_ms: DEFAULT_HANDSHAKE_TIMEOUT_MS,
        }
    }
}

impl RealtimeConfig {
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }
}

// =============================================================================
// Traits
// =============================================================================

/// One open duplex connection to the speech backend.
///
/// Implementations must be usable from the ingress and egress loops of a
/// call at the same time, so every method takes `&self`.
#[async_trait]
pub trait SpeechChannel: Send + Sync {
    /// Queue one chunk of wideband PCM16 caller audio.
    ///
    /// Returns once the chunk is handed to the connection task.
    async fn send_audio(&self, audio: Bytes) -> RealtimeResult<()>;

    /// Take the inbound event stream.
    ///
    /// The stream can be taken once. A second call returns
    /// [`RealtimeError::EventStreamTaken`].
    fn events(&self) -> RealtimeResult<SpeechEventStream>;

    /// Ask the backend to synthesize `text` verbatim.
    async fn speak(&self, text: &str) -> RealtimeResult<()>;

    /// Close the connection. Safe to call more than once.
    async fn close(&self) -> RealtimeResult<()>;

    /// Whether the connection is still open.
    fn is_ready(&self) -> bool;
}

/// Opens speech channels, one per call.
#[async_trait]
pub trait SpeechConnector: Send + Sync {
    /// Connect and complete the session handshake.
    ///
    /// Fails with [`RealtimeError::ConnectionFailed`] if the handshake does
    /// not finish within the configured timeout.
    async fn open(&self, call_id: &str) -> RealtimeResult<Arc<dyn SpeechChannel>>;
}
