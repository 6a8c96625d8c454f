//! OpenAI Realtime API WebSocket message types.
//!
//! Only the subset of the protocol the bridge relies on is modelled here.
//!
//! Client events (sent to server):
//! - session.update - Configure formats, voice and turn detection
//! - input_audio_buffer.append - Append caller audio
//! - response.create - Speak a given text
//!
//! Server events (received from server):
//! - session.created / session.updated
//! - input_audio_buffer.speech_started / speech_stopped
//! - conversation.item.input_audio_transcription.completed / failed
//! - response.audio.delta / response.audio.done
//! - response.done
//! - error
//!
//! Any other server event deserializes to [`ServerEvent::Unknown`].

use base64::prelude::*;
use serde::{Deserialize, Serialize};

// =============================================================================
// Session Configuration
// =============================================================================

/// Session configuration for OpenAI Realtime API.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Response modalities (text, audio)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modalities: Option<Vec<String>>,

    /// System instructions for the voice interface
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,

    /// Voice for audio output
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_audio_format: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_audio_format: Option<String>,

    /// Input audio transcription configuration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_audio_transcription: Option<InputAudioTranscription>,

    /// Turn detection configuration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turn_detection: Option<TurnDetection>,

    /// Tool definitions; always empty for the bridge
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<serde_json::Value>>,
}

/// Input audio transcription configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InputAudioTranscription {
    /// Transcription model (e.g., "whisper-1")
    pub model: String,
}

/// Turn detection configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum TurnDetection {
    /// Server-side VAD
    #[serde(rename = "server_vad")]
    ServerVad {
        /// Activation threshold
        #[serde(skip_serializing_if = "Option::is_none")]
        threshold: Option<f32>,
        /// Audio prefix padding in ms
        #[serde(skip_serializing_if = "Option::is_none")]
        prefix_padding_ms: Option<u32>,
        /// Trailing silence that ends an utterance, in ms
        #[serde(skip_serializing_if = "Option::is_none")]
        silence_duration_ms: Option<u32>,
        /// Let the model answer on its own when a turn ends
        #[serde(skip_serializing_if = "Option::is_none")]
        create_response: Option<bool>,
        /// Interrupt model output on speech
        #[serde(skip_serializing_if = "Option::is_none")]
        interrupt_response: Option<bool>,
    },
}

/// Response configuration for `response.create`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modalities: Option<Vec<String>>,
    /// Per-response instructions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
}

// =============================================================================
// Client Events (sent to server)
// =============================================================================

/// Client events sent to the OpenAI Realtime API.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    /// Update session configuration
    #[serde(rename = "session.update")]
    SessionUpdate {
        /// Session configuration
        session: SessionConfig,
    },

    /// Append audio to input buffer
    #[serde(rename = "input_audio_buffer.append")]
    InputAudioBufferAppend {
        /// Base64-encoded audio data
        audio: String,
    },

    /// Create a response
    #[serde(rename = "response.create")]
    ResponseCreate {
        #[serde(skip_serializing_if = "Option::is_none")]
        response: Option<ResponseConfig>,
    },
}

impl ClientEvent {
    /// Create an audio append event from raw PCM16 bytes.
    pub fn audio_append(data: &[u8]) -> Self {
        ClientEvent::InputAudioBufferAppend {
            audio: BASE64_STANDARD.encode(data),
        }
    }

    /// Create a `response.create` that makes the model say `text` verbatim.
    pub fn speak(text: &str, voice: &str) -> Self {
        ClientEvent::ResponseCreate {
            response: Some(ResponseConfig {
                modalities: Some(vec!["text".to_string(), "audio".to_string()]),
                instructions: Some(format!(
                    "Say exactly the following to the caller, without adding anything: {text}"
                )),
                voice: Some(voice.to_string()),
            }),
        }
    }

    /// Event type string, for logging.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::SessionUpdate { .. } => "session.update",
            Self::InputAudioBufferAppend { .. } => "input_audio_buffer.append",
            Self::ResponseCreate { .. } => "response.create",
        }
    }
}

// =============================================================================
// Server Events (received from server)
// =============================================================================

/// Server events received from the OpenAI Realtime API.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// Error occurred
    #[serde(rename = "error")]
    Error {
        /// Error details
        error: ApiError,
    },

    /// Session created
    #[serde(rename = "session.created")]
    SessionCreated {
        /// Session information
        session: Session,
    },

    /// Session updated
    #[serde(rename = "session.updated")]
    SessionUpdated {
        /// Session information
        session: Session,
    },

    /// Speech started (VAD detected speech)
    #[serde(rename = "input_audio_buffer.speech_started")]
    SpeechStarted {
        #[serde(default)]
        audio_start_ms: u64,
        #[serde(default)]
        item_id: String,
    },

    /// Speech stopped (VAD detected silence)
    #[serde(rename = "input_audio_buffer.speech_stopped")]
    SpeechStopped {
        #[serde(default)]
        audio_end_ms: u64,
        #[serde(default)]
        item_id: String,
    },

    /// Input audio transcription completed
    #[serde(rename = "conversation.item.input_audio_transcription.completed")]
    TranscriptionCompleted {
        #[serde(default)]
        item_id: String,
        #[serde(default)]
        content_index: u32,
        /// Transcript text
        #[serde(default)]
        transcript: String,
    },

    /// Input audio transcription failed
    #[serde(rename = "conversation.item.input_audio_transcription.failed")]
    TranscriptionFailed {
        #[serde(default)]
        item_id: String,
        /// Error details
        error: ApiError,
    },

    /// Audio delta (audio data chunk)
    #[serde(rename = "response.audio.delta")]
    AudioDelta {
        #[serde(default)]
        response_id: String,
        #[serde(default)]
        item_id: String,
        /// Base64-encoded PCM16 audio
        delta: String,
    },

    /// Audio done
    #[serde(rename = "response.audio.done")]
    AudioDone {
        #[serde(default)]
        response_id: String,
        #[serde(default)]
        item_id: String,
    },

    /// Response done
    #[serde(rename = "response.done")]
    ResponseDone {
        /// Response information
        response: Response,
    },

    /// Any event type the bridge does not consume
    #[serde(other)]
    Unknown,
}

impl ServerEvent {
    /// Decode base64 audio from an AudioDelta event.
    pub fn decode_audio_delta(delta: &str) -> Result<Vec<u8>, base64::DecodeError> {
        BASE64_STANDARD.decode(delta)
    }
}

// =============================================================================
// Supporting Types
// =============================================================================

/// API error information.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiError {
    /// Error type
    #[serde(rename = "type", default)]
    pub error_type: String,
    /// Error code
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub code: Option<String>,
    /// Error message
    #[serde(default)]
    pub message: String,
}

/// Session information.
#[derive(Debug, Clone, Deserialize)]
pub struct Session {
    /// Session ID
    pub id: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub voice: Option<String>,
}

/// Response information.
#[derive(Debug, Clone, Deserialize)]
pub struct Response {
    /// Response ID
    pub id: String,
    /// in_progress, completed, cancelled, failed, incomplete
    #[serde(default)]
    pub status: Option<String>,
}
