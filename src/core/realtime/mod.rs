//! Speech channel: per-call duplex connection to a realtime speech backend.

mod base;
pub mod openai;

pub use base::{
    DEFAULT_HANDSHAKE_TIMEOUT_MS, DEFAULT_SPEECH_INSTRUCTIONS, RealtimeConfig, RealtimeError,
    RealtimeResult, SpeechChannel, SpeechConnector, SpeechEvent, SpeechEventStream, VadConfig,
};
pub use openai::{OpenAIRealtime, OpenAIRealtimeConnector, OpenAIRealtimeVoice};
