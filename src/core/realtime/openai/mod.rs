//! OpenAI Realtime API speech channel.
//!
//! Audio in both directions is PCM 16-bit signed little-endian at 24kHz.
//! Turn detection runs server-side with automatic responses disabled, so the
//! model only speaks text sent through `response.create`.

mod client;
mod config;
pub mod messages;

pub use client::{OpenAIRealtime, OpenAIRealtimeConnector};
pub use config::{
    DEFAULT_REALTIME_MODEL, DEFAULT_TRANSCRIPTION_MODEL, OPENAI_REALTIME_SAMPLE_RATE,
    OPENAI_REALTIME_URL, OpenAIRealtimeVoice, PCM16_FORMAT,
};
