//! Conversation backend: one thread per call, one answer per utterance.

mod base;
mod client;
mod config;
pub mod messages;
mod retry;

pub use base::{
    AssistantError, AssistantResult, BackendTurnResult, ConversationBackend, DEFAULT_FALLBACK_TEXT,
};
pub use client::AssistantsClient;
pub use config::{BackendConfig, OPENAI_API_BASE_URL};
pub use retry::RetryPolicy;
