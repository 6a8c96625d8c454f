//! OpenAI Realtime API configuration types.
//!
//! Endpoint, model and voice selection for the speech backend.

use serde::{Deserialize, Serialize};

/// OpenAI Realtime API WebSocket endpoint.
pub const OPENAI_REALTIME_URL: &str = "wss://api.openai.com/v1/realtime";

/// Default realtime model.
pub const DEFAULT_REALTIME_MODEL: &str = "gpt-4o-realtime-preview";

/// Audio sample rate of the `pcm16` format.
pub const OPENAI_REALTIME_SAMPLE_RATE: u32 = 24000;

/// Wire name of 16-bit little-endian PCM.
pub const PCM16_FORMAT: &str = "pcm16";

/// Default model used for input audio transcription.
pub const DEFAULT_TRANSCRIPTION_MODEL: &str = "whisper-1";

// =============================================================================
// Voices
// =============================================================================

/// Available voices for OpenAI Realtime API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpenAIRealtimeVoice {
    /// Alloy voice (default)
    #[default]
    Alloy,
    Ash,
    Ballad,
    Coral,
    Echo,
    Sage,
    Shimmer,
    Verse,
}

impl OpenAIRealtimeVoice {
    /// Convert to the API parameter value.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Alloy => "alloy",
            Self::Ash => "ash",
            Self::Ballad => "ballad",
            Self::Coral => "coral",
            Self::Echo => "echo",
            Self::Sage => "sage",
            Self::Shimmer => "shimmer",
            Self::Verse => "verse",
        }
    }

    /// Parse a voice name, `None` if unknown.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "alloy" => Some(Self::Alloy),
            "ash" => Some(Self::Ash),
            "ballad" => Some(Self::Ballad),
            "coral" => Some(Self::Coral),
            "echo" => Some(Self::Echo),
            "sage" => Some(Self::Sage),
            "shimmer" => Some(Self::Shimmer),
            "verse" => Some(Self::Verse),
            _ => None,
        }
    }

    /// Parse from string, with fallback to default.
    pub fn from_str_or_default(s: &str) -> Self {
        Self::parse(s).unwrap_or_default()
    }
}

impl std::fmt::Display for OpenAIRealtimeVoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
