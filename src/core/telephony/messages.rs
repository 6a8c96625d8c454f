//! Twilio Media Streams WebSocket envelopes.
//!
//! Inbound (Twilio to bridge):
//! - `connected` - Socket opened
//! - `start` - Stream metadata, carries `callSid` and `streamSid`
//! - `media` - One base64 μ-law frame
//! - `mark` - Playback of a previously sent mark finished
//! - `dtmf` - Keypress
//! - `stop` - Stream ended
//!
//! Outbound (bridge to Twilio):
//! - `media` - One base64 μ-law frame to play
//! - `mark` - Playback marker
//! - `clear` - Drop buffered outbound audio

use serde::{Deserialize, Serialize};

// =============================================================================
// Inbound
// =============================================================================

/// Envelope received from Twilio.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum InboundMessage {
    Connected {
        #[serde(default)]
        protocol: Option<String>,
        #[serde(default)]
        version: Option<String>,
    },

    Start {
        #[serde(rename = "streamSid", default)]
        stream_sid: Option<String>,
        start: StreamStart,
    },

    Media {
        #[serde(rename = "streamSid", default)]
        stream_sid: Option<String>,
        media: MediaPayload,
    },

    Mark {
        #[serde(rename = "streamSid", default)]
        stream_sid: Option<String>,
        #[serde(default)]
        mark: Option<MarkPayload>,
    },

    Dtmf {
        #[serde(rename = "streamSid", default)]
        stream_sid: Option<String>,
        #[serde(default)]
        dtmf: Option<DtmfPayload>,
    },

    Stop {
        #[serde(rename = "streamSid", default)]
        stream_sid: Option<String>,
        #[serde(default)]
        stop: Option<StreamStop>,
    },

    #[serde(other)]
    Unknown,
}

impl InboundMessage {
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Connected { .. } => "connected",
            Self::Start { .. } => "start",
            Self::Media { .. } => "media",
            Self::Mark { .. } => "mark",
            Self::Dtmf { .. } => "dtmf",
            Self::Stop { .. } => "stop",
            Self::Unknown => "unknown",
        }
    }
}

/// Body of the `start` event.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamStart {
    pub call_sid: String,
    pub stream_sid: String,
    #[serde(default)]
    pub account_sid: Option<String>,
    #[serde(default)]
    pub tracks: Vec<String>,
    #[serde(default)]
    pub media_format: Option<MediaFormat>,
    #[serde(default)]
    pub custom_parameters: Option<serde_json::Map<String, serde_json::Value>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaFormat {
    /// `audio/x-mulaw`
    pub encoding: String,
    pub sample_rate: u32,
    #[serde(default = "default_channels")]
    pub channels: u16,
}

fn default_channels() -> u16 {
    1
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MediaPayload {
    /// Base64 μ-law audio
    pub payload: String,
    #[serde(default)]
    pub track: Option<String>,
    #[serde(default)]
    pub chunk: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MarkPayload {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DtmfPayload {
    #[serde(default)]
    pub digit: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamStop {
    #[serde(default)]
    pub call_sid: Option<String>,
    #[serde(default)]
    pub account_sid: Option<String>,
}

// =============================================================================
// Outbound
// =============================================================================

/// Envelope sent to Twilio.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum OutboundMessage {
    Media {
        #[serde(rename = "streamSid")]
        stream_sid: String,
        media: OutboundMedia,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundMedia {
    /// Base64 μ-law audio
    pub payload: String,
}

impl OutboundMessage {
    /// Outbound audio frame for a stream.
    pub fn media(stream_sid: impl Into<String>, payload: impl Into<String>) -> Self {
        Self::Media {
            stream_sid: stream_sid.into(),
            media: OutboundMedia {
                payload: payload.into(),
            },
        }
    }
}
