//! Telephony media-stream protocol (Twilio Media Streams).
//!
//! Audio on the wire is 8 kHz μ-law, base64 encoded, one frame per `media`
//! envelope.

pub mod messages;

pub use messages::{InboundMessage, OutboundMessage, StreamStart};

/// Encoding Twilio announces in `start.mediaFormat`.
pub const TELEPHONY_ENCODING: &str = "audio/x-mulaw";
