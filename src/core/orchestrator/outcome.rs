use std::fmt;
use std::time::Duration;

/// Why a call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// Telephony sent `stop`
    TelephonyStop,
    /// Telephony socket closed without `stop`
    TelephonyDisconnect,
    /// Speech channel stopped producing events or refused audio
    SpeechChannelClosed,
    /// Speech backend reported an error
    SpeechChannelError,
    /// Outbound telephony writer is gone
    OutboundClosed,
}

impl EndReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TelephonyStop => "telephony_stop",
            Self::TelephonyDisconnect => "telephony_disconnect",
            Self::SpeechChannelClosed => "speech_channel_closed",
            Self::SpeechChannelError => "speech_channel_error",
            Self::OutboundClosed => "outbound_closed",
        }
    }
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summary of a finished call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallOutcome {
    pub call_id: String,
    pub end_reason: EndReason,
    /// Backend turns taken, fallbacks included
    pub turn_count: u32,
    pub fallback_count: u32,
    pub duration: Duration,
}
