//! Audio transcoding between the telephony and speech backend formats.
//!
//! - [`g711`]: per-sample μ-law companding
//! - [`transcoder`]: buffer conversion with resampling, plus base64 wire helpers

pub mod g711;
pub mod transcoder;

use thiserror::Error;

pub use g711::{MULAW_SILENCE, linear_to_mulaw, mulaw_to_linear};
pub use transcoder::{
    DEFAULT_WIDEBAND_SAMPLE_RATE, MAX_WIDEBAND_SAMPLE_RATE, NARROWBAND_SAMPLE_RATE, Transcoder,
    decode_base64, encode_base64, narrowband_to_wideband, wideband_to_narrowband,
};

/// Errors raised while preparing audio for transport.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AudioError {
    /// Wideband rate is not a multiple of 8 kHz in (8 kHz, 48 kHz]
    #[error("Unsupported wideband sample rate: {0} Hz")]
    UnsupportedSampleRate(u32),

    /// Wire payload is not valid base64
    #[error("Invalid base64 audio payload: {0}")]
    InvalidBase64(String),
}

pub type AudioResult<T> = Result<T, AudioError>;
