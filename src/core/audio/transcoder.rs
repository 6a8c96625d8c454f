//! Narrowband ↔ wideband transcoding.
//!
//! Narrowband is telephony audio: 8 kHz, 8-bit μ-law. Wideband is 16-bit signed
//! little-endian PCM at an integer multiple of 8 kHz (24 kHz for the OpenAI Realtime
//! `pcm16` format).
//!
//! Both directions are total: malformed or empty input produces empty output so a bad
//! frame can never fail a call.

use base64::prelude::*;

use super::g711::{linear_to_mulaw, mulaw_to_linear};
use super::{AudioError, AudioResult};

/// Telephony sample rate.
pub const NARROWBAND_SAMPLE_RATE: u32 = 8000;

/// Default wideband rate, matching the speech backend's PCM16 format.
pub const DEFAULT_WIDEBAND_SAMPLE_RATE: u32 = 24000;

/// Highest accepted wideband rate.
pub const MAX_WIDEBAND_SAMPLE_RATE: u32 = 48000;

/// Stateless converter between μ-law narrowband and PCM16 wideband audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transcoder {
    wideband_rate: u32,
    ratio: usize,
}

impl Default for Transcoder {
    fn default() -> Self {
        Self {
            wideband_rate: DEFAULT_WIDEBAND_SAMPLE_RATE,
            ratio: (DEFAULT_WIDEBAND_SAMPLE_RATE / NARROWBAND_SAMPLE_RATE) as usize,
        }
    }
}

impl Transcoder {
    /// Create a transcoder for the given wideband sample rate.
    ///
    /// The rate must be a multiple of 8000, strictly greater than it and at
    /// most [`MAX_WIDEBAND_SAMPLE_RATE`].
    pub fn new(wideband_rate: u32) -> AudioResult<Self> {
        if wideband_rate <= NARROWBAND_SAMPLE_RATE
            || wideband_rate > MAX_WIDEBAND_SAMPLE_RATE
            || wideband_rate % NARROWBAND_SAMPLE_RATE != 0
        {
            return Err(AudioError::UnsupportedSampleRate(wideband_rate));
        }

        Ok(Self {
            wideband_rate,
            ratio: (wideband_rate / NARROWBAND_SAMPLE_RATE) as usize,
        })
    }

    pub fn wideband_rate(&self) -> u32 {
        self.wideband_rate
    }

    /// Upsampling factor between narrowband and wideband.
    pub fn ratio(&self) -> usize {
        self.ratio
    }

    /// Decode μ-law and upsample to wideband PCM16 (little-endian bytes).
    ///
    /// Original samples land on every `ratio`-th output position and the gaps are
    /// filled by linear interpolation. The last sample of a chunk is held, since the
    /// next chunk is not visible here.
    pub fn narrowband_to_wideband(&self, mulaw: &[u8]) -> Vec<u8> {
        if mulaw.is_empty() {
            return Vec::new();
        }

        let samples: Vec<i32> = mulaw.iter().map(|&b| mulaw_to_linear(b) as i32).collect();
        let ratio = self.ratio as i32;
        let mut out = Vec::with_capacity(samples.len() * self.ratio * 2);

        for (i, &current) in samples.iter().enumerate() {
            let next = samples.get(i + 1).copied().unwrap_or(current);
            for step in 0..ratio {
                let value = current + (next - current) * step / ratio;
                out.extend_from_slice(&(value as i16).to_le_bytes());
            }
        }

        out
    }

    /// Downsample wideband PCM16 (little-endian bytes) and encode to μ-law.
    ///
    /// Each output sample is the mean of `ratio` consecutive input samples; a short
    /// trailing group is averaged over what is present. An odd byte count is treated
    /// as malformed.
    pub fn wideband_to_narrowband(&self, pcm: &[u8]) -> Vec<u8> {
        if pcm.is_empty() || pcm.len() % 2 != 0 {
            return Vec::new();
        }

        let samples: Vec<i32> = pcm
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as i32)
            .collect();

        samples
            .chunks(self.ratio)
            .map(|group| {
                let sum: i32 = group.iter().sum();
                linear_to_mulaw((sum / group.len() as i32) as i16)
            })
            .collect()
    }
}

/// Convert telephony μ-law to wideband PCM16 at the default rate.
pub fn narrowband_to_wideband(mulaw: &[u8]) -> Vec<u8> {
    Transcoder::default().narrowband_to_wideband(mulaw)
}

/// Convert wideband PCM16 at the default rate to telephony μ-law.
pub fn wideband_to_narrowband(pcm: &[u8]) -> Vec<u8> {
    Transcoder::default().wideband_to_narrowband(pcm)
}

/// Encode audio bytes for a JSON wire payload.
pub fn encode_base64(audio: &[u8]) -> String {
    BASE64_STANDARD.encode(audio)
}

/// Decode a base64 wire payload into audio bytes.
pub fn decode_base64(payload: &str) -> AudioResult<Vec<u8>> {
    BASE64_STANDARD
        .decode(payload)
        .map_err(|e| AudioError::InvalidBase64(e.to_string()))
}
