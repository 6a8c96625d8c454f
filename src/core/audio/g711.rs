//! G.711 μ-law companding.
//!
//! Telephony media streams carry 8-bit μ-law samples at 8 kHz. These helpers convert
//! single samples between μ-law and 16-bit linear PCM using the classic bias/clip
//! algorithm, so every μ-law code except negative zero (0x7F) survives a
//! decode-then-encode pass unchanged.

/// Bias added to the magnitude before segment search.
const BIAS: i32 = 0x84;

/// Largest magnitude representable after biasing.
const CLIP: i32 = 32635;

/// μ-law encoding of linear zero (positive zero).
pub const MULAW_SILENCE: u8 = 0xFF;

/// Decode table for all 256 μ-law codes, built at compile time.
static DECODE_TABLE: [i16; 256] = build_decode_table();

const fn build_decode_table() -> [i16; 256] {
    let mut table = [0i16; 256];
    let mut i = 0;
    while i < 256 {
        table[i] = decode_sample(i as u8);
        i += 1;
    }
    table
}

const fn decode_sample(code: u8) -> i16 {
    let code = !code;
    let sign = code & 0x80;
    let exponent = ((code >> 4) & 0x07) as i32;
    let mantissa = (code & 0x0F) as i32;

    let magnitude = (((mantissa << 3) + BIAS) << exponent) - BIAS;
    if sign != 0 {
        -magnitude as i16
    } else {
        magnitude as i16
    }
}

/// Expand one μ-law code to a linear 16-bit sample.
#[inline]
pub fn mulaw_to_linear(code: u8) -> i16 {
    DECODE_TABLE[code as usize]
}

/// Compress one linear 16-bit sample to μ-law.
#[inline]
pub fn linear_to_mulaw(sample: i16) -> u8 {
    let mut pcm = sample as i32;
    let sign: u8 = if pcm < 0 {
        pcm = -pcm;
        0x80
    } else {
        0x00
    };

    pcm = pcm.min(CLIP) + BIAS;

    let mut exponent: u8 = 7;
    let mut mask = 0x4000;
    while exponent > 0 && (pcm & mask) == 0 {
        exponent -= 1;
        mask >>= 1;
    }

    let mantissa = ((pcm >> (exponent + 3)) & 0x0F) as u8;
    !(sign | (exponent << 4) | mantissa)
}
