use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use super::{
    DEFAULT_HOST, DEFAULT_MAX_POLL_ATTEMPTS, DEFAULT_POLL_INTERVAL_MS, DEFAULT_PORT,
    DEFAULT_RETRY_BASE_DELAY_MS, DEFAULT_TURN_TIMEOUT_MS, DEFAULT_MAX_RETRIES, ServerConfig,
    TlsConfig,
};
use crate::core::assistant::{DEFAULT_FALLBACK_TEXT, OPENAI_API_BASE_URL};
use crate::core::audio::DEFAULT_WIDEBAND_SAMPLE_RATE;
use crate::core::realtime::openai::{
    DEFAULT_REALTIME_MODEL, DEFAULT_TRANSCRIPTION_MODEL, OPENAI_REALTIME_URL,
};
use crate::core::realtime::{DEFAULT_HANDSHAKE_TIMEOUT_MS, DEFAULT_SPEECH_INSTRUCTIONS, VadConfig};

/// Read a non-empty environment variable.
pub(crate) fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn invalid_value(name: &str, e: impl std::fmt::Display) -> Box<dyn std::error::Error> {
    format!("Invalid value for {name}: {e}").into()
}

/// Parse an environment variable, falling back to `default` when unset.
pub(crate) fn parse_env<T>(name: &str, default: T) -> Result<T, Box<dyn std::error::Error>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_var(name) {
        Some(value) => value
            .trim()
            .parse::<T>()
            .map_err(|e| invalid_value(name, e)),
        None => Ok(default),
    }
}

/// Parse an optional environment variable.
pub(crate) fn parse_env_opt<T>(name: &str) -> Result<Option<T>, Box<dyn std::error::Error>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env_var(name)
        .map(|value| {
            value
                .trim()
                .parse::<T>()
                .map_err(|e| invalid_value(name, e))
        })
        .transpose()
}

/// Build the TLS section from a cert/key pair. Both or neither must be set.
pub(crate) fn tls_from_paths(
    cert_path: Option<String>,
    key_path: Option<String>,
) -> Result<Option<TlsConfig>, Box<dyn std::error::Error>> {
    match (cert_path, key_path) {
        (Some(cert), Some(key)) => Ok(Some(TlsConfig {
            cert_path: PathBuf::from(cert),
            key_path: PathBuf::from(key),
        })),
        (None, None) => Ok(None),
        _ => Err("TLS_CERT_PATH and TLS_KEY_PATH must be set together".into()),
    }
}

/// Load configuration from environment variables, with defaults.
///
/// No validation happens here; see [`super::validation`].
pub(crate) fn load_from_env() -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let vad = VadConfig::default();

    Ok(ServerConfig {
        host: env_var("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
        port: parse_env("PORT", DEFAULT_PORT)?,
        tls: tls_from_paths(env_var("TLS_CERT_PATH"), env_var("TLS_KEY_PATH"))?,
        max_concurrent_calls: parse_env_opt("MAX_CONCURRENT_CALLS")?,
        cors_allowed_origins: env_var("CORS_ALLOWED_ORIGINS"),

        openai_api_key: env_var("OPENAI_API_KEY"),

        realtime_url: env_var("OPENAI_REALTIME_URL")
            .unwrap_or_else(|| OPENAI_REALTIME_URL.to_string()),
        realtime_model: env_var("OPENAI_REALTIME_MODEL")
            .unwrap_or_else(|| DEFAULT_REALTIME_MODEL.to_string()),
        voice: env_var("OPENAI_VOICE").unwrap_or_else(|| "alloy".to_string()),
        speech_instructions: env_var("SPEECH_INSTRUCTIONS")
            .unwrap_or_else(|| DEFAULT_SPEECH_INSTRUCTIONS.to_string()),
        transcription_model: env_var("TRANSCRIPTION_MODEL")
            .unwrap_or_else(|| DEFAULT_TRANSCRIPTION_MODEL.to_string()),
        vad_threshold: parse_env("VAD_THRESHOLD", vad.threshold)?,
        vad_prefix_padding_ms: parse_env("VAD_PREFIX_PADDING_MS", vad.prefix_padding_ms)?,
        vad_silence_duration_ms: parse_env("VAD_SILENCE_DURATION_MS", vad.silence_duration_ms)?,
        speech_handshake_timeout_ms: parse_env(
            "SPEECH_HANDSHAKE_TIMEOUT_MS",
            DEFAULT_HANDSHAKE_TIMEOUT_MS,
        )?,

        api_base_url: env_var("OPENAI_API_BASE_URL")
            .unwrap_or_else(|| OPENAI_API_BASE_URL.to_string()),
        assistant_id: env_var("OPENAI_ASSISTANT_ID"),
        backend_poll_interval_ms: parse_env("BACKEND_POLL_INTERVAL_MS", DEFAULT_POLL_INTERVAL_MS)?,
        backend_max_poll_attempts: parse_env(
            "BACKEND_MAX_POLL_ATTEMPTS",
            DEFAULT_MAX_POLL_ATTEMPTS,
        )?,
        backend_turn_timeout_ms: parse_env("BACKEND_TURN_TIMEOUT_MS", DEFAULT_TURN_TIMEOUT_MS)?,
        backend_max_retries: parse_env("BACKEND_MAX_RETRIES", DEFAULT_MAX_RETRIES)?,
        backend_retry_base_delay_ms: parse_env(
            "BACKEND_RETRY_BASE_DELAY_MS",
            DEFAULT_RETRY_BASE_DELAY_MS,
        )?,
        backend_fallback_text: env_var("BACKEND_FALLBACK_TEXT")
            .unwrap_or_else(|| DEFAULT_FALLBACK_TEXT.to_string()),

        wideband_sample_rate: parse_env("WIDEBAND_SAMPLE_RATE", DEFAULT_WIDEBAND_SAMPLE_RATE)?,
    })
}
