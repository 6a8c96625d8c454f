use super::ServerConfig;
use crate::core::audio::Transcoder;
use crate::core::realtime::OpenAIRealtimeVoice;

type ValidationResult = Result<(), Box<dyn std::error::Error>>;

/// Run every validation rule against a loaded configuration.
pub(crate) fn validate_config(config: &ServerConfig) -> ValidationResult {
    validate_credentials(&config.openai_api_key, &config.assistant_id)?;
    validate_voice(&config.voice)?;
    validate_vad_threshold(config.vad_threshold)?;
    validate_sample_rate(config.wideband_sample_rate)?;
    validate_backend_timing(
        config.backend_poll_interval_ms,
        config.backend_max_poll_attempts,
        config.backend_turn_timeout_ms,
    )?;
    validate_fallback_text(&config.backend_fallback_text)?;
    validate_max_concurrent_calls(config.max_concurrent_calls)?;
    Ok(())
}

/// The API key and assistant id are both required.
pub(crate) fn validate_credentials(
    api_key: &Option<String>,
    assistant_id: &Option<String>,
) -> ValidationResult {
    if api_key.as_deref().is_none_or(|k| k.trim().is_empty()) {
        return Err("OPENAI_API_KEY is required".into());
    }
    if assistant_id.as_deref().is_none_or(|id| id.trim().is_empty()) {
        return Err("OPENAI_ASSISTANT_ID is required".into());
    }
    Ok(())
}

pub(crate) fn validate_voice(voice: &str) -> ValidationResult {
    if OpenAIRealtimeVoice::parse(voice).is_none() {
        return Err(format!("Unsupported voice: {voice}").into());
    }
    Ok(())
}

/// VAD threshold must lie in [0, 1].
pub(crate) fn validate_vad_threshold(threshold: f32) -> ValidationResult {
    if !(0.0..=1.0).contains(&threshold) {
        return Err(format!("VAD_THRESHOLD must be between 0 and 1, got {threshold}").into());
    }
    Ok(())
}

/// Wideband rate must be a multiple of 8000 in (8000, 48000].
pub(crate) fn validate_sample_rate(rate: u32) -> ValidationResult {
    Transcoder::new(rate).map_err(|e| format!("WIDEBAND_SAMPLE_RATE: {e}"))?;
    Ok(())
}

/// Poll interval must be positive and shorter than the turn timeout.
pub(crate) fn validate_backend_timing(
    poll_interval_ms: u64,
    max_poll_attempts: u32,
    turn_timeout_ms: u64,
) -> ValidationResult {
    if poll_interval_ms == 0 {
        return Err("BACKEND_POLL_INTERVAL_MS must be greater than 0".into());
    }
    if poll_interval_ms >= turn_timeout_ms {
        return Err(format!(
            "BACKEND_POLL_INTERVAL_MS ({poll_interval_ms}) must be less than BACKEND_TURN_TIMEOUT_MS ({turn_timeout_ms})"
        )
        .into());
    }
    if max_poll_attempts == 0 {
        return Err("BACKEND_MAX_POLL_ATTEMPTS must be greater than 0".into());
    }
    Ok(())
}

pub(crate) fn validate_fallback_text(text: &str) -> ValidationResult {
    if text.trim().is_empty() {
        return Err("BACKEND_FALLBACK_TEXT must not be empty".into());
    }
    Ok(())
}

pub(crate) fn validate_max_concurrent_calls(limit: Option<usize>) -> ValidationResult {
    if limit == Some(0) {
        return Err("MAX_CONCURRENT_CALLS must be greater than 0 when set".into());
    }
    Ok(())
}
