use super::ServerConfig;
use super::env::{load_from_env, tls_from_paths};
use super::yaml::YamlConfig;

/// Merge environment configuration (base) with YAML overrides.
///
/// Every value present in the YAML file replaces the environment value.
pub(crate) fn merge_config(
    yaml: Option<YamlConfig>,
) -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let mut config = load_from_env()?;

    let Some(yaml) = yaml else {
        return Ok(config);
    };

    if let Some(server) = yaml.server {
        if let Some(host) = server.host {
            config.host = host;
        }
        if let Some(port) = server.port {
            config.port = port;
        }
        if let Some(tls) = server.tls {
            config.tls = tls_from_paths(tls.cert_path, tls.key_path)?;
        }
        if let Some(limit) = server.max_concurrent_calls {
            config.max_concurrent_calls = Some(limit);
        }
        if let Some(origins) = server.cors_allowed_origins {
            config.cors_allowed_origins = Some(origins);
        }
    }

    if let Some(providers) = yaml.providers {
        if let Some(key) = providers.openai_api_key {
            config.openai_api_key = Some(key);
        }
    }

    if let Some(speech) = yaml.speech {
        if let Some(url) = speech.url {
            config.realtime_url = url;
        }
        if let Some(model) = speech.model {
            config.realtime_model = model;
        }
        if let Some(voice) = speech.voice {
            config.voice = voice;
        }
        if let Some(instructions) = speech.instructions {
            config.speech_instructions = instructions;
        }
        if let Some(model) = speech.transcription_model {
            config.transcription_model = model;
        }
        if let Some(timeout) = speech.handshake_timeout_ms {
            config.speech_handshake_timeout_ms = timeout;
        }
        if let Some(vad) = speech.vad {
            if let Some(threshold) = vad.threshold {
                config.vad_threshold = threshold;
            }
            if let Some(padding) = vad.prefix_padding_ms {
                config.vad_prefix_padding_ms = padding;
            }
            if let Some(silence) = vad.silence_duration_ms {
                config.vad_silence_duration_ms = silence;
            }
        }
    }

    if let Some(backend) = yaml.backend {
        if let Some(url) = backend.base_url {
            config.api_base_url = url;
        }
        if let Some(id) = backend.assistant_id {
            config.assistant_id = Some(id);
        }
        if let Some(interval) = backend.poll_interval_ms {
            config.backend_poll_interval_ms = interval;
        }
        if let Some(attempts) = backend.max_poll_attempts {
            config.backend_max_poll_attempts = attempts;
        }
        if let Some(timeout) = backend.turn_timeout_ms {
            config.backend_turn_timeout_ms = timeout;
        }
        if let Some(retries) = backend.max_retries {
            config.backend_max_retries = retries;
        }
        if let Some(delay) = backend.retry_base_delay_ms {
            config.backend_retry_base_delay_ms = delay;
        }
        if let Some(text) = backend.fallback_text {
            config.backend_fallback_text = text;
        }
    }

    if let Some(audio) = yaml.audio {
        if let Some(rate) = audio.wideband_sample_rate {
            config.wideband_sample_rate = rate;
        }
    }

    Ok(config)
}
