use serde::Deserialize;
use std::path::PathBuf;

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration. Values present here
/// override environment variables.
///
/// # Example YAML structure
/// ```yaml
/// server:
///   host: "0.0.0.0"
///   port: 5050
///   max_concurrent_calls: 100
///   cors_allowed_origins: "https://console.example.com"
///   tls:
///     cert_path: "/etc/voice-bridge/cert.pem"
///     key_path: "/etc/voice-bridge/key.pem"
///
/// providers:
///   openai_api_key: "sk-..."
///
/// speech:
///   url: "wss://api.openai.com/v1/realtime"
///   model: "gpt-4o-realtime-preview"
///   voice: "alloy"
///   instructions: "Speak the provided responses verbatim."
///   transcription_model: "whisper-1"
///   handshake_timeout_ms: 10000
///   vad:
///     threshold: 0.5
///     prefix_padding_ms: 300
///     silence_duration_ms: 500
///
/// backend:
///   base_url: "https://api.openai.com/v1"
///   assistant_id: "asst_..."
///   poll_interval_ms: 500
///   max_poll_attempts: 60
///   turn_timeout_ms: 30000
///   max_retries: 2
///   retry_base_delay_ms: 200
///   fallback_text: "I'm having technical difficulties. Let me transfer you to an agent."
///
/// audio:
///   wideband_sample_rate: 24000
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub providers: Option<ProvidersYaml>,
    pub speech: Option<SpeechYaml>,
    pub backend: Option<BackendYaml>,
    pub audio: Option<AudioYaml>,
}

/// Server configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub tls: Option<TlsYaml>,
    pub max_concurrent_calls: Option<usize>,
    pub cors_allowed_origins: Option<String>,
}

/// TLS configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TlsYaml {
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
}

/// Provider credentials from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ProvidersYaml {
    /// OpenAI API key, shared by the Realtime and Assistants APIs
    pub openai_api_key: Option<String>,
}

/// Speech channel settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SpeechYaml {
    pub url: Option<String>,
    pub model: Option<String>,
    pub voice: Option<String>,
    pub instructions: Option<String>,
    pub transcription_model: Option<String>,
    pub handshake_timeout_ms: Option<u64>,
    pub vad: Option<VadYaml>,
}

/// Server VAD settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct VadYaml {
    pub threshold: Option<f32>,
    pub prefix_padding_ms: Option<u32>,
    pub silence_duration_ms: Option<u32>,
}

/// Conversation backend settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct BackendYaml {
    pub base_url: Option<String>,
    pub assistant_id: Option<String>,
    pub poll_interval_ms: Option<u64>,
    pub max_poll_attempts: Option<u32>,
    pub turn_timeout_ms: Option<u64>,
    pub max_retries: Option<u32>,
    pub retry_base_delay_ms: Option<u64>,
    pub fallback_text: Option<String>,
}

/// Audio settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AudioYaml {
    pub wideband_sample_rate: Option<u32>,
}

impl YamlConfig {
    /// Load YAML configuration from a file
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {e}", path.display()))?;

        let config: YamlConfig = serde_yaml::from_str(&contents)
            .map_err(|e| format!("Failed to parse YAML config: {e}"))?;

        Ok(config)
    }
}
