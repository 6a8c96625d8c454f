//! Configuration module for the voice bridge
//!
//! This module handles server configuration from various sources: .env files, YAML files,
//! and environment variables. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `merge`: Merging YAML and environment configurations
//! - `validation`: Configuration validation logic
//!
//! # Example
//! ```rust,no_run
//! use voice_bridge::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config_path = PathBuf::from("config.yaml");
//! let config = ServerConfig::from_file(&config_path)?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;

mod env;
mod merge;
mod validation;
mod yaml;

use crate::core::assistant::{BackendConfig, RetryPolicy};
use crate::core::audio::{AudioResult, Transcoder};
use crate::core::realtime::{OpenAIRealtimeVoice, RealtimeConfig, VadConfig};

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 5050;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;
pub const DEFAULT_MAX_POLL_ATTEMPTS: u32 = 60;
pub const DEFAULT_TURN_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_MAX_RETRIES: u32 = 2;
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 200;

/// TLS configuration for HTTPS and WSS
#[derive(Debug, Clone)]
pub struct TlsConfig {
    /// Path to the TLS certificate file (PEM format)
    pub cert_path: PathBuf,
    /// Path to the TLS private key file (PEM format)
    pub key_path: PathBuf,
}

/// Server configuration
///
/// Contains everything needed to run the bridge:
/// - Server settings (host, port, TLS, call limit, CORS)
/// - The OpenAI API key shared by the speech channel and the conversation backend
/// - Speech channel settings (Realtime endpoint, voice, VAD)
/// - Conversation backend settings (assistant, polling, retries, fallback line)
/// - Audio settings (wideband sample rate)
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,

    // TLS configuration (optional)
    pub tls: Option<TlsConfig>,

    /// Maximum simultaneous calls; `None` means unlimited
    pub max_concurrent_calls: Option<usize>,
    /// Comma-separated list of allowed origins, or "*"
    pub cors_allowed_origins: Option<String>,

    /// OpenAI API key for the Realtime and Assistants APIs
    pub openai_api_key: Option<String>,

    // Speech channel
    pub realtime_url: String,
    pub realtime_model: String,
    pub voice: String,
    pub speech_instructions: String,
    pub transcription_model: String,
    pub vad_threshold: f32,
    pub vad_prefix_padding_ms: u32,
    pub vad_silence_duration_ms: u32,
    pub speech_handshake_timeout_ms: u64,

    // Conversation backend
    pub api_base_url: String,
    pub assistant_id: Option<String>,
    pub backend_poll_interval_ms: u64,
    pub backend_max_poll_attempts: u32,
    pub backend_turn_timeout_ms: u64,
    pub backend_max_retries: u32,
    pub backend_retry_base_delay_ms: u64,
    pub backend_fallback_text: String,

    // Audio
    pub wideband_sample_rate: u32,
}

/// Zeroize the API key when ServerConfig is dropped.
impl Drop for ServerConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        if let Some(ref mut key) = self.openai_api_key {
            key.zeroize();
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables only
    ///
    /// The .env file is loaded in main.rs before this runs, so its values are
    /// visible here as environment variables. The result is validated.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let config = merge::merge_config(None)?;
        validation::validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a YAML file with environment variable base
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    ///
    /// # Errors
    /// Returns an error if:
    /// - The YAML file cannot be read or is malformed
    /// - Environment variables have invalid formats
    /// - Configuration validation fails
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let yaml_config = yaml::YamlConfig::from_file(path)?;
        let config = merge::merge_config(Some(yaml_config))?;
        validation::validate_config(&config)?;
        Ok(config)
    }

    /// Get the server address as a string, in the format "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn is_tls_enabled(&self) -> bool {
        self.tls.is_some()
    }

    /// Settings for opening speech channels.
    pub fn realtime_config(&self) -> RealtimeConfig {
        RealtimeConfig {
            api_key: self.openai_api_key.clone().unwrap_or_default(),
            url: self.realtime_url.clone(),
            model: self.realtime_model.clone(),
            voice: OpenAIRealtimeVoice::from_str_or_default(&self.voice),
            instructions: self.speech_instructions.clone(),
            transcription_model: self.transcription_model.clone(),
            vad: VadConfig {
                threshold: self.vad_threshold,
                prefix_padding_ms: self.vad_prefix_padding_ms,
                silence_duration_ms: self.vad_silence_duration_ms,
            },
            handshake_timeout_ms: self.speech_handshake_timeout_ms,
        }
    }

    /// Settings for the conversation backend client.
    pub fn backend_config(&self) -> BackendConfig {
        BackendConfig {
            api_key: self.openai_api_key.clone().unwrap_or_default(),
            assistant_id: self.assistant_id.clone().unwrap_or_default(),
            base_url: self.api_base_url.clone(),
            poll_interval_ms: self.backend_poll_interval_ms,
            max_poll_attempts: self.backend_max_poll_attempts,
            turn_timeout_ms: self.backend_turn_timeout_ms,
            fallback_text: self.backend_fallback_text.clone(),
            retry: RetryPolicy {
                max_retries: self.backend_max_retries,
                initial_delay_ms: self.backend_retry_base_delay_ms,
                ..RetryPolicy::default()
            },
        }
    }

    pub fn transcoder(&self) -> AudioResult<Transcoder> {
        Transcoder::new(self.wideband_sample_rate)
    }
}
