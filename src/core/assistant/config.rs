use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::base::DEFAULT_FALLBACK_TEXT;
use super::retry::RetryPolicy;

/// Default REST API base URL.
pub const OPENAI_API_BASE_URL: &str = "https://api.openai.com/v1";

/// Configuration for the Assistants backend client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub api_key: String,

    /// Assistant that answers every turn
    pub assistant_id: String,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Delay between run status polls (milliseconds)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Maximum number of run status polls per turn
    #[serde(default = "default_max_poll_attempts")]
    pub max_poll_attempts: u32,

    /// Overall deadline for one turn (milliseconds)
    #[serde(default = "default_turn_timeout_ms")]
    pub turn_timeout_ms: u64,

    /// Line spoken when a turn fails
    #[serde(default = "default_fallback_text")]
    pub fallback_text: String,

    #[serde(default)]
    pub retry: RetryPolicy,
}

fn default_base_url() -> String {
    OPENAI_API_BASE_URL.to_string()
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_max_poll_attempts() -> u32 {
    60
}

fn default_turn_timeout_ms() -> u64 {
    30_000
}

fn default_fallback_text() -> String {
    DEFAULT_FALLBACK_TEXT.to_string()
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            assistant_id: String::new(),
            base_url: default_base_url(),
            poll_interval_ms: default_poll_interval_ms(),
            max_poll_attempts: default_max_poll_attempts(),
            turn_timeout_ms: default_turn_timeout_ms(),
            fallback_text: default_fallback_text(),
            retry: RetryPolicy::default(),
        }
    }
}

impl BackendConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn turn_timeout(&self) -> Duration {
        Duration::from_millis(self.turn_timeout_ms)
    }

    /// Join a path onto the base URL.
    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }
}
