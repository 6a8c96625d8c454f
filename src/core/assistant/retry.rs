//! Bounded exponential backoff for transient backend errors.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::base::AssistantResult;

/// Retry behaviour for idempotent backend requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt. 0 disables retrying.
    /// Default: 2
    pub max_retries: u32,

    /// Delay before the first retry (milliseconds).
    /// Default: 200ms
    pub initial_delay_ms: u64,

    /// Upper bound for any single delay (milliseconds).
    /// Default: 2000ms
    pub max_delay_ms: u64,

    /// Multiplier for exponential backoff.
    /// Default: 2.0
    pub backoff_multiplier: f32,

    /// Add up to 25% jitter to each delay.
    /// Default: true
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay_ms: 200,
            max_delay_ms: 2000,
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Delay in milliseconds before retry number `attempt` (1-based).
    pub fn calculate_delay(&self, attempt: u32) -> u64 {
        let base_delay = self.initial_delay_ms as f64;
        let multiplier = self.backoff_multiplier as f64;

        let delay = base_delay * multiplier.powi(attempt.saturating_sub(1) as i32);
        let delay = delay.min(self.max_delay_ms as f64);

        if self.jitter {
            let jitter_range = delay * 0.25;
            (delay + rand_jitter(jitter_range)).max(0.0) as u64
        } else {
            delay as u64
        }
    }

    /// Whether another retry is allowed after `attempt` retries.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }

    /// Run `op`, retrying transient failures with backoff.
    ///
    /// Non-transient errors are returned immediately.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut op: F) -> AssistantResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AssistantResult<T>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && self.should_retry(attempt) => {
                    attempt += 1;
                    let delay_ms = self.calculate_delay(attempt);
                    warn!(
                        operation,
                        attempt,
                        delay_ms,
                        error = %e,
                        "Transient backend error, retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Pseudo-random jitter in `[-range, range]` from a clock-seeded LCG.
fn rand_jitter(range: f64) -> f64 {
    use std::time::SystemTime;
    let seed = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64;
    let random = ((seed.wrapping_mul(1103515245).wrapping_add(12345)) % (1 << 31)) as f64;
    let normalized = random / (1u64 << 31) as f64;
    (normalized - 0.5) * 2.0 * range
}
