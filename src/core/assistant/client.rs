//! OpenAI Assistants v2 conversation backend.
//!
//! One turn is: append the user message, start a run, poll the run until it
//! leaves the pending states, then read the newest assistant message. The
//! whole turn runs under a single deadline and the poll count is capped.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use super::base::{AssistantError, AssistantResult, BackendTurnResult, ConversationBackend};
use super::config::BackendConfig;
use super::messages::{
    CreateMessageRequest, CreateRunRequest, MessageList, Run, RunStatus, Thread,
};
use crate::core::session::CallSession;

/// Per-request HTTP timeout. The turn deadline bounds the total.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Messages fetched when looking for the answer.
const MESSAGE_PAGE_SIZE: u32 = 10;

/// Assistants API client with a per-call thread cache.
pub struct AssistantsClient {
    config: BackendConfig,
    http_client: Client,
    /// call_id -> thread id, initialised at most once per call
    threads: DashMap<String, Arc<OnceCell<String>>>,
}

impl AssistantsClient {
    pub fn new(config: BackendConfig) -> AssistantResult<Self> {
        if config.api_key.is_empty() {
            return Err(AssistantError::InvalidConfiguration(
                "API key is required for the Assistants backend".to_string(),
            ));
        }
        if config.assistant_id.is_empty() {
            return Err(AssistantError::InvalidConfiguration(
                "assistant id is required".to_string(),
            ));
        }

        let http_client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .pool_max_idle_per_host(8)
            .build()
            .map_err(|e| {
                AssistantError::InvalidConfiguration(format!("Failed to create HTTP client: {e}"))
            })?;

        Ok(Self {
            config,
            http_client,
            threads: DashMap::new(),
        })
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    /// Number of calls with a cached thread.
    pub fn cached_threads(&self) -> usize {
        self.threads.len()
    }

    // =========================================================================
    // REST calls
    // =========================================================================

    fn request(&self, method: reqwest::Method, path: &str) -> RequestBuilder {
        self.http_client
            .request(method, self.config.endpoint(path))
            .bearer_auth(&self.config.api_key)
            .header("OpenAI-Beta", "assistants=v2")
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> AssistantResult<T> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(AssistantError::Api {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| AssistantError::Decode(e.to_string()))
    }

    /// `POST /threads`
    pub async fn create_thread(&self) -> AssistantResult<String> {
        let thread: Thread = self
            .send_json(
                self.request(reqwest::Method::POST, "threads")
                    .json(&serde_json::json!({})),
            )
            .await?;
        Ok(thread.id)
    }

    /// `POST /threads/{id}/messages`
    pub async fn add_user_message(&self, thread_id: &str, text: &str) -> AssistantResult<()> {
        let _: serde_json::Value = self
            .send_json(
                self.request(reqwest::Method::POST, &format!("threads/{thread_id}/messages"))
                    .json(&CreateMessageRequest {
                        role: "user",
                        content: text,
                    }),
            )
            .await?;
        Ok(())
    }

    /// `POST /threads/{id}/runs`
    pub async fn create_run(&self, thread_id: &str) -> AssistantResult<Run> {
        self.send_json(
            self.request(reqwest::Method::POST, &format!("threads/{thread_id}/runs"))
                .json(&CreateRunRequest {
                    assistant_id: &self.config.assistant_id,
                }),
        )
        .await
    }

    /// `GET /threads/{id}/runs/{run_id}`
    pub async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> AssistantResult<Run> {
        self.send_json(self.request(
            reqwest::Method::GET,
            &format!("threads/{thread_id}/runs/{run_id}"),
        ))
        .await
    }

    /// `GET /threads/{id}/messages?order=desc`
    pub async fn list_messages(&self, thread_id: &str) -> AssistantResult<MessageList> {
        self.send_json(
            self.request(reqwest::Method::GET, &format!("threads/{thread_id}/messages"))
                .query(&[
                    ("order", "desc".to_string()),
                    ("limit", MESSAGE_PAGE_SIZE.to_string()),
                ]),
        )
        .await
    }

    // =========================================================================
    // Turn
    // =========================================================================

    /// Run one turn to completion without the overall deadline.
    async fn run_turn(&self, thread_id: &str, utterance: &str) -> AssistantResult<String> {
        // Not idempotent, so never retried.
        self.add_user_message(thread_id, utterance).await?;

        let retry = &self.config.retry;
        let run = retry
            .run("create_run", || self.create_run(thread_id))
            .await?;
        debug!(thread_id, run_id = %run.id, status = %run.status, "Run started");

        let mut status = run.status;
        let mut last_error = run.last_error;
        let mut polls = 0;

        while status.is_pending() {
            if polls >= self.config.max_poll_attempts {
                return Err(AssistantError::PollsExhausted(polls));
            }
            tokio::time::sleep(self.config.poll_interval()).await;
            polls += 1;

            let polled = retry
                .run("retrieve_run", || self.retrieve_run(thread_id, &run.id))
                .await?;
            debug!(thread_id, run_id = %run.id, status = %polled.status, polls, "Run polled");
            status = polled.status;
            last_error = polled.last_error;
        }

        if status != RunStatus::Completed {
            return Err(AssistantError::RunFailed {
                status,
                last_error: last_error.map(|e| format!("{}: {}", e.code, e.message)),
            });
        }

        let messages = retry
            .run("list_messages", || self.list_messages(thread_id))
            .await?;
        messages
            .answer_for_run(&run.id)
            .ok_or(AssistantError::EmptyAnswer)
    }
}

#[async_trait]
impl ConversationBackend for AssistantsClient {
    async fn ensure_thread(&self, session: &CallSession) -> AssistantResult<String> {
        let cell = self
            .threads
            .entry(session.call_id().to_string())
            .or_default()
            .clone();

        let thread_id = cell
            .get_or_try_init(|| async {
                let id = self.create_thread().await?;
                info!(call_id = %session.call_id(), thread_id = %id, "Conversation thread created");
                Ok::<_, AssistantError>(id)
            })
            .await?
            .clone();

        session.set_conversation_thread_id(&thread_id)?;
        Ok(thread_id)
    }

    async fn submit_turn(&self, thread_id: &str, utterance: &str) -> BackendTurnResult {
        let timeout = self.config.turn_timeout();
        let outcome = match tokio::time::timeout(timeout, self.run_turn(thread_id, utterance)).await
        {
            Ok(result) => result,
            Err(_) => Err(AssistantError::Timeout(self.config.turn_timeout_ms)),
        };

        match outcome {
            Ok(answer) => {
                info!(thread_id, chars = answer.len(), "Backend turn completed");
                BackendTurnResult::success(answer)
            }
            Err(e) => {
                warn!(thread_id, error = %e, "Backend turn failed, using fallback");
                BackendTurnResult::fallback(&self.config.fallback_text)
            }
        }
    }

    fn release(&self, call_id: &str) {
        if self.threads.remove(call_id).is_some() {
            debug!(call_id, "Released conversation thread");
        }
    }

    fn fallback_text(&self) -> &str {
        &self.config.fallback_text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> BackendConfig {
        BackendConfig {
            api_key: "sk-test".to_string(),
            assistant_id: "asst_test".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_requires_api_key() {
        let result = AssistantsClient::new(BackendConfig {
            api_key: String::new(),
            ..config()
        });
        assert!(matches!(
            result,
            Err(AssistantError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_requires_assistant_id() {
        let result = AssistantsClient::new(BackendConfig {
            assistant_id: String::new(),
            ..config()
        });
        assert!(matches!(
            result,
            Err(AssistantError::InvalidConfiguration(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_backend_yields_fallback() {
        let client = AssistantsClient::new(BackendConfig {
            base_url: "http://127.0.0.1:1/v1".to_string(),
            turn_timeout_ms: 2_000,
            retry: super::super::RetryPolicy::disabled(),
            ..config()
        })
        .unwrap();

        let result = client.submit_turn("thread_1", "hello").await;
        assert!(!result.succeeded);
        assert!(result.used_fallback);
        assert_eq!(result.response_text, client.fallback_text());
    }

    #[test]
    fn test_release_unknown_call_is_noop() {
        let client = AssistantsClient::new(config()).unwrap();
        client.release("CA-missing");
        assert_eq!(client.cached_threads(), 0);
    }
}
