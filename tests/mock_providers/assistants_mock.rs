//! wiremock routes for the OpenAI Assistants v2 REST API

use std::time::Duration;

use serde_json::{Value, json};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use voice_bridge::core::assistant::{BackendConfig, RetryPolicy};

/// Backend config pointing at `server`, with test-sized timings.
pub fn backend_config(server: &MockServer) -> BackendConfig {
    BackendConfig {
        api_key: "sk-test".to_string(),
        assistant_id: "asst_test".to_string(),
        base_url: format!("{}/v1", server.uri()),
        poll_interval_ms: 10,
        max_poll_attempts: 20,
        turn_timeout_ms: 2_000,
        fallback_text: "Please hold while I transfer you.".to_string(),
        retry: RetryPolicy {
            max_retries: 2,
            initial_delay_ms: 10,
            max_delay_ms: 50,
            backoff_multiplier: 2.0,
            jitter: false,
        },
    }
}

pub fn run_body(run_id: &str, status: &str) -> Value {
    json!({"id": run_id, "object": "thread.run", "status": status, "last_error": null})
}

pub fn messages_body(answer: &str) -> Value {
    json!({
        "object": "list",
        "data": [
            {
                "id": "msg_2",
                "role": "assistant",
                "run_id": "run_1",
                "content": [{"type": "text", "text": {"value": answer, "annotations": []}}]
            },
            {
                "id": "msg_1",
                "role": "user",
                "run_id": null,
                "content": [{"type": "text", "text": {"value": "question", "annotations": []}}]
            }
        ]
    })
}

/// `POST /threads` answering with `thread_id` after `delay`.
pub async fn mount_create_thread(server: &MockServer, thread_id: &str, delay: Duration) {
    Mock::given(method("POST"))
        .and(path("/v1/threads"))
        .and(header("OpenAI-Beta", "assistants=v2"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"id": thread_id, "object": "thread"}))
                .set_delay(delay),
        )
        .mount(server)
        .await;
}

/// `POST /threads/{id}/messages`
pub async fn mount_add_message(server: &MockServer, thread_id: &str) {
    Mock::given(method("POST"))
        .and(path(format!("/v1/threads/{thread_id}/messages")))
        .and(body_partial_json(json!({"role": "user"})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"id": "msg_1", "role": "user"})),
        )
        .mount(server)
        .await;
}

/// `POST /threads/{id}/runs` answering with `status`.
pub async fn mount_create_run(server: &MockServer, thread_id: &str, status: &str) {
    Mock::given(method("POST"))
        .and(path(format!("/v1/threads/{thread_id}/runs")))
        .and(body_partial_json(json!({"assistant_id": "asst_test"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(run_body("run_1", status)))
        .mount(server)
        .await;
}

/// `GET /threads/{id}/runs/run_1` answering with `status`.
pub async fn mount_retrieve_run(server: &MockServer, thread_id: &str, status: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/v1/threads/{thread_id}/runs/run_1")))
        .respond_with(ResponseTemplate::new(200).set_body_json(run_body("run_1", status)))
        .mount(server)
        .await;
}

/// `GET /threads/{id}/messages` with `answer` as the newest assistant message.
pub async fn mount_list_messages(server: &MockServer, thread_id: &str, answer: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/v1/threads/{thread_id}/messages")))
        .respond_with(ResponseTemplate::new(200).set_body_json(messages_body(answer)))
        .mount(server)
        .await;
}

/// Every route of a turn that completes with `answer`.
pub async fn mount_happy_turn(server: &MockServer, thread_id: &str, answer: &str) {
    mount_create_thread(server, thread_id, Duration::ZERO).await;
    mount_add_message(server, thread_id).await;
    mount_create_run(server, thread_id, "queued").await;
    mount_retrieve_run(server, thread_id, "completed").await;
    mount_list_messages(server, thread_id, answer).await;
}

/// Requests received for `method` on `path`.
pub async fn count_requests(server: &MockServer, http_method: &str, request_path: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.method.as_str() == http_method && r.url.path() == request_path)
        .count()
}
