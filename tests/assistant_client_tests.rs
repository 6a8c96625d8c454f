//! Assistants backend client against a wiremock server

mod mock_providers;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use mock_providers::assistants_mock::*;
use voice_bridge::core::assistant::{AssistantsClient, BackendConfig, ConversationBackend};
use voice_bridge::core::session::{CallState, SessionRegistry};

const THREAD: &str = "thread_abc";
const RUNS_PATH: &str = "/v1/threads/thread_abc/runs";
const RUN_PATH: &str = "/v1/threads/thread_abc/runs/run_1";

fn client(config: BackendConfig) -> AssistantsClient {
    AssistantsClient::new(config).unwrap()
}

#[tokio::test]
async fn test_completed_run_returns_latest_assistant_text() {
    let server = MockServer::start().await;
    mount_happy_turn(&server, THREAD, "We are open nine to five.").await;
    let backend = client(backend_config(&server));

    let result = backend.submit_turn(THREAD, "What are your hours?").await;

    assert!(result.succeeded);
    assert!(!result.used_fallback);
    assert_eq!(result.response_text, "We are open nine to five.");
    assert_eq!(count_requests(&server, "POST", RUNS_PATH).await, 1);
}

#[tokio::test]
async fn test_polls_until_run_leaves_pending_states() {
    let server = MockServer::start().await;
    mount_add_message(&server, THREAD).await;
    mount_create_run(&server, THREAD, "queued").await;
    Mock::given(method("GET"))
        .and(path(RUN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(run_body("run_1", "in_progress")))
        .up_to_n_times(3)
        .mount(&server)
        .await;
    mount_retrieve_run(&server, THREAD, "completed").await;
    mount_list_messages(&server, THREAD, "Done.").await;
    let backend = client(backend_config(&server));

    let result = backend.submit_turn(THREAD, "hello").await;

    assert!(result.succeeded);
    assert_eq!(result.response_text, "Done.");
    assert_eq!(count_requests(&server, "GET", RUN_PATH).await, 4);
}

#[tokio::test]
async fn test_terminal_run_statuses_use_fallback() {
    for status in ["failed", "expired", "cancelled", "incomplete", "requires_action"] {
        let server = MockServer::start().await;
        mount_add_message(&server, THREAD).await;
        mount_create_run(&server, THREAD, "queued").await;
        mount_retrieve_run(&server, THREAD, status).await;
        mount_list_messages(&server, THREAD, "should not be read").await;
        let config = backend_config(&server);
        let fallback = config.fallback_text.clone();
        let backend = client(config);

        let result = backend.submit_turn(THREAD, "hello").await;

        assert!(!result.succeeded, "status {status} should fail the turn");
        assert!(result.used_fallback);
        assert_eq!(result.response_text, fallback);
        assert_eq!(
            count_requests(&server, "GET", "/v1/threads/thread_abc/messages").await,
            0,
            "status {status} should not read messages"
        );
    }
}

#[tokio::test]
async fn test_empty_answer_uses_fallback() {
    let server = MockServer::start().await;
    mount_add_message(&server, THREAD).await;
    mount_create_run(&server, THREAD, "completed").await;
    mount_list_messages(&server, THREAD, "   ").await;
    let backend = client(backend_config(&server));

    let result = backend.submit_turn(THREAD, "hello").await;

    assert!(result.used_fallback);
    assert!(!result.response_text.trim().is_empty());
}

#[tokio::test]
async fn test_completed_run_without_new_message_uses_fallback() {
    let server = MockServer::start().await;
    mount_add_message(&server, THREAD).await;
    mount_create_run(&server, THREAD, "completed").await;
    // Newest first: the user message just added, then last turn's answer.
    Mock::given(method("GET"))
        .and(path("/v1/threads/thread_abc/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "object": "list",
            "data": [
                {"id": "msg_2", "role": "user", "run_id": null,
                 "content": [{"type": "text", "text": {"value": "And Sundays?"}}]},
                {"id": "msg_1", "role": "assistant", "run_id": "run_0",
                 "content": [{"type": "text", "text": {"value": "We are open nine to five."}}]}
            ]
        })))
        .mount(&server)
        .await;
    let config = backend_config(&server);
    let fallback = config.fallback_text.clone();
    let backend = client(config);

    let result = backend.submit_turn(THREAD, "And Sundays?").await;

    assert!(!result.succeeded);
    assert!(result.used_fallback);
    assert_eq!(result.response_text, fallback);
}

#[tokio::test]
async fn test_turn_timeout_uses_fallback() {
    let server = MockServer::start().await;
    mount_add_message(&server, THREAD).await;
    mount_create_run(&server, THREAD, "queued").await;
    mount_retrieve_run(&server, THREAD, "in_progress").await;
    let backend = client(BackendConfig {
        turn_timeout_ms: 150,
        max_poll_attempts: 10_000,
        ..backend_config(&server)
    });

    let started = std::time::Instant::now();
    let result = backend.submit_turn(THREAD, "hello").await;

    assert!(result.used_fallback);
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn test_poll_cap_uses_fallback() {
    let server = MockServer::start().await;
    mount_add_message(&server, THREAD).await;
    mount_create_run(&server, THREAD, "queued").await;
    mount_retrieve_run(&server, THREAD, "in_progress").await;
    let backend = client(BackendConfig {
        max_poll_attempts: 3,
        ..backend_config(&server)
    });

    let result = backend.submit_turn(THREAD, "hello").await;

    assert!(result.used_fallback);
    assert_eq!(count_requests(&server, "GET", RUN_PATH).await, 3);
}

#[tokio::test]
async fn test_server_errors_are_retried() {
    let server = MockServer::start().await;
    mount_add_message(&server, THREAD).await;
    Mock::given(method("POST"))
        .and(path(RUNS_PATH))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    mount_create_run(&server, THREAD, "completed").await;
    mount_list_messages(&server, THREAD, "Recovered.").await;
    let backend = client(backend_config(&server));

    let result = backend.submit_turn(THREAD, "hello").await;

    assert!(result.succeeded);
    assert_eq!(result.response_text, "Recovered.");
    assert_eq!(count_requests(&server, "POST", RUNS_PATH).await, 3);
}

#[tokio::test]
async fn test_retries_are_bounded() {
    let server = MockServer::start().await;
    mount_add_message(&server, THREAD).await;
    Mock::given(method("POST"))
        .and(path(RUNS_PATH))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let backend = client(backend_config(&server));

    let result = backend.submit_turn(THREAD, "hello").await;

    assert!(result.used_fallback);
    // first attempt plus max_retries
    assert_eq!(count_requests(&server, "POST", RUNS_PATH).await, 3);
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let server = MockServer::start().await;
    mount_add_message(&server, THREAD).await;
    Mock::given(method("POST"))
        .and(path(RUNS_PATH))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(json!({"error": {"message": "No assistant found"}})),
        )
        .mount(&server)
        .await;
    let backend = client(backend_config(&server));

    let result = backend.submit_turn(THREAD, "hello").await;

    assert!(result.used_fallback);
    assert_eq!(count_requests(&server, "POST", RUNS_PATH).await, 1);
}

#[tokio::test]
async fn test_add_message_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/threads/thread_abc/messages"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;
    let backend = client(backend_config(&server));

    let result = backend.submit_turn(THREAD, "hello").await;

    assert!(result.used_fallback);
    assert_eq!(
        count_requests(&server, "POST", "/v1/threads/thread_abc/messages").await,
        1
    );
    assert_eq!(count_requests(&server, "POST", RUNS_PATH).await, 0);
}

#[tokio::test]
async fn test_ensure_thread_creates_exactly_once() {
    let server = MockServer::start().await;
    mount_create_thread(&server, THREAD, Duration::from_millis(100)).await;
    let backend = Arc::new(client(backend_config(&server)));
    let registry = SessionRegistry::new();
    let session = registry.create("CA-1", "MZ-1").unwrap();

    let (a, b, c) = tokio::join!(
        backend.ensure_thread(&session),
        backend.ensure_thread(&session),
        backend.ensure_thread(&session),
    );

    assert_eq!(a.unwrap(), THREAD);
    assert_eq!(b.unwrap(), THREAD);
    assert_eq!(c.unwrap(), THREAD);
    assert_eq!(backend.ensure_thread(&session).await.unwrap(), THREAD);
    assert_eq!(count_requests(&server, "POST", "/v1/threads").await, 1);
    assert_eq!(session.conversation_thread_id().as_deref(), Some(THREAD));
    assert_eq!(backend.cached_threads(), 1);
}

#[tokio::test]
async fn test_release_forgets_thread() {
    let server = MockServer::start().await;
    mount_create_thread(&server, THREAD, Duration::ZERO).await;
    let backend = client(backend_config(&server));
    let registry = SessionRegistry::new();

    let first = registry.create("CA-1", "MZ-1").unwrap();
    backend.ensure_thread(&first).await.unwrap();
    backend.release("CA-1");
    assert_eq!(backend.cached_threads(), 0);

    registry.remove("CA-1");
    let second = registry.create("CA-1", "MZ-2").unwrap();
    backend.ensure_thread(&second).await.unwrap();
    assert_eq!(count_requests(&server, "POST", "/v1/threads").await, 2);
}

#[tokio::test]
async fn test_ensure_thread_failure_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/threads"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    let backend = client(backend_config(&server));
    let registry = SessionRegistry::new();
    let session = registry.create("CA-1", "MZ-1").unwrap();
    session.transition(CallState::Active).unwrap();

    assert!(backend.ensure_thread(&session).await.is_err());
    assert!(session.conversation_thread_id().is_none());
}
