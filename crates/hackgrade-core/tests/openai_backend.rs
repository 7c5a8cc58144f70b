//! Integration tests for OpenAiBackend and the retrying caller.
//!
//! Uses wiremock for HTTP mocking.

use std::sync::Arc;
use std::time::Duration;

use hackgrade_core::{
    BackendCaller, ConcurrencyLimiter, GradeError, ModelBackend, OpenAiBackend, RetryPolicy,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn backend(mock_server: &MockServer) -> OpenAiBackend {
    OpenAiBackend::new(&mock_server.uri(), "test-key", Duration::from_secs(5))
        .expect("failed to create backend")
}

fn completion(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-1",
        "choices": [{"index": 0, "message": {"role": "assistant", "content": content}}]
    })
}

#[tokio::test]
async fn test_complete_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({"model": "gpt-test", "temperature": 0.0})))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("{\"correctness\": 4}")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let text = backend(&mock_server)
        .complete("grade this", "gpt-test", 0.0)
        .await
        .expect("completion failed");
    assert_eq!(text, "{\"correctness\": 4}");
}

#[tokio::test]
async fn test_trailing_slash_in_base_url() {
    let mock_server = MockServer::start().await;
    let b = OpenAiBackend::new(
        &format!("{}/", mock_server.uri()),
        "k",
        Duration::from_secs(5),
    )
    .unwrap();
    assert_eq!(b.base_url(), mock_server.uri());
}

#[tokio::test]
async fn test_server_error_is_reported_with_status() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .mount(&mock_server)
        .await;

    let err = backend(&mock_server)
        .complete("p", "gpt-test", 0.0)
        .await
        .unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("500"), "got: {msg}");
    assert!(msg.contains("upstream exploded"), "got: {msg}");
}

#[tokio::test]
async fn test_missing_content_is_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(&mock_server)
        .await;

    let err = backend(&mock_server)
        .complete("p", "gpt-test", 0.0)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("missing content"));
}

fn fast_retry(max_retries: u32) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        base_delay_ms: 1,
        max_jitter: 0.25,
    }
}

#[tokio::test]
async fn test_caller_retries_rate_limit() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({"temperature": 0.0})))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .up_to_n_times(2)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({"temperature": 0.0})))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("ok")))
        .mount(&mock_server)
        .await;

    let caller = BackendCaller::new(
        Arc::new(backend(&mock_server)),
        ConcurrencyLimiter::new(2).unwrap(),
        fast_retry(4),
        Duration::from_secs(5),
    );
    assert_eq!(caller.call("p", "gpt-test").await.unwrap(), "ok");

    let received = mock_server.received_requests().await.unwrap();
    assert_eq!(received.len(), 3);
}

#[tokio::test]
async fn test_caller_gives_up_after_budget() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .expect(3)
        .mount(&mock_server)
        .await;

    let caller = BackendCaller::new(
        Arc::new(backend(&mock_server)),
        ConcurrencyLimiter::new(1).unwrap(),
        fast_retry(2),
        Duration::from_secs(5),
    );
    let err = caller.call("p", "gpt-test").await.unwrap_err();
    match err {
        GradeError::Backend {
            attempts, message, ..
        } => {
            assert_eq!(attempts, 3);
            assert!(message.contains("503"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
