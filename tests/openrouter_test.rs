use std::sync::Arc;

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use devteam::backend::openrouter::OpenRouterBackend;
use devteam::backend::{Backend, CompletionRequest, Credits};
use devteam::config::{Settings, Timings};
use devteam::dispatch::{DispatchContext, DispatchRequest, Dispatcher};
use devteam::error::BackendError;
use devteam::label::split_blocks;
use devteam::team::{Mode, TeamId};
use devteam::usage::UsageTracker;

fn settings(server: &MockServer) -> Settings {
    Settings {
        api_key: Some("sk-or-test-key".to_string()),
        base_url: server.uri(),
        timings: Timings::immediate(),
        ..Settings::default()
    }
}

fn completion(text: &str) -> serde_json::Value {
    json!({
        "id": "gen-1",
        "choices": [{ "message": { "role": "assistant", "content": text } }]
    })
}

#[tokio::test]
async fn sends_auth_and_attribution_headers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer sk-or-test-key"))
        .and(header("HTTP-Referer", "https://devteam.app"))
        .and(header("X-Title", "DEVTEAM"))
        .and(body_partial_json(json!({ "model": "x-ai/grok-4" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("hello")))
        .expect(1)
        .mount(&server)
        .await;

    let backend = OpenRouterBackend::new(&settings(&server)).unwrap();
    let out = backend
        .complete(&CompletionRequest::new("x-ai/grok-4", "be brief", "hi"))
        .await
        .unwrap();
    assert_eq!(out, "hello");
}

#[tokio::test]
async fn messages_carry_system_then_user() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({
            "messages": [
                { "role": "system", "content": "be brief" },
                { "role": "user", "content": "payload" }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("ok")))
        .expect(1)
        .mount(&server)
        .await;

    let backend = OpenRouterBackend::new(&settings(&server)).unwrap();
    backend
        .complete(&CompletionRequest::new("m/x", "be brief", "payload"))
        .await
        .unwrap();
}

#[tokio::test]
async fn error_status_uses_upstream_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(402).set_body_json(json!({
            "error": { "message": "Insufficient credits", "code": 402 }
        })))
        .mount(&server)
        .await;

    let backend = OpenRouterBackend::new(&settings(&server)).unwrap();
    let err = backend
        .complete(&CompletionRequest::new("anthropic/claude-opus-4", "s", "p"))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        BackendError::Http {
            model: "anthropic/claude-opus-4".to_string(),
            status: 402,
            message: "Insufficient credits".to_string(),
        }
    );
}

#[tokio::test]
async fn error_status_without_body_uses_reason() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let backend = OpenRouterBackend::new(&settings(&server)).unwrap();
    let err = backend
        .complete(&CompletionRequest::new("m/x", "s", "p"))
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "API call failed for m/x (503): Service Unavailable"
    );
}

#[tokio::test]
async fn credits_are_parsed_and_cached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/credits"))
        .and(header("authorization", "Bearer sk-or-test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "total_credits": 25.0, "total_usage": 3.5 }
        })))
        .mount(&server)
        .await;

    let backend = OpenRouterBackend::new(&settings(&server)).unwrap();
    assert!(backend.check().await);

    let usage = UsageTracker::new();
    assert!(usage.refresh(&backend).await);
    assert_eq!(
        usage.snapshot(),
        Credits {
            used: 3.5,
            total: 25.0
        }
    );
}

#[tokio::test]
async fn rejected_key_fails_check() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/credits"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": { "message": "No auth credentials found" }
        })))
        .mount(&server)
        .await;

    let backend = OpenRouterBackend::new(&settings(&server)).unwrap();
    assert!(!backend.check().await);
}

#[tokio::test]
async fn dispatch_against_http_mixes_success_and_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({ "model": "anthropic/claude-opus-4" })))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": { "message": "provider error" }
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({ "model": "x-ai/grok-4" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("grok answer")))
        .mount(&server)
        .await;

    let settings = settings(&server);
    let backend = Arc::new(OpenRouterBackend::new(&settings).unwrap());
    let d = Dispatcher::new(backend, &settings);
    let resp = d
        .dispatch(
            &DispatchContext::new(),
            &DispatchRequest::new("compare", TeamId::Two, Mode::Pro),
        )
        .await
        .unwrap();

    let blocks = split_blocks(&resp.response);
    assert_eq!(blocks.len(), 2);
    assert_eq!(blocks[0].label, "CLAUDE-OPUS-4");
    assert_eq!(
        blocks[0].body,
        "Error: API call failed for anthropic/claude-opus-4 (500): provider error"
    );
    assert_eq!(blocks[1].label, "GROK-4");
    assert_eq!(blocks[1].body, "grok answer");
}
