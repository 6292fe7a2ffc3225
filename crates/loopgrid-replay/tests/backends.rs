//! Live backends against a mock HTTP server.

use std::sync::Arc;
use std::time::Duration;

use loopgrid_core::{ExecutionMode, ExecutionStatus, HashAlgorithm, ProviderConfig, ReplayConfig};
use loopgrid_ledger::{DecisionDraft, Ledger, MemoryLedgerStore};
use loopgrid_replay::{
    AnthropicBackend, BackendError, BackendRegistry, ExecutionBackend, OpenAiBackend,
    ReplayEngine, ReplayExecutor,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn openai_chat_completion() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "gpt-4",
            "messages": [
                {"role": "system", "content": "Be brief."},
                {"role": "user", "content": "I was charged twice"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "chatcmpl-1",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "Refund issued."}}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let backend = OpenAiBackend::new("sk-test", Some(&server.uri())).unwrap();
    let out = backend
        .call(
            "",
            "Be brief.",
            &json!({"message": "I was charged twice"}),
            Duration::from_secs(5),
        )
        .await
        .unwrap();

    assert_eq!(out.output, json!({"response": "Refund issued."}));
    assert_eq!(out.tokens, 15);
}

#[tokio::test]
async fn anthropic_messages() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "sk-ant-test"))
        .and(header("anthropic-version", "2023-06-01"))
        .and(body_partial_json(json!({
            "model": "claude-sonnet-4-20250514",
            "max_tokens": 1024,
            "system": "You are a helpful assistant."
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [{"type": "text", "text": "Happy to help."}],
            "usage": {"input_tokens": 20, "output_tokens": 5}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let backend = AnthropicBackend::new("sk-ant-test", Some(&server.uri())).unwrap();
    let out = backend
        .call("", "", &json!({"ticket": 7}), Duration::from_secs(5))
        .await
        .unwrap();

    assert_eq!(out.output, json!({"response": "Happy to help."}));
    assert_eq!(out.tokens, 25);
}

#[tokio::test]
async fn provider_error_status_is_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
        .mount(&server)
        .await;

    let backend = OpenAiBackend::new("sk-bad", Some(&server.uri())).unwrap();
    let err = backend
        .call("gpt-4", "", &json!({"message": "hi"}), Duration::from_secs(5))
        .await
        .unwrap_err();

    match err {
        BackendError::Api { status, body } => {
            assert_eq!(status, 401);
            assert_eq!(body, "invalid api key");
        }
        other => panic!("unexpected error: {other}"),
    }
}

fn engine_for(server_uri: &str, timeout: Duration) -> ReplayEngine {
    let config = ReplayConfig {
        timeout_secs: timeout.as_secs(),
        anthropic: ProviderConfig {
            api_key: Some("sk-ant-test".into()),
            base_url: Some(server_uri.to_string()),
        },
        openai: ProviderConfig::default(),
    };
    let registry = BackendRegistry::from_config(&config).unwrap();
    let ledger = Arc::new(Ledger::new(
        Arc::new(MemoryLedgerStore::new()),
        HashAlgorithm::Sha256,
    ));
    ReplayEngine::new(ledger, ReplayExecutor::new(registry, timeout))
}

fn claude_draft() -> DecisionDraft {
    DecisionDraft::new("support-agent", "customer_support_reply")
        .with_input(json!({"message": "I was charged twice"}))
        .with_model(json!({"provider": "claude", "name": "claude-3-haiku"}))
        .with_output(json!({"response": "Your account looks fine."}))
}

#[tokio::test]
async fn live_replay_through_engine() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(body_partial_json(json!({"model": "claude-3-haiku"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [{"type": "text", "text": "Refund on its way."}],
            "usage": {"input_tokens": 10, "output_tokens": 4}
        })))
        .mount(&server)
        .await;

    let engine = engine_for(&server.uri(), Duration::from_secs(5));
    let decision = engine.ledger().record(claude_draft()).unwrap();

    let replay = engine.create_replay(&decision.id, None, None).await.unwrap();
    assert_eq!(replay.execution_mode, ExecutionMode::Live);
    assert_eq!(replay.provider, "anthropic");
    assert_eq!(replay.tokens, 14);
    assert!(replay.output_changed);
    assert_eq!(
        replay.diff_summary.as_deref(),
        Some("Output changed after replay (live execution)")
    );
}

#[tokio::test]
async fn slow_provider_becomes_failed_replay() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_secs(3))
                .set_body_json(json!({"content": [{"type": "text", "text": "late"}]})),
        )
        .mount(&server)
        .await;

    let engine = engine_for(&server.uri(), Duration::from_millis(200));
    let decision = engine.ledger().record(claude_draft()).unwrap();

    let replay = engine.create_replay(&decision.id, None, None).await.unwrap();
    assert_eq!(replay.execution_mode, ExecutionMode::Error);
    assert_eq!(replay.execution_status, ExecutionStatus::Failed);
    assert_eq!(replay.provider, "claude");
    assert!(replay.error.is_some());
    assert_eq!(replay.replay_output, json!({"response": "Your account looks fine."}));
    assert!(!replay.output_changed);

    // Persisted despite the failure.
    assert_eq!(engine.list_replays(&decision.id).unwrap().len(), 1);
}
