//! Integration tests for Mentora
//!
//! Real HTTP adapters (against a local mock server) driven by the turn
//! orchestrator with the SQLite store:
//! - mentora-llm: Gemini and Anthropic wire formats and error mapping
//! - mentora-core: fallback, breaker bookkeeping and persistence

use mentora_core::{
    AgentProfile, CircuitBreakerConfig, CircuitState, ConversationStore, Error, FailureReason,
    HealthRegistry, OrchestratorConfig, ResponseStyle, RetryConfig, SqliteStore, TurnInput,
    TurnOrchestrator,
};
use mentora_llm::{
    AnthropicConfig, AnthropicProvider, GeminiConfig, GeminiProvider, LlmProvider,
    ProviderErrorKind,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Fixture {
    orchestrator: TurnOrchestrator,
    store: Arc<SqliteStore>,
    health: Arc<HealthRegistry>,
    _temp: TempDir,
}

async fn fixture(gemini: &MockServer, anthropic: &MockServer) -> Fixture {
    let temp = TempDir::new().unwrap();
    let store = Arc::new(SqliteStore::new(temp.path().join("mentora.db")).await.unwrap());
    let health = Arc::new(HealthRegistry::new(CircuitBreakerConfig::default()));

    let config = OrchestratorConfig::new()
        .with_priority(["gemini", "anthropic"])
        .with_attempt_timeout(Duration::from_secs(2))
        .with_retry(
            RetryConfig::new()
                .with_max_attempts(2)
                .with_initial_delay(Duration::from_millis(10)),
        );

    let gemini: Arc<dyn LlmProvider> = Arc::new(
        GeminiProvider::new(GeminiConfig::new("AIza-integration").with_base_url(gemini.uri()))
            .unwrap(),
    );
    let anthropic: Arc<dyn LlmProvider> = Arc::new(
        AnthropicProvider::new(
            AnthropicConfig::new("sk-ant-integration").with_base_url(anthropic.uri()),
        )
        .unwrap(),
    );

    let orchestrator = TurnOrchestrator::new(store.clone(), Arc::clone(&health), config)
        .with_provider(gemini)
        .with_provider(anthropic);

    Fixture {
        orchestrator,
        store,
        health,
        _temp: temp,
    }
}

fn anthropic_reply(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "id": "msg_1",
        "type": "message",
        "role": "assistant",
        "model": "claude-3-5-sonnet-20241022",
        "content": [{"type": "text", "text": text}],
        "stop_reason": "end_turn",
        "usage": {"input_tokens": 80, "output_tokens": 20}
    }))
}

#[tokio::test]
async fn test_server_error_falls_back_to_next_provider() {
    let gemini = MockServer::start().await;
    let anthropic = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .expect(1)
        .mount(&gemini)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(body_string_contains("Keep answers concise"))
        .respond_with(anthropic_reply("Light becomes sugar in the leaves."))
        .expect(1)
        .mount(&anthropic)
        .await;

    let f = fixture(&gemini, &anthropic).await;
    f.store
        .upsert_profile(&AgentProfile::default_for("student").with_style(ResponseStyle::Concise))
        .await
        .unwrap();

    let reply = f
        .orchestrator
        .submit_turn(TurnInput::new("student", "Explain photosynthesis."))
        .await
        .unwrap();

    assert_eq!(reply.provider, "anthropic");
    assert!(reply.used_fallback());
    assert!(matches!(
        &reply.skipped[0].reason,
        FailureReason::Provider { error, attempts: 1 } if error.kind == ProviderErrorKind::Server
    ));

    let conversation = f
        .store
        .get_conversation(reply.conversation_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(conversation.provider.as_deref(), Some("anthropic"));

    let messages = f.store.list_messages(reply.conversation_id).await.unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].content, "Light becomes sugar in the leaves.");
    assert_eq!(messages[1].usage.total_tokens, 100);
    assert!(messages[1].cost_usd > 0.0);

    assert_eq!(f.health.breaker("gemini").failure_count(), 1);
    assert_eq!(f.health.breaker("anthropic").state(), CircuitState::Closed);
}

#[tokio::test]
async fn test_total_failure_leaves_only_a_marker() {
    let gemini = MockServer::start().await;
    let anthropic = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {"code": 401, "message": "bad key"}
        })))
        .mount(&gemini)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "type": "error",
            "error": {"type": "rate_limit_error", "message": "slow down"}
        })))
        .mount(&anthropic)
        .await;

    let f = fixture(&gemini, &anthropic).await;
    let result = f
        .orchestrator
        .submit_turn(TurnInput::new("student", "What is osmosis?"))
        .await;

    let conversation_id = match result {
        Err(Error::AllProvidersUnavailable {
            conversation_id,
            failures,
        }) => {
            assert_eq!(failures.len(), 2);
            conversation_id
        }
        other => panic!("expected AllProvidersUnavailable, got {other:?}"),
    };

    assert!(f.store.list_messages(conversation_id).await.unwrap().is_empty());
    let markers = f.store.list_failures(conversation_id).await.unwrap();
    assert_eq!(markers.len(), 1);
    assert_eq!(markers[0].user_message, "What is osmosis?");
}

#[tokio::test]
async fn test_slow_provider_is_retried_then_skipped() {
    let gemini = MockServer::start().await;
    let anthropic = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(10)))
        .expect(2)
        .mount(&gemini)
        .await;
    Mock::given(method("POST"))
        .respond_with(anthropic_reply("Osmosis moves water across membranes."))
        .mount(&anthropic)
        .await;

    let f = fixture(&gemini, &anthropic).await;
    let reply = f
        .orchestrator
        .submit_turn(TurnInput::new("student", "What is osmosis?"))
        .await
        .unwrap();

    assert_eq!(reply.provider, "anthropic");
    match &reply.skipped[0].reason {
        FailureReason::Provider { error, attempts } => {
            assert_eq!(*attempts, 2);
            assert_eq!(error.kind, ProviderErrorKind::Timeout);
        }
        other => panic!("unexpected reason {other:?}"),
    }
}
