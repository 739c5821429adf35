//! End-to-end turn behavior: breakers, retry timing and provider fallback

use mentora_core::{
    AgentProfile, CircuitBreakerConfig, CircuitState, ConversationStore, Error, FailureReason,
    HealthRegistry, MemoryStore, OrchestratorConfig, ResponseStyle, RetryConfig, TurnInput,
    TurnOrchestrator,
};
use mentora_llm::{LlmProvider, MessageRole, ProviderErrorKind, ScriptedProvider};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

struct Harness {
    orchestrator: TurnOrchestrator,
    store: Arc<MemoryStore>,
    health: Arc<HealthRegistry>,
}

fn harness(priority: &[&str], providers: &[Arc<ScriptedProvider>]) -> Harness {
    harness_with(
        OrchestratorConfig::new()
            .with_priority(priority.iter().copied())
            .with_attempt_timeout(Duration::from_secs(5)),
        providers,
    )
}

fn harness_with(config: OrchestratorConfig, providers: &[Arc<ScriptedProvider>]) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let health = Arc::new(HealthRegistry::new(CircuitBreakerConfig::default()));
    let mut orchestrator = TurnOrchestrator::new(store.clone(), Arc::clone(&health), config);
    for provider in providers {
        orchestrator.register(Arc::clone(provider) as Arc<dyn LlmProvider>);
    }
    Harness {
        orchestrator,
        store,
        health,
    }
}

fn open_breaker(health: &HealthRegistry, provider: &str) {
    let breaker = health.breaker(provider);
    for _ in 0..5 {
        breaker.try_acquire().unwrap().failure();
    }
    assert_eq!(breaker.state(), CircuitState::Open);
}

#[tokio::test(start_paused = true)]
async fn test_five_failures_open_the_circuit() {
    let a = Arc::new(ScriptedProvider::failing("a", ProviderErrorKind::Server));
    let h = harness(&["a"], &[a.clone()]);

    for _ in 0..5 {
        let result = h.orchestrator.submit_turn(TurnInput::new("student", "hi")).await;
        assert!(matches!(result, Err(Error::AllProvidersUnavailable { .. })));
    }
    assert_eq!(a.call_count(), 5);
    assert_eq!(h.health.breaker("a").state(), CircuitState::Open);

    let result = h.orchestrator.submit_turn(TurnInput::new("student", "hi")).await;
    match result {
        Err(Error::AllProvidersUnavailable { failures, .. }) => {
            assert!(matches!(failures[0].reason, FailureReason::CircuitOpen { .. }));
        }
        other => panic!("expected AllProvidersUnavailable, got {other:?}"),
    }
    // Rejected without touching the adapter
    assert_eq!(a.call_count(), 5);

    let metrics = h.orchestrator.metrics();
    assert_eq!(metrics[0].failures, 5);
    assert_eq!(metrics[0].breaker_rejections, 1);
}

#[tokio::test(start_paused = true)]
async fn test_single_probe_after_reset_timeout() {
    let health = HealthRegistry::new(CircuitBreakerConfig::default());
    open_breaker(&health, "a");
    let breaker = health.breaker("a");

    tokio::time::advance(Duration::from_secs(29)).await;
    assert!(breaker.try_acquire().is_err());

    tokio::time::advance(Duration::from_secs(1)).await;
    let probe = breaker.try_acquire().unwrap();
    assert!(probe.is_probe());
    assert_eq!(breaker.state(), CircuitState::HalfOpen);

    // Concurrent callers are refused while the probe is out
    assert!(breaker.try_acquire().is_err());

    probe.success();
    assert_eq!(breaker.state(), CircuitState::Closed);
    assert_eq!(breaker.failure_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_probe_turn_closes_circuit() {
    let a = Arc::new(ScriptedProvider::new("a"));
    let h = harness(&["a"], &[a.clone()]);
    open_breaker(&h.health, "a");

    tokio::time::advance(Duration::from_secs(30)).await;
    let reply = h
        .orchestrator
        .submit_turn(TurnInput::new("student", "hi"))
        .await
        .unwrap();

    assert_eq!(reply.provider, "a");
    assert_eq!(a.call_count(), 1);
    assert_eq!(h.health.breaker("a").state(), CircuitState::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_retriable_failure_makes_three_attempts() {
    let a = Arc::new(ScriptedProvider::failing("a", ProviderErrorKind::Timeout));
    let h = harness(&["a"], &[a.clone()]);

    let start = Instant::now();
    let result = h.orchestrator.submit_turn(TurnInput::new("student", "hi")).await;
    let elapsed = start.elapsed();

    assert_eq!(a.call_count(), 3);
    // 1s then 2s of backoff
    assert!(elapsed >= Duration::from_secs(3), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_millis(3100), "elapsed {elapsed:?}");

    match result {
        Err(Error::AllProvidersUnavailable { failures, .. }) => match &failures[0].reason {
            FailureReason::Provider { error, attempts } => {
                assert_eq!(*attempts, 3);
                assert_eq!(error.kind, ProviderErrorKind::Timeout);
                assert!(error.retriable);
            }
            other => panic!("unexpected reason {other:?}"),
        },
        other => panic!("expected AllProvidersUnavailable, got {other:?}"),
    }
    // One exhausted retry sequence is one breaker failure
    assert_eq!(h.health.breaker("a").failure_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_non_retriable_failure_makes_one_attempt() {
    let a = Arc::new(ScriptedProvider::failing("a", ProviderErrorKind::Auth));
    let h = harness(&["a"], &[a.clone()]);

    let start = Instant::now();
    let result = h.orchestrator.submit_turn(TurnInput::new("student", "hi")).await;

    assert!(result.is_err());
    assert_eq!(a.call_count(), 1);
    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_open_provider_is_skipped_for_fallback() {
    let a = Arc::new(ScriptedProvider::new("a"));
    let b = Arc::new(ScriptedProvider::new("b"));
    b.push_reply("answer from b");
    let h = harness(&["a", "b"], &[a.clone(), b.clone()]);
    open_breaker(&h.health, "a");

    let reply = h
        .orchestrator
        .submit_turn(TurnInput::new("student", "hi"))
        .await
        .unwrap();

    assert_eq!(reply.provider, "b");
    assert_eq!(reply.text(), "answer from b");
    assert!(reply.used_fallback());
    assert_eq!(a.call_count(), 0);

    let conversation = h
        .store
        .get_conversation(reply.conversation_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(conversation.provider.as_deref(), Some("b"));

    let messages = h.store.list_messages(reply.conversation_id).await.unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].provider.as_deref(), Some("b"));
}

#[tokio::test(start_paused = true)]
async fn test_all_providers_failing_writes_no_assistant_message() {
    let a = Arc::new(ScriptedProvider::failing("a", ProviderErrorKind::RateLimit));
    let b = Arc::new(ScriptedProvider::failing("b", ProviderErrorKind::InvalidRequest));
    let c = Arc::new(ScriptedProvider::new("c"));
    let h = harness(&["a", "b", "c"], &[a, b, c.clone()]);
    open_breaker(&h.health, "c");

    let result = h
        .orchestrator
        .submit_turn(TurnInput::new("student", "Explain osmosis."))
        .await;

    let (conversation_id, failures) = match result {
        Err(Error::AllProvidersUnavailable {
            conversation_id,
            failures,
        }) => (conversation_id, failures),
        other => panic!("expected AllProvidersUnavailable, got {other:?}"),
    };
    let providers: Vec<&str> = failures.iter().map(|f| f.provider.as_str()).collect();
    assert_eq!(providers, vec!["a", "b", "c"]);
    assert_eq!(c.call_count(), 0);

    assert_eq!(h.store.message_count().await, 0);
    let markers = h.store.list_failures(conversation_id).await.unwrap();
    assert_eq!(markers.len(), 1);
    assert_eq!(markers[0].user_message, "Explain osmosis.");
    assert_eq!(markers[0].reasons.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_no_registered_providers() {
    let h = harness(&["gemini"], &[]);
    let result = h.orchestrator.submit_turn(TurnInput::new("student", "hi")).await;
    assert!(matches!(
        result,
        Err(Error::AllProvidersUnavailable { ref failures, .. }) if failures.is_empty()
    ));
}

#[tokio::test(start_paused = true)]
async fn test_last_successful_provider_is_tried_first() {
    let a = Arc::new(ScriptedProvider::new("a"));
    a.push_error(ProviderErrorKind::Server);
    let b = Arc::new(ScriptedProvider::new("b"));
    let h = harness(&["a", "b"], &[a.clone(), b.clone()]);

    let first = h
        .orchestrator
        .submit_turn(TurnInput::new("student", "first"))
        .await
        .unwrap();
    assert_eq!(first.provider, "b");

    let second = h
        .orchestrator
        .submit_turn(TurnInput::new("student", "second").with_conversation(first.conversation_id))
        .await
        .unwrap();
    assert_eq!(second.provider, "b");
    assert_eq!(a.call_count(), 1);

    // History from the first turn accompanies the second
    let request = b.last_request().unwrap();
    let history: Vec<&str> = request.history.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(history, vec!["first", "mock response"]);
}

#[tokio::test(start_paused = true)]
async fn test_history_window_counts_whole_turns() {
    let a = Arc::new(ScriptedProvider::new("a"));
    let h = harness_with(
        OrchestratorConfig::new()
            .with_priority(["a"])
            .with_history_window(3),
        &[a.clone()],
    );

    let mut conversation_id = None;
    for text in ["one", "two", "three", "four"] {
        let mut input = TurnInput::new("student", text);
        if let Some(id) = conversation_id {
            input = input.with_conversation(id);
        }
        let reply = h.orchestrator.submit_turn(input).await.unwrap();
        conversation_id = Some(reply.conversation_id);

        let request = a.last_request().unwrap();
        if let Some(first) = request.history.first() {
            assert_eq!(first.role, MessageRole::User, "history opened with {first:?}");
        }
    }

    // Fourth turn carries the three previous turns in full
    let request = a.last_request().unwrap();
    let history: Vec<&str> = request.history.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(
        history,
        vec!["one", "mock response", "two", "mock response", "three", "mock response"]
    );
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_backoff() {
    let a = Arc::new(ScriptedProvider::failing("a", ProviderErrorKind::Network));
    let h = harness(&["a"], &[a.clone()]);
    let cancel = CancellationToken::new();

    let token = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        token.cancel();
    });

    let result = h
        .orchestrator
        .submit_turn_with_cancel(TurnInput::new("student", "hi"), &cancel)
        .await;

    assert!(matches!(result, Err(Error::Cancelled)));
    assert_eq!(a.call_count(), 1);
    assert_eq!(h.health.breaker("a").failure_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_tutor_turn_survives_two_timeouts() {
    let a = Arc::new(ScriptedProvider::new("A"));
    a.push_stall(Duration::from_secs(60))
        .push_stall(Duration::from_secs(60))
        .push_reply("Photosynthesis turns light into chemical energy.");
    let b = Arc::new(ScriptedProvider::new("B"));

    let h = harness_with(
        OrchestratorConfig::new()
            .with_priority(["A", "B"])
            .with_attempt_timeout(Duration::from_secs(5))
            .with_retry(RetryConfig::default()),
        &[a.clone(), b.clone()],
    );

    let persona = "You are a patient biology tutor who loves plants.";
    h.store
        .upsert_profile(
            &AgentProfile::default_for("student")
                .with_persona(persona)
                .with_style(ResponseStyle::Concise)
                .with_language("en"),
        )
        .await
        .unwrap();

    let start = Instant::now();
    let reply = h
        .orchestrator
        .submit_turn(TurnInput::new("student", "Explain photosynthesis."))
        .await
        .unwrap();

    assert_eq!(reply.provider, "A");
    assert_eq!(reply.attempts, 3);
    assert_eq!(reply.message.provider.as_deref(), Some("A"));
    assert_eq!(reply.text(), "Photosynthesis turns light into chemical energy.");
    assert!(!reply.used_fallback());
    assert_eq!(b.call_count(), 0);

    // Two 5s timeouts plus 1s and 2s of backoff
    assert!(start.elapsed() >= Duration::from_secs(13));

    let breaker = h.health.breaker("A");
    assert_eq!(breaker.state(), CircuitState::Closed);
    assert_eq!(breaker.failure_count(), 0);

    let request = a.last_request().unwrap();
    assert!(request.system_prompt.contains(persona));
    assert!(request
        .system_prompt
        .contains(ResponseStyle::Concise.instruction()));
    assert_eq!(request.user_message, "Explain photosynthesis.");

    let messages = h.store.list_messages(reply.conversation_id).await.unwrap();
    assert_eq!(messages.len(), 2);
}

#[tokio::test]
async fn test_profile_created_on_first_turn() {
    let h = harness(&["a"], &[Arc::new(ScriptedProvider::new("a"))]);
    assert!(h.store.get_profile("newcomer").await.unwrap().is_none());

    h.orchestrator
        .submit_turn(TurnInput::new("newcomer", "hello"))
        .await
        .unwrap();

    let profile = h.store.get_profile("newcomer").await.unwrap().unwrap();
    assert_eq!(profile.agent_name, "AI Tutor");
    assert_eq!(profile.style, ResponseStyle::Conversational);
}
