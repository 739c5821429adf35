//! Turn execution
//!
//! Contains `submit_turn`: load the conversation, build the persona context,
//! then try each candidate provider behind its breaker and retry policy.

use crate::error::{Error, Result};
use crate::model::{AgentProfile, Conversation, StoredMessage, TurnFailure};
use crate::utils::retry_with_backoff;
use mentora_llm::{
    CompletionRequest, CompletionResponse, LlmProvider, ProviderError, ProviderErrorKind,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::config::TurnInput;
use super::core::TurnOrchestrator;
use super::types::{AssistantReply, FailureReason, ProviderFailure};

impl TurnOrchestrator {
    /// Run one chat turn
    pub async fn submit_turn(&self, input: TurnInput) -> Result<AssistantReply> {
        self.submit_turn_with_cancel(input, &CancellationToken::new())
            .await
    }

    /// Run one chat turn; cancelling `cancel` stops before the next attempt
    #[tracing::instrument(skip(self, input, cancel), fields(user = %input.user_id))]
    pub async fn submit_turn_with_cancel(
        &self,
        input: TurnInput,
        cancel: &CancellationToken,
    ) -> Result<AssistantReply> {
        let text = input.message.trim();
        if text.is_empty() {
            return Err(Error::InvalidInput("message is empty".to_string()));
        }
        if input.user_id.trim().is_empty() {
            return Err(Error::InvalidInput("user id is empty".to_string()));
        }
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let conversation = self.load_conversation(&input).await?;
        let profile = self.load_profile(&input.user_id).await?;
        let history = self
            .store
            .recent_messages(conversation.id, self.persona.message_budget())
            .await?;
        let context = self.persona.build(Some(&profile), &history, &input.hints);

        let mut request = CompletionRequest::new(text)
            .with_system_prompt(context.system_prompt)
            .with_history(context.history);
        request.max_tokens = self.config.max_tokens;
        request.temperature = self.config.temperature;

        let candidates = self.candidates(conversation.provider.as_deref());
        info!(
            conversation_id = %conversation.id,
            candidates = ?candidates,
            history = history.len(),
            "Starting turn"
        );

        let user_message = StoredMessage::user(conversation.id, text);
        let mut failures: Vec<ProviderFailure> = Vec::new();

        for name in &candidates {
            let Some(provider) = self.providers.get(name) else {
                continue;
            };
            let counters = self.metrics.provider(name);

            let permit = match self.health.breaker(name).try_acquire() {
                Ok(permit) => permit,
                Err(open) => {
                    counters.breaker_rejections.inc();
                    debug!(provider = %name, retry_after_ms = open.retry_after.as_millis() as u64, "Skipping provider with open circuit");
                    failures.push(ProviderFailure::new(
                        name.clone(),
                        FailureReason::CircuitOpen {
                            retry_after_ms: u64::try_from(open.retry_after.as_millis())
                                .unwrap_or(u64::MAX),
                        },
                    ));
                    continue;
                }
            };

            match self.call_with_retry(provider, &request, cancel).await {
                Ok((response, attempts)) => {
                    permit.success();
                    counters.successes.inc();
                    counters.latency_ms_total.inc_by(response.latency_ms);
                    if !failures.is_empty() {
                        counters.fallbacks.inc();
                    }

                    let assistant = StoredMessage::assistant(conversation.id, name.clone(), &response);
                    self.store.append_turn(&user_message, &assistant).await?;

                    info!(
                        conversation_id = %conversation.id,
                        provider = %name,
                        model = %response.model,
                        attempts = attempts,
                        latency_ms = response.latency_ms,
                        fallback = !failures.is_empty(),
                        "Turn answered"
                    );
                    return Ok(AssistantReply {
                        conversation_id: conversation.id,
                        message: assistant,
                        provider: name.clone(),
                        attempts,
                        skipped: failures,
                    });
                }
                Err((error, attempts)) => {
                    if cancel.is_cancelled() {
                        // Unsettled permit releases any probe slot on drop
                        drop(permit);
                        info!(conversation_id = %conversation.id, provider = %name, "Turn cancelled");
                        return Err(Error::Cancelled);
                    }
                    permit.failure();
                    counters.failures.inc();
                    warn!(
                        provider = %name,
                        kind = %error.kind,
                        attempts = attempts,
                        error = %error.message,
                        "Provider failed, trying next candidate"
                    );
                    failures.push(ProviderFailure::new(
                        name.clone(),
                        FailureReason::Provider { error, attempts },
                    ));
                }
            }
        }

        warn!(
            conversation_id = %conversation.id,
            failed = failures.len(),
            "All providers unavailable"
        );
        let marker = TurnFailure::new(conversation.id, text, failures.clone());
        if let Err(e) = self.store.record_failure(&marker).await {
            warn!(error = %e, "Failed to record turn failure");
        }

        Err(Error::AllProvidersUnavailable {
            conversation_id: conversation.id,
            failures,
        })
    }

    async fn load_conversation(&self, input: &TurnInput) -> Result<Conversation> {
        let Some(id) = input.conversation_id else {
            let conversation = Conversation::new(input.user_id.clone());
            self.store.create_conversation(&conversation).await?;
            debug!(conversation_id = %conversation.id, "Conversation created");
            return Ok(conversation);
        };

        let conversation = self
            .store
            .get_conversation(id)
            .await?
            .filter(|c| c.user_id == input.user_id)
            .ok_or_else(|| Error::NotFound(format!("conversation {id}")))?;
        if conversation.is_archived() {
            return Err(Error::InvalidInput(format!(
                "conversation {id} is archived"
            )));
        }
        Ok(conversation)
    }

    async fn load_profile(&self, user_id: &str) -> Result<AgentProfile> {
        if let Some(profile) = self.store.get_profile(user_id).await? {
            return Ok(profile);
        }
        let profile = AgentProfile::default_for(user_id);
        self.store.upsert_profile(&profile).await?;
        debug!(user_id = %user_id, "Default agent profile created");
        Ok(profile)
    }

    /// Call one provider under the retry policy, time-boxing each attempt
    async fn call_with_retry(
        &self,
        provider: &Arc<dyn LlmProvider>,
        request: &CompletionRequest,
        cancel: &CancellationToken,
    ) -> std::result::Result<(CompletionResponse, u32), (ProviderError, u32)> {
        let timeout = self.config.attempt_timeout;
        let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        let counters = self.metrics.provider(provider.name());
        let mut last_attempt = 0;

        let result = retry_with_backoff(
            &self.config.retry,
            cancel,
            |attempt| {
                last_attempt = attempt;
                let provider = Arc::clone(provider);
                let request = request.clone();
                let counters = counters.clone();
                let cancel = cancel.clone();
                async move {
                    counters.attempts.inc();
                    let name = provider.name().to_string();
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => Err(ProviderError::new(
                            name,
                            ProviderErrorKind::Network,
                            "call abandoned: turn cancelled",
                        )
                        .with_retriable(false)),
                        result = tokio::time::timeout(timeout, provider.complete(request)) => {
                            match result {
                                Ok(result) => result,
                                Err(_) => Err(ProviderError::timeout(name, timeout_ms)),
                            }
                        }
                    }
                }
            },
            |e: &ProviderError| e.retriable,
        )
        .await;

        match result {
            Ok(response) => Ok((response, last_attempt)),
            Err(e) => Err((e.last_error, e.attempts)),
        }
    }
}
