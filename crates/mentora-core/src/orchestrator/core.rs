//! Orchestrator core structure
//!
//! Contains the `TurnOrchestrator` struct, its builder methods and the
//! read-only views used by the CLI.

use crate::health::HealthRegistry;
use crate::persona::PersonaBuilder;
use crate::store::ConversationStore;
use crate::utils::{BreakerSnapshot, ProviderMetrics, ProviderMetricsSnapshot};
use mentora_llm::LlmProvider;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, warn};

use super::config::OrchestratorConfig;

/// Status of one registered provider
#[derive(Debug, Clone, Serialize)]
pub struct ProviderStatus {
    /// Provider id
    pub provider: String,
    /// Model used when a request does not name one
    pub default_model: String,
    /// Position in the configured priority, if listed
    pub priority: Option<usize>,
    /// Breaker state
    pub breaker: BreakerSnapshot,
    /// Call counters
    pub metrics: ProviderMetricsSnapshot,
}

/// Routes chat turns across providers
pub struct TurnOrchestrator {
    pub(crate) providers: HashMap<String, Arc<dyn LlmProvider>>,
    pub(crate) health: Arc<HealthRegistry>,
    pub(crate) store: Arc<dyn ConversationStore>,
    pub(crate) metrics: Arc<ProviderMetrics>,
    pub(crate) persona: PersonaBuilder,
    pub(crate) config: OrchestratorConfig,
}

impl TurnOrchestrator {
    /// Create an orchestrator with no providers registered
    #[must_use]
    pub fn new(
        store: Arc<dyn ConversationStore>,
        health: Arc<HealthRegistry>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            providers: HashMap::new(),
            health,
            store,
            metrics: Arc::new(ProviderMetrics::new()),
            persona: PersonaBuilder::new(config.history_window),
            config,
        }
    }

    /// Register a provider under its own name
    #[must_use]
    pub fn with_provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.register(provider);
        self
    }

    /// Share a metrics registry with other components
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<ProviderMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Register a provider, replacing any previous one with the same name
    pub fn register(&mut self, provider: Arc<dyn LlmProvider>) {
        let name = provider.name().to_string();
        if !self.config.priority.contains(&name) {
            warn!(provider = %name, "Registered provider is not in the priority list and will not be used");
        }
        info!(provider = %name, model = provider.default_model(), "Provider registered");
        self.providers.insert(name, provider);
    }

    /// Names of registered providers, in priority order
    #[must_use]
    pub fn provider_names(&self) -> Vec<String> {
        self.candidates(None)
    }

    /// Candidate order for a turn
    ///
    /// Configured priority filtered to registered providers. With
    /// `prefer_last_successful`, the conversation's last provider moves to
    /// the front when it is a candidate.
    #[must_use]
    pub fn candidates(&self, last_successful: Option<&str>) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut order: Vec<String> = self
            .config
            .priority
            .iter()
            .filter(|name| self.providers.contains_key(name.as_str()))
            .filter(|name| seen.insert(name.as_str()))
            .cloned()
            .collect();

        if self.config.prefer_last_successful {
            if let Some(last) = last_successful {
                if let Some(pos) = order.iter().position(|name| name == last) {
                    let preferred = order.remove(pos);
                    order.insert(0, preferred);
                }
            }
        }
        order
    }

    /// Get the health registry
    #[must_use]
    pub fn health(&self) -> &Arc<HealthRegistry> {
        &self.health
    }

    /// Get the conversation store
    #[must_use]
    pub fn store(&self) -> &Arc<dyn ConversationStore> {
        &self.store
    }

    /// Get the configuration
    #[must_use]
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Per-provider counters
    #[must_use]
    pub fn metrics(&self) -> Vec<ProviderMetricsSnapshot> {
        self.metrics.snapshot()
    }

    /// Status of every registered provider, in priority order
    ///
    /// Providers not in the priority list come last, sorted by name.
    #[must_use]
    pub fn providers_snapshot(&self) -> Vec<ProviderStatus> {
        let mut names: Vec<&String> = self.providers.keys().collect();
        names.sort_by_key(|name| {
            (
                self.config
                    .priority
                    .iter()
                    .position(|p| p == *name)
                    .unwrap_or(usize::MAX),
                (*name).clone(),
            )
        });

        let metrics = self.metrics.snapshot();
        names
            .into_iter()
            .filter_map(|name| {
                let provider = self.providers.get(name)?;
                let metrics = metrics
                    .iter()
                    .find(|m| &m.provider == name)
                    .cloned()
                    .unwrap_or_else(|| ProviderMetricsSnapshot {
                        provider: name.clone(),
                        ..Default::default()
                    });
                Some(ProviderStatus {
                    provider: name.clone(),
                    default_model: provider.default_model().to_string(),
                    priority: self.config.priority.iter().position(|p| p == name),
                    breaker: self.health.breaker(name).snapshot(),
                    metrics,
                })
            })
            .collect()
    }
}
