//! Provider health registry
//!
//! Owns one [`CircuitBreaker`] per provider id. Breakers are created lazily
//! on first use and live as long as the registry; nothing is persisted.

use crate::utils::{BreakerSnapshot, CircuitBreaker, CircuitBreakerConfig};
use dashmap::DashMap;
use std::sync::Arc;

/// Per-provider breaker registry
#[derive(Debug, Default)]
pub struct HealthRegistry {
    config: CircuitBreakerConfig,
    breakers: DashMap<String, Arc<CircuitBreaker>>,
}

impl HealthRegistry {
    /// Create a registry whose breakers share one configuration
    #[must_use]
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            breakers: DashMap::new(),
        }
    }

    /// Get (or create) the breaker for a provider
    #[must_use]
    pub fn breaker(&self, provider: &str) -> Arc<CircuitBreaker> {
        if let Some(breaker) = self.breakers.get(provider) {
            return Arc::clone(&breaker);
        }
        Arc::clone(
            &self
                .breakers
                .entry(provider.to_string())
                .or_insert_with(|| Arc::new(CircuitBreaker::new(provider, self.config.clone()))),
        )
    }

    /// Reset one provider's breaker to closed; returns false if unknown
    pub fn reset(&self, provider: &str) -> bool {
        match self.breakers.get(provider) {
            Some(breaker) => {
                breaker.reset();
                true
            }
            None => false,
        }
    }

    /// Snapshot of every known breaker, sorted by provider id
    #[must_use]
    pub fn snapshot(&self) -> Vec<BreakerSnapshot> {
        let mut snapshot: Vec<_> = self.breakers.iter().map(|b| b.snapshot()).collect();
        snapshot.sort_by(|a, b| a.provider.cmp(&b.provider));
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::CircuitState;
    use std::time::Duration;

    #[tokio::test]
    async fn test_breakers_are_created_once_per_provider() {
        let registry = HealthRegistry::new(CircuitBreakerConfig::default());
        let a = registry.breaker("gemini");
        let b = registry.breaker("gemini");
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &registry.breaker("grok")));
    }

    #[tokio::test]
    async fn test_breakers_are_isolated() {
        let registry = HealthRegistry::new(
            CircuitBreakerConfig::new()
                .with_failure_threshold(1)
                .with_reset_timeout(Duration::from_secs(30)),
        );
        registry.breaker("gemini").try_acquire().unwrap().failure();

        assert_eq!(registry.breaker("gemini").state(), CircuitState::Open);
        assert_eq!(registry.breaker("anthropic").state(), CircuitState::Closed);

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].provider, "anthropic");
        assert_eq!(snapshot[1].state, CircuitState::Open);
    }

    #[tokio::test]
    async fn test_reset() {
        let registry = HealthRegistry::new(CircuitBreakerConfig::new().with_failure_threshold(1));
        registry.breaker("openai").try_acquire().unwrap().failure();

        assert!(registry.reset("openai"));
        assert_eq!(registry.breaker("openai").state(), CircuitState::Closed);
        assert!(!registry.reset("unknown"));
    }
}
