//! Metrics collection for observability
//!
//! In-process counters per provider. Values are cumulative for the life of
//! the process and can be read back as a snapshot.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// A thread-safe counter metric
#[derive(Debug, Default, Clone)]
pub struct Counter {
    value: Arc<AtomicU64>,
}

impl Counter {
    /// Create a new counter
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment the counter by 1
    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment the counter by a specific amount
    pub fn inc_by(&self, n: u64) {
        self.value.fetch_add(n, Ordering::Relaxed);
    }

    /// Get the current value
    #[must_use]
    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Counters for one provider
#[derive(Debug, Default, Clone)]
pub struct ProviderCounters {
    /// Adapter calls made (each retry counts)
    pub attempts: Counter,
    /// Turns answered by this provider
    pub successes: Counter,
    /// Candidate slots that ended in failure
    pub failures: Counter,
    /// Calls refused by the circuit breaker
    pub breaker_rejections: Counter,
    /// Times this provider answered after an earlier candidate failed
    pub fallbacks: Counter,
    /// Sum of successful call latencies
    pub latency_ms_total: Counter,
}

/// Snapshot of one provider's counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProviderMetricsSnapshot {
    /// Provider id
    pub provider: String,
    /// Adapter calls made
    pub attempts: u64,
    /// Turns answered
    pub successes: u64,
    /// Candidate failures
    pub failures: u64,
    /// Breaker rejections
    pub breaker_rejections: u64,
    /// Fallback answers
    pub fallbacks: u64,
    /// Mean latency of successful calls
    pub avg_latency_ms: u64,
}

/// Registry of per-provider counters
#[derive(Debug, Default)]
pub struct ProviderMetrics {
    providers: RwLock<HashMap<String, ProviderCounters>>,
}

impl ProviderMetrics {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get (or create) the counters for a provider
    pub fn provider(&self, name: &str) -> ProviderCounters {
        {
            let providers = self.providers.read().unwrap_or_else(|e| e.into_inner());
            if let Some(counters) = providers.get(name) {
                return counters.clone();
            }
        }

        let mut providers = self.providers.write().unwrap_or_else(|e| e.into_inner());
        providers.entry(name.to_string()).or_default().clone()
    }

    /// Snapshot every provider seen so far, sorted by name
    #[must_use]
    pub fn snapshot(&self) -> Vec<ProviderMetricsSnapshot> {
        let providers = self.providers.read().unwrap_or_else(|e| e.into_inner());
        let mut snapshot: Vec<_> = providers
            .iter()
            .map(|(name, c)| {
                let successes = c.successes.get();
                ProviderMetricsSnapshot {
                    provider: name.clone(),
                    attempts: c.attempts.get(),
                    successes,
                    failures: c.failures.get(),
                    breaker_rejections: c.breaker_rejections.get(),
                    fallbacks: c.fallbacks.get(),
                    avg_latency_ms: c.latency_ms_total.get().checked_div(successes).unwrap_or(0),
                }
            })
            .collect();
        snapshot.sort_by(|a, b| a.provider.cmp(&b.provider));
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter() {
        let counter = Counter::new();
        assert_eq!(counter.get(), 0);

        counter.inc();
        counter.inc_by(4);
        assert_eq!(counter.get(), 5);

        // Clones share the value
        let clone = counter.clone();
        clone.inc();
        assert_eq!(counter.get(), 6);
    }

    #[test]
    fn test_provider_counters_shared() {
        let metrics = ProviderMetrics::new();
        metrics.provider("gemini").attempts.inc();
        metrics.provider("gemini").attempts.inc();
        metrics.provider("anthropic").breaker_rejections.inc();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].provider, "anthropic");
        assert_eq!(snapshot[0].breaker_rejections, 1);
        assert_eq!(snapshot[1].provider, "gemini");
        assert_eq!(snapshot[1].attempts, 2);
    }

    #[test]
    fn test_average_latency() {
        let metrics = ProviderMetrics::new();
        let gemini = metrics.provider("gemini");
        gemini.successes.inc_by(2);
        gemini.latency_ms_total.inc_by(300);

        assert_eq!(metrics.snapshot()[0].avg_latency_ms, 150);
    }
}
