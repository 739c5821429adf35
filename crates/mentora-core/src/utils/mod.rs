//! Utility modules for mentora-core
//!
//! Provides common utilities:
//! - retry: Retry logic with exponential backoff
//! - circuit_breaker: Circuit breaker pattern for fault tolerance
//! - metrics: Per-provider counters

mod circuit_breaker;
mod metrics;
mod retry;

pub use circuit_breaker::{
    BreakerSnapshot, CallPermit, CircuitBreaker, CircuitBreakerConfig, CircuitOpenError,
    CircuitState,
};
pub use metrics::{Counter, ProviderCounters, ProviderMetrics, ProviderMetricsSnapshot};
pub use retry::{retry_with_backoff, RetryConfig, RetryError};
