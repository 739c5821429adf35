//! Circuit Breaker pattern implementation
//!
//! Provides fault tolerance by refusing calls to a provider that keeps
//! failing. The circuit breaker has three states:
//! - Closed: Normal operation, requests pass through
//! - Open: Failures reached the threshold, requests are rejected
//! - HalfOpen: One probe request tests whether the provider recovered
//!
//! Callers obtain a [`CallPermit`] before touching the provider and settle it
//! with the outcome. Dropping a permit unsettled (cancellation) releases a
//! half-open probe slot without counting anything.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation - requests pass through
    Closed,
    /// Failures reached threshold - requests are rejected
    Open,
    /// Testing recovery - a single probe passes through
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half_open"),
        }
    }
}

/// Configuration for circuit breaker
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before opening the circuit
    pub failure_threshold: u32,
    /// Duration to wait before transitioning from open to half-open
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(30),
        }
    }
}

impl CircuitBreakerConfig {
    /// Create a new configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set failure threshold
    #[must_use]
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Set reset timeout
    #[must_use]
    pub fn with_reset_timeout(mut self, timeout: Duration) -> Self {
        self.reset_timeout = timeout;
        self
    }
}

/// The breaker refused a call without contacting the provider
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("circuit open for {provider}, retry after {}ms", .retry_after.as_millis())]
pub struct CircuitOpenError {
    /// Provider whose breaker refused the call
    pub provider: String,
    /// Time until a probe will be admitted (zero while a probe is in flight)
    pub retry_after: Duration,
}

/// Point-in-time view of one breaker
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BreakerSnapshot {
    /// Provider id
    pub provider: String,
    /// Current state
    pub state: CircuitState,
    /// Consecutive failures counted while closed
    pub consecutive_failures: u32,
    /// When the circuit last opened
    pub last_opened_at: Option<DateTime<Utc>>,
    /// Configured reset timeout in milliseconds
    pub reset_timeout_ms: u64,
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    opened_at: Option<Instant>,
    last_opened_at: Option<DateTime<Utc>>,
    probe_in_flight: bool,
}

/// Circuit breaker for one provider
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerState>,
}

impl CircuitBreaker {
    /// Create a new circuit breaker
    #[must_use]
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                failure_count: 0,
                opened_at: None,
                last_opened_at: None,
                probe_in_flight: false,
            }),
        }
    }

    /// Create with default configuration
    #[must_use]
    pub fn with_defaults(name: impl Into<String>) -> Self {
        Self::new(name, CircuitBreakerConfig::default())
    }

    /// Get the circuit breaker name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the current state
    ///
    /// An open circuit whose timeout has elapsed still reports `Open` until
    /// the next admission attempt moves it to `HalfOpen`.
    #[must_use]
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Get current consecutive failure count
    #[must_use]
    pub fn failure_count(&self) -> u32 {
        self.lock().failure_count
    }

    /// Ask to admit one call
    ///
    /// # Errors
    ///
    /// Returns [`CircuitOpenError`] while the circuit is open, or while a
    /// half-open probe is already in flight.
    pub fn try_acquire(self: &Arc<Self>) -> Result<CallPermit, CircuitOpenError> {
        let mut inner = self.lock();

        match inner.state {
            CircuitState::Closed => Ok(CallPermit::new(Arc::clone(self), false)),
            CircuitState::Open => {
                let elapsed = inner
                    .opened_at
                    .map_or(self.config.reset_timeout, |at| at.elapsed());
                if elapsed >= self.config.reset_timeout {
                    info!(name = %self.name, "Circuit breaker entering half-open state");
                    inner.state = CircuitState::HalfOpen;
                    inner.probe_in_flight = true;
                    Ok(CallPermit::new(Arc::clone(self), true))
                } else {
                    debug!(name = %self.name, "Circuit breaker rejected call");
                    Err(CircuitOpenError {
                        provider: self.name.clone(),
                        retry_after: self.config.reset_timeout - elapsed,
                    })
                }
            }
            CircuitState::HalfOpen => {
                if inner.probe_in_flight {
                    debug!(name = %self.name, "Circuit breaker probe in flight, rejecting call");
                    Err(CircuitOpenError {
                        provider: self.name.clone(),
                        retry_after: Duration::ZERO,
                    })
                } else {
                    inner.probe_in_flight = true;
                    Ok(CallPermit::new(Arc::clone(self), true))
                }
            }
        }
    }

    /// Point-in-time view for health reporting
    #[must_use]
    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.lock();
        BreakerSnapshot {
            provider: self.name.clone(),
            state: inner.state,
            consecutive_failures: inner.failure_count,
            last_opened_at: inner.last_opened_at,
            reset_timeout_ms: u64::try_from(self.config.reset_timeout.as_millis())
                .unwrap_or(u64::MAX),
        }
    }

    /// Reset the circuit breaker to closed state
    pub fn reset(&self) {
        let mut inner = self.lock();
        self.close(&mut inner);
    }

    fn record_success(&self, probe: bool) {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => {
                // Reset failure count on success in closed state
                inner.failure_count = 0;
            }
            CircuitState::HalfOpen if probe => self.close(&mut inner),
            // Stragglers admitted before the circuit opened don't count
            CircuitState::HalfOpen | CircuitState::Open => {}
        }
    }

    fn record_failure(&self, probe: bool) {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => {
                inner.failure_count += 1;
                debug!(
                    name = %self.name,
                    failures = inner.failure_count,
                    threshold = self.config.failure_threshold,
                    "Circuit breaker failure recorded"
                );

                if inner.failure_count >= self.config.failure_threshold {
                    self.open(&mut inner);
                }
            }
            CircuitState::HalfOpen if probe => {
                warn!(
                    name = %self.name,
                    "Circuit breaker probe failed, reopening"
                );
                self.open(&mut inner);
            }
            CircuitState::HalfOpen | CircuitState::Open => {}
        }
    }

    fn release_probe(&self) {
        let mut inner = self.lock();
        if inner.state == CircuitState::HalfOpen {
            debug!(name = %self.name, "Circuit breaker probe abandoned");
            inner.probe_in_flight = false;
        }
    }

    /// Transition to open state
    fn open(&self, inner: &mut BreakerState) {
        info!(
            name = %self.name,
            failures = inner.failure_count,
            reset_timeout_ms = u64::try_from(self.config.reset_timeout.as_millis()).unwrap_or(u64::MAX),
            "Circuit breaker opened"
        );
        inner.state = CircuitState::Open;
        inner.opened_at = Some(Instant::now());
        inner.last_opened_at = Some(Utc::now());
        inner.probe_in_flight = false;
    }

    /// Transition to closed state
    fn close(&self, inner: &mut BreakerState) {
        if inner.state != CircuitState::Closed {
            info!(name = %self.name, "Circuit breaker closed");
        }
        inner.state = CircuitState::Closed;
        inner.failure_count = 0;
        inner.opened_at = None;
        inner.probe_in_flight = false;
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Admission ticket for one provider call
///
/// Settle it with [`CallPermit::success`] or [`CallPermit::failure`] once the
/// call completes.
#[derive(Debug)]
#[must_use = "a permit must be settled with the call outcome"]
pub struct CallPermit {
    breaker: Arc<CircuitBreaker>,
    probe: bool,
    settled: bool,
}

impl CallPermit {
    fn new(breaker: Arc<CircuitBreaker>, probe: bool) -> Self {
        Self {
            breaker,
            probe,
            settled: false,
        }
    }

    /// Whether this permit is the half-open probe
    #[must_use]
    pub fn is_probe(&self) -> bool {
        self.probe
    }

    /// Record a completed, successful call
    pub fn success(mut self) {
        self.settled = true;
        self.breaker.record_success(self.probe);
    }

    /// Record a completed, failed call
    pub fn failure(mut self) {
        self.settled = true;
        self.breaker.record_failure(self.probe);
    }
}

impl Drop for CallPermit {
    fn drop(&mut self) {
        if !self.settled && self.probe {
            self.breaker.release_probe();
        }
    }
}
