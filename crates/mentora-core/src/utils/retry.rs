//! Retry logic with exponential backoff
//!
//! Provides bounded retry for transient failures. The wait before attempt
//! `n + 1` is `initial_delay * multiplier^(n-1)`, capped at `max_delay`.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the first)
    pub max_attempts: u32,
    /// Initial delay between retries
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Add random jitter to delays
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            jitter: false,
        }
    }
}

impl RetryConfig {
    /// Create a new retry configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum attempts
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Set initial delay
    #[must_use]
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set maximum delay
    #[must_use]
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set backoff multiplier
    #[must_use]
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Enable or disable jitter
    #[must_use]
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Calculate the wait after a failed attempt (1-based)
    pub(crate) fn calculate_delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let base_delay =
            self.initial_delay.as_millis() as f64 * self.backoff_multiplier.powi(exponent);

        let delay_ms = base_delay.min(self.max_delay.as_millis() as f64) as u64;

        let final_delay = if self.jitter {
            // Add up to 25% jitter
            let jitter_range = delay_ms / 4;
            if jitter_range == 0 {
                delay_ms
            } else {
                delay_ms + rand::thread_rng().gen_range(0..=jitter_range)
            }
        } else {
            delay_ms
        };

        Duration::from_millis(final_delay)
    }
}

/// Error type for retry operations
#[derive(Debug)]
pub struct RetryError<E> {
    /// The last error encountered
    pub last_error: E,
    /// Total number of attempts made
    pub attempts: u32,
    /// Whether a backoff wait was interrupted by cancellation
    pub cancelled: bool,
}

impl<E: std::fmt::Display> std::fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.cancelled {
            write!(
                f,
                "Operation cancelled after {} attempts: {}",
                self.attempts, self.last_error
            )
        } else {
            write!(
                f,
                "Operation failed after {} attempts: {}",
                self.attempts, self.last_error
            )
        }
    }
}

impl<E: std::fmt::Debug + std::fmt::Display> std::error::Error for RetryError<E> {}

/// Execute an async operation with retry logic
///
/// # Arguments
/// * `config` - Retry configuration
/// * `cancel` - Token that aborts a pending backoff wait
/// * `operation` - Async operation to retry; receives the 1-based attempt number
/// * `is_retryable` - Function to determine if an error should trigger a retry
///
/// # Example
/// ```ignore
/// let config = RetryConfig::default();
/// let result = retry_with_backoff(
///     &config,
///     &CancellationToken::new(),
///     |_attempt| async { provider.complete(request.clone()).await },
///     |e| e.retriable,
/// ).await;
/// ```
pub async fn retry_with_backoff<T, E, F, Fut, R>(
    config: &RetryConfig,
    cancel: &CancellationToken,
    mut operation: F,
    is_retryable: R,
) -> Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    R: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        let err = match operation(attempt).await {
            Ok(result) => {
                if attempt > 1 {
                    debug!(attempt = attempt, "Operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) => e,
        };

        if attempt >= max_attempts || !is_retryable(&err) {
            debug!(
                attempt = attempt,
                error = %err,
                "Operation failed, no more retries"
            );
            return Err(RetryError {
                last_error: err,
                attempts: attempt,
                cancelled: false,
            });
        }

        let delay = config.calculate_delay(attempt);
        warn!(
            attempt = attempt,
            max_attempts = max_attempts,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "Operation failed, retrying"
        );

        tokio::select! {
            () = cancel.cancelled() => {
                debug!(attempt = attempt, "Retry wait cancelled");
                return Err(RetryError {
                    last_error: err,
                    attempts: attempt,
                    cancelled: true,
                });
            }
            () = sleep(delay) => {}
        }

        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[derive(Debug)]
    struct Flaky {
        transient: bool,
    }

    impl std::fmt::Display for Flaky {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "flaky(transient={})", self.transient)
        }
    }

    #[test]
    fn test_retry_config_defaults() {
        let config = RetryConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.initial_delay, Duration::from_secs(1));
        assert_eq!(config.max_delay, Duration::from_secs(10));
        assert_eq!(config.backoff_multiplier, 2.0);
        assert!(!config.jitter);
    }

    #[test]
    fn test_calculate_delay() {
        let config = RetryConfig::default();
        assert_eq!(config.calculate_delay(1), Duration::from_secs(1));
        assert_eq!(config.calculate_delay(2), Duration::from_secs(2));
        assert_eq!(config.calculate_delay(3), Duration::from_secs(4));
        assert_eq!(config.calculate_delay(4), Duration::from_secs(8));
        // Capped
        assert_eq!(config.calculate_delay(5), Duration::from_secs(10));
        assert_eq!(config.calculate_delay(12), Duration::from_secs(10));
    }

    #[test]
    fn test_jitter_stays_within_quarter() {
        let config = RetryConfig::default().with_jitter(true);
        for _ in 0..50 {
            let delay = config.calculate_delay(2);
            assert!(delay >= Duration::from_secs(2));
            assert!(delay <= Duration::from_millis(2500));
        }
    }

    #[tokio::test]
    async fn test_first_attempt_success() {
        let config = RetryConfig::default();
        let result: Result<u32, RetryError<Flaky>> =
            retry_with_backoff(&config, &CancellationToken::new(), |_| async { Ok(7) }, |_| true)
                .await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retriable_failure_exhausts_attempts_with_backoff() {
        let config = RetryConfig::default();
        let calls = Arc::new(AtomicU32::new(0));
        let started = tokio::time::Instant::now();
        let timestamps = Arc::new(std::sync::Mutex::new(Vec::new()));

        let result: Result<(), _> = retry_with_backoff(
            &config,
            &CancellationToken::new(),
            |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                timestamps.lock().unwrap().push(started.elapsed());
                async { Err(Flaky { transient: true }) }
            },
            |e: &Flaky| e.transient,
        )
        .await;

        let err = result.unwrap_err();
        assert_eq!(err.attempts, 3);
        assert!(!err.cancelled);
        assert!(err.last_error.transient);
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        let timestamps = timestamps.lock().unwrap();
        let close_to = |actual: Duration, expected: Duration| {
            actual >= expected && actual < expected + Duration::from_millis(50)
        };
        assert!(close_to(timestamps[0], Duration::ZERO));
        assert!(close_to(timestamps[1], Duration::from_secs(1)));
        assert!(close_to(timestamps[2], Duration::from_secs(3)));
    }

    #[tokio::test]
    async fn test_non_retriable_failure_single_attempt() {
        let config = RetryConfig::default();
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = retry_with_backoff(
            &config,
            &CancellationToken::new(),
            |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(Flaky { transient: false }) }
            },
            |e: &Flaky| e.transient,
        )
        .await;

        assert_eq!(result.unwrap_err().attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_after_retry() {
        let config = RetryConfig::default();

        let result = retry_with_backoff(
            &config,
            &CancellationToken::new(),
            |attempt| async move {
                if attempt < 3 {
                    Err(Flaky { transient: true })
                } else {
                    Ok(attempt)
                }
            },
            |e: &Flaky| e.transient,
        )
        .await;

        assert_eq!(result.unwrap(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_backoff_wait() {
        let config = RetryConfig::default().with_initial_delay(Duration::from_secs(5));
        let cancel = CancellationToken::new();
        let calls = Arc::new(AtomicU32::new(0));

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let result: Result<(), _> = retry_with_backoff(
            &config,
            &cancel,
            |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(Flaky { transient: true }) }
            },
            |e: &Flaky| e.transient,
        )
        .await;

        let err = result.unwrap_err();
        assert!(err.cancelled);
        assert_eq!(err.attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
