//! Retry mechanism with exponential backoff and jitter
//!
//! Wraps a single-attempt operation and retries it on transient failures until
//! it succeeds, fails permanently, or the retry budget runs out.

use std::future::Future;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::backoff::ExponentialBackoff;
use crate::classify::{Classifier, FailureKind};
use crate::error::{Error, Result, Status};

/// Retry budget and backoff parameters
///
/// This is an immutable template: every logical operation derives its own
/// attempt counter, clock and [`ExponentialBackoff`] from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Stop after this many attempts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,

    /// Stop once this much wall time has passed since the first attempt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_elapsed_ms: Option<u64>,

    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub multiplier: f64,
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: Some(6),
            max_elapsed_ms: None,
            initial_backoff_ms: 1000,
            max_backoff_ms: 32_000,
            multiplier: 2.0,
            jitter: 0.5,
        }
    }
}

impl RetryConfig {
    /// Fresh backoff state for one logical operation
    pub fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff::new(
            Duration::from_millis(self.initial_backoff_ms),
            Duration::from_millis(self.max_backoff_ms),
            self.multiplier,
            self.jitter,
        )
    }

    pub fn max_elapsed(&self) -> Option<Duration> {
        self.max_elapsed_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_attempts.is_none() && self.max_elapsed_ms.is_none() {
            return Err(Error::Config(
                "retry policy needs max_attempts or max_elapsed_ms".to_string(),
            ));
        }
        if self.max_attempts == Some(0) {
            return Err(Error::Config("max_attempts must be at least 1".to_string()));
        }
        if !(self.multiplier >= 1.0) {
            return Err(Error::Config(format!(
                "backoff multiplier must be >= 1.0, got {}",
                self.multiplier
            )));
        }
        if !(0.0..1.0).contains(&self.jitter) {
            return Err(Error::Config(format!(
                "jitter must be in [0, 1), got {}",
                self.jitter
            )));
        }
        if self.initial_backoff_ms > self.max_backoff_ms {
            return Err(Error::Config(format!(
                "initial backoff ({}ms) exceeds maximum backoff ({}ms)",
                self.initial_backoff_ms, self.max_backoff_ms
            )));
        }
        Ok(())
    }
}

/// Attempt counter and clock for one logical operation
#[derive(Debug)]
struct RetryState<'a> {
    config: &'a RetryConfig,
    started: Instant,
    attempts: u32,
}

impl<'a> RetryState<'a> {
    fn new(config: &'a RetryConfig) -> Self {
        Self {
            config,
            started: Instant::now(),
            attempts: 0,
        }
    }

    /// Whether another attempt fits in the budget after waiting `delay`
    fn allows_retry(&self, delay: Duration) -> bool {
        if self
            .config
            .max_attempts
            .is_some_and(|max| self.attempts >= max)
        {
            return false;
        }
        match self.config.max_elapsed() {
            Some(limit) => self.started.elapsed() + delay < limit,
            None => true,
        }
    }
}

/// Retry a single-attempt async operation with exponential backoff
///
/// # Arguments
/// * `operation` - Name used in logs and in the returned error
/// * `config` - Retry budget and backoff parameters
/// * `classifier` - Decides which failed attempts are worth retrying
/// * `attempt` - Closure performing exactly one remote attempt
///
/// The executor does not know whether `attempt` is idempotent. Callers retry
/// only naturally idempotent operations or ones guarded by a precondition.
///
/// # Example
/// ```ignore
/// let acl = retry_with_backoff(
///     "GetObjectAcl",
///     &config,
///     &Classifier::default(),
///     || transport.get_object_acl(&request),
/// )
/// .await?;
/// ```
pub async fn retry_with_backoff<T, F, Fut>(
    operation: &str,
    config: &RetryConfig,
    classifier: &Classifier,
    mut attempt: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, Status>>,
{
    let mut state = RetryState::new(config);
    let mut backoff = config.backoff();

    loop {
        state.attempts += 1;

        let status = match attempt().await {
            Ok(value) => return Ok(value),
            Err(status) => status,
        };

        if classifier.classify(status.code()) == FailureKind::Permanent {
            tracing::debug!(
                operation,
                attempt = state.attempts,
                error = %status,
                "Permanent error, not retrying"
            );
            return Err(Error::Permanent {
                operation: operation.to_string(),
                status,
            });
        }

        let delay = backoff.next_delay();
        if !state.allows_retry(delay) {
            tracing::warn!(
                operation,
                attempts = state.attempts,
                elapsed_ms = state.started.elapsed().as_millis(),
                error = %status,
                "Too many transient errors"
            );
            return Err(Error::RetryExhausted {
                operation: operation.to_string(),
                attempts: state.attempts,
                status,
            });
        }

        tracing::debug!(
            operation,
            attempt = state.attempts,
            backoff_ms = delay.as_millis(),
            error = %status,
            "Retrying after transient error"
        );

        tokio::time::sleep(delay).await;
    }
}

/// Retry configuration builder for easy customization
#[derive(Debug, Clone)]
pub struct RetryBuilder {
    config: RetryConfig,
}

impl RetryBuilder {
    pub fn new() -> Self {
        Self {
            config: RetryConfig::default(),
        }
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.config.max_attempts = Some(n);
        self
    }

    /// Limit by elapsed time only, with no cap on the attempt count
    pub fn max_elapsed(mut self, limit: Duration) -> Self {
        self.config.max_elapsed_ms = Some(limit.as_millis() as u64);
        self.config.max_attempts = None;
        self
    }

    pub fn initial_backoff_ms(mut self, ms: u64) -> Self {
        self.config.initial_backoff_ms = ms;
        self
    }

    pub fn max_backoff_ms(mut self, ms: u64) -> Self {
        self.config.max_backoff_ms = ms;
        self
    }

    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.config.multiplier = multiplier;
        self
    }

    pub fn jitter(mut self, jitter: f64) -> Self {
        self.config.jitter = jitter;
        self
    }

    pub fn build(self) -> RetryConfig {
        self.config
    }
}

impl Default for RetryBuilder {
    fn default() -> Self {
        Self::new()
    }
}
