//! Retry policies and the factories that mint one per session.
//!
//! A [`RetryPolicy`] is stateful: it counts attempts and owns the pause
//! between them. [`RetryTemplate`](super::RetryTemplate) asks its
//! [`PolicyFactory`] for a new instance on every `execute`, so counters never
//! leak from one session into another.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::backoff::{BackoffStrategy, Jitter};
use super::constants::{DEFAULT_FREQUENCY, DEFAULT_RETRY_COUNT, RETRY_COUNT_FOREVER};
use super::error::{RetryError, RetryResult};
use super::failure::Failure;
use super::status::PolicyStatus;

/// Decides, after each failed attempt, whether the session continues.
///
/// Implementations may suspend inside `apply_policy` to wait before the next
/// attempt.
#[async_trait]
pub trait RetryPolicy: Send {
    async fn apply_policy(&mut self, failure: &Failure) -> PolicyStatus;
}

/// Produces a fresh [`RetryPolicy`] for every retry session.
///
/// The `Display` form names the factory in retry-exhausted errors.
pub trait PolicyFactory: fmt::Display + Send + Sync {
    fn create_policy(&self) -> Box<dyn RetryPolicy>;
}

// ---------------------------------------------------------------------------
// No retry
// ---------------------------------------------------------------------------

/// The first failure exhausts the session.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRetryPolicyFactory;

impl PolicyFactory for NoRetryPolicyFactory {
    fn create_policy(&self) -> Box<dyn RetryPolicy> {
        Box::new(NoRetryPolicy)
    }
}

impl fmt::Display for NoRetryPolicyFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("NoRetryPolicyFactory")
    }
}

#[derive(Debug)]
struct NoRetryPolicy;

#[async_trait]
impl RetryPolicy for NoRetryPolicy {
    async fn apply_policy(&mut self, failure: &Failure) -> PolicyStatus {
        PolicyStatus::exhausted(failure.clone())
    }
}

// ---------------------------------------------------------------------------
// Simple (fixed count, fixed frequency)
// ---------------------------------------------------------------------------

/// Retries `count` times, pausing `frequency` before each retry.
///
/// `count` of [`RETRY_COUNT_FOREVER`] retries until the callback succeeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimpleRetryPolicyFactory {
    count: i32,
    frequency: Duration,
}

impl SimpleRetryPolicyFactory {
    /// Fails for counts below [`RETRY_COUNT_FOREVER`].
    pub fn new(count: i32, frequency: Duration) -> RetryResult<Self> {
        if count < RETRY_COUNT_FOREVER {
            return Err(RetryError::InvalidPolicy {
                message: format!("retry count must be >= {RETRY_COUNT_FOREVER}, got {count}"),
            });
        }
        Ok(Self { count, frequency })
    }

    /// Retry until success
    pub fn forever(frequency: Duration) -> Self {
        Self { count: RETRY_COUNT_FOREVER, frequency }
    }

    pub fn count(&self) -> i32 {
        self.count
    }

    pub fn frequency(&self) -> Duration {
        self.frequency
    }

    pub fn is_forever(&self) -> bool {
        self.count == RETRY_COUNT_FOREVER
    }
}

impl Default for SimpleRetryPolicyFactory {
    fn default() -> Self {
        Self { count: DEFAULT_RETRY_COUNT, frequency: DEFAULT_FREQUENCY }
    }
}

impl PolicyFactory for SimpleRetryPolicyFactory {
    fn create_policy(&self) -> Box<dyn RetryPolicy> {
        Box::new(SimpleRetryPolicy { count: self.count, frequency: self.frequency, retries: 0 })
    }
}

impl fmt::Display for SimpleRetryPolicyFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_forever() {
            write!(f, "SimpleRetryPolicyFactory(count: forever, frequency: {:?})", self.frequency)
        } else {
            write!(f, "SimpleRetryPolicyFactory(count: {}, frequency: {:?})", self.count, self.frequency)
        }
    }
}

#[derive(Debug)]
struct SimpleRetryPolicy {
    count: i32,
    frequency: Duration,
    retries: i32,
}

impl SimpleRetryPolicy {
    fn may_retry(&self) -> bool {
        self.count == RETRY_COUNT_FOREVER || self.retries < self.count
    }
}

#[async_trait]
impl RetryPolicy for SimpleRetryPolicy {
    async fn apply_policy(&mut self, failure: &Failure) -> PolicyStatus {
        if !self.may_retry() {
            return PolicyStatus::exhausted(failure.clone());
        }
        self.retries = self.retries.saturating_add(1);
        debug!(
            retry = self.retries,
            frequency_ms = self.frequency.as_millis() as u64,
            "waiting before next attempt"
        );
        tokio::time::sleep(self.frequency).await;
        PolicyStatus::ok()
    }
}

// ---------------------------------------------------------------------------
// Backoff
// ---------------------------------------------------------------------------

/// Retries up to `max_retries` times with a growing delay.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffRetryPolicyFactory {
    max_retries: u32,
    backoff: BackoffStrategy,
    jitter: Jitter,
}

impl BackoffRetryPolicyFactory {
    pub fn new(max_retries: u32, backoff: BackoffStrategy) -> Self {
        Self { max_retries, backoff, jitter: Jitter::None }
    }

    pub fn with_jitter(mut self, jitter: Jitter) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn backoff(&self) -> &BackoffStrategy {
        &self.backoff
    }
}

impl PolicyFactory for BackoffRetryPolicyFactory {
    fn create_policy(&self) -> Box<dyn RetryPolicy> {
        Box::new(BackoffRetryPolicy {
            max_retries: self.max_retries,
            backoff: self.backoff.clone(),
            jitter: self.jitter.clone(),
            retries: 0,
        })
    }
}

impl fmt::Display for BackoffRetryPolicyFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "BackoffRetryPolicyFactory(max_retries: {}, backoff: {:?})",
            self.max_retries, self.backoff
        )
    }
}

#[derive(Debug)]
struct BackoffRetryPolicy {
    max_retries: u32,
    backoff: BackoffStrategy,
    jitter: Jitter,
    retries: u32,
}

#[async_trait]
impl RetryPolicy for BackoffRetryPolicy {
    async fn apply_policy(&mut self, failure: &Failure) -> PolicyStatus {
        if self.retries >= self.max_retries {
            return PolicyStatus::exhausted(failure.clone());
        }
        let delay = self.jitter.apply(self.backoff.calculate_delay(self.retries));
        self.retries += 1;
        debug!(retry = self.retries, delay_ms = delay.as_millis() as u64, "backing off");
        tokio::time::sleep(delay).await;
        PolicyStatus::ok()
    }
}
