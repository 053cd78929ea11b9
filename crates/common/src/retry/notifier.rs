//! Observation hooks for retry attempts.

use tracing::{info, warn};

use super::context::RetryContext;
use super::failure::Failure;

/// Observer invoked after every attempt.
///
/// Notifiers only observe; they cannot change the outcome of the session.
pub trait RetryNotifier: Send + Sync {
    fn success(&self, context: &RetryContext);

    fn failed(&self, context: &RetryContext, failure: &Failure);
}

/// Reports attempt outcomes through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingRetryNotifier;

impl RetryNotifier for LoggingRetryNotifier {
    fn success(&self, context: &RetryContext) {
        info!(
            session_id = %context.session_id(),
            work = context.description(),
            attempts = context.attempts(),
            elapsed_ms = context.elapsed().as_millis() as u64,
            "retry session succeeded"
        );
    }

    fn failed(&self, context: &RetryContext, failure: &Failure) {
        warn!(
            session_id = %context.session_id(),
            work = context.description(),
            attempt = context.attempts(),
            error = %format!("{:#}", failure.inner()),
            "attempt failed"
        );
    }
}
