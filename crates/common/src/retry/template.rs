//! Attempt/retry loop.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use super::classify::{classify_error, ErrorClass, ErrorClassifier};
use super::context::RetryContext;
use super::error::{RetryError, RetryResult};
use super::failure::Failure;
use super::notifier::RetryNotifier;
use super::policy::PolicyFactory;

/// A fallible unit of work run under a [`RetryTemplate`].
#[async_trait]
pub trait RetryCallback: Send + Sync {
    /// Perform one attempt. The callback may record return messages or
    /// metadata on `context`.
    async fn do_work(&self, context: &mut RetryContext) -> anyhow::Result<()>;

    /// Label used in logs and in retry-exhausted errors
    fn work_description(&self) -> String;
}

/// Runs a [`RetryCallback`] until it succeeds, is cancelled, or the policy
/// gives up.
///
/// Attempts are strictly sequential and run on the caller's task. Each call
/// to [`execute`](Self::execute) gets its own context and its own policy
/// instance, so one template can serve concurrent callers.
#[derive(Clone)]
pub struct RetryTemplate {
    policy_factory: Arc<dyn PolicyFactory>,
    notifier: Option<Arc<dyn RetryNotifier>>,
    classifier: ErrorClassifier,
}

impl RetryTemplate {
    pub fn new(policy_factory: Arc<dyn PolicyFactory>) -> Self {
        Self { policy_factory, notifier: None, classifier: classify_error }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn RetryNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Replace the default [`classify_error`].
    pub fn with_classifier(mut self, classifier: ErrorClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn policy_factory(&self) -> &Arc<dyn PolicyFactory> {
        &self.policy_factory
    }

    pub fn notifier(&self) -> Option<&Arc<dyn RetryNotifier>> {
        self.notifier.as_ref()
    }

    /// Run `callback` under a fresh policy.
    ///
    /// Returns the session context when an attempt succeeded or when an
    /// attempt was cancelled (the context is then left failed). Returns
    /// [`RetryError::Exhausted`] when the policy gives up.
    #[instrument(skip_all, fields(work = %callback.work_description()))]
    pub async fn execute<C>(&self, callback: &C) -> RetryResult<RetryContext>
    where
        C: RetryCallback + ?Sized,
    {
        self.execute_with_context(callback, RetryContext::new(callback.work_description())).await
    }

    /// Like [`execute`](Self::execute) but with a caller-built context, e.g.
    /// one seeded with metadata.
    pub async fn execute_with_context<C>(
        &self,
        callback: &C,
        mut context: RetryContext,
    ) -> RetryResult<RetryContext>
    where
        C: RetryCallback + ?Sized,
    {
        let mut policy = self.policy_factory.create_policy();

        loop {
            let attempt = context.record_attempt();
            debug!(session_id = %context.session_id(), attempt, "starting attempt");

            let error = match callback.do_work(&mut context).await {
                Ok(()) => {
                    context.set_ok();
                    if let Some(notifier) = &self.notifier {
                        notifier.success(&context);
                    }
                    return Ok(context);
                }
                Err(error) => error,
            };

            let class = (self.classifier)(&error);
            let failure = Failure::from(error);
            context.set_failed(failure.clone());
            if let Some(notifier) = &self.notifier {
                notifier.failed(&context, &failure);
            }

            if class == ErrorClass::Cancelled {
                debug!(
                    session_id = %context.session_id(),
                    attempt,
                    "attempt cancelled, abandoning retry session"
                );
                return Ok(context);
            }

            let status = policy.apply_policy(&failure).await;
            if let Some(cause) = status.into_throwable() {
                warn!(
                    session_id = %context.session_id(),
                    attempts = attempt,
                    policy = %self.policy_factory,
                    "retry policy exhausted"
                );
                return Err(RetryError::Exhausted {
                    description: context.description().to_string(),
                    policy: self.policy_factory.to_string(),
                    attempts: attempt,
                    source: cause,
                });
            }
        }
    }
}

impl fmt::Debug for RetryTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryTemplate")
            .field("policy_factory", &self.policy_factory.to_string())
            .field("notifier", &self.notifier.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for retry::template.
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::retry::{NoRetryPolicyFactory, RetryCancelled, SimpleRetryPolicyFactory};
    use crate::testing::RecordingNotifier;

    struct FailTimes {
        failures: u32,
        calls: AtomicU32,
    }

    impl FailTimes {
        fn new(failures: u32) -> Self {
            Self { failures, calls: AtomicU32::new(0) }
        }
    }

    #[async_trait]
    impl RetryCallback for FailTimes {
        async fn do_work(&self, context: &mut RetryContext) -> anyhow::Result<()> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            context.add_return_message(format!("attempt {call}"));
            if call <= self.failures {
                anyhow::bail!("attempt {call} refused");
            }
            Ok(())
        }

        fn work_description(&self) -> String {
            "connect to broker".to_string()
        }
    }

    fn simple(count: i32) -> RetryTemplate {
        let factory = SimpleRetryPolicyFactory::new(count, Duration::from_millis(5)).unwrap();
        RetryTemplate::new(Arc::new(factory))
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_transient_failures() {
        let notifier = Arc::new(RecordingNotifier::new());
        let template = simple(3).with_notifier(notifier.clone());
        let callback = FailTimes::new(2);

        let context = template.execute(&callback).await.unwrap();

        assert!(context.is_ok());
        assert_eq!(context.attempts(), 3);
        assert_eq!(context.return_messages(), ["attempt 1", "attempt 2", "attempt 3"]);
        assert_eq!(notifier.failures(), 2);
        assert_eq!(notifier.successes(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_wraps_last_failure() {
        let template = simple(2);
        let callback = FailTimes::new(u32::MAX);

        let err = template.execute(&callback).await.unwrap_err();

        assert_eq!(callback.calls.load(Ordering::SeqCst), 3);
        match &err {
            RetryError::Exhausted { description, attempts, source, policy } => {
                assert_eq!(description, "connect to broker");
                assert_eq!(*attempts, 3);
                assert_eq!(source.to_string(), "attempt 3 refused");
                assert!(policy.starts_with("SimpleRetryPolicyFactory"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn success_on_first_attempt_skips_policy() {
        let template = RetryTemplate::new(Arc::new(NoRetryPolicyFactory));
        let context = template.execute(&FailTimes::new(0)).await.unwrap();
        assert!(context.is_ok());
        assert_eq!(context.attempts(), 1);
        assert!(context.last_failure().is_none());
    }

    struct Interrupted;

    #[async_trait]
    impl RetryCallback for Interrupted {
        async fn do_work(&self, _context: &mut RetryContext) -> anyhow::Result<()> {
            Err(RetryCancelled::new("interrupted while connecting").into())
        }

        fn work_description(&self) -> String {
            "interruptible".to_string()
        }
    }

    #[tokio::test]
    async fn cancellation_short_circuits_without_error() {
        let notifier = Arc::new(RecordingNotifier::new());
        let template = RetryTemplate::new(Arc::new(SimpleRetryPolicyFactory::forever(
            Duration::from_secs(60),
        )))
        .with_notifier(notifier.clone());

        let context = template.execute(&Interrupted).await.unwrap();

        assert!(context.is_failed());
        assert_eq!(context.attempts(), 1);
        assert_eq!(notifier.failures(), 1);
        assert_eq!(notifier.successes(), 0);
    }

    #[tokio::test]
    async fn custom_classifier_can_treat_everything_as_cancelled() {
        let template = simple(5).with_classifier(|_| ErrorClass::Cancelled);
        let callback = FailTimes::new(u32::MAX);

        let context = template.execute(&callback).await.unwrap();

        assert!(context.is_failed());
        assert_eq!(callback.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn sessions_do_not_share_policy_state() {
        let template = simple(1);
        let first = FailTimes::new(1);
        let second = FailTimes::new(1);

        assert!(template.execute(&first).await.is_ok());
        assert!(template.execute(&second).await.is_ok());
    }
}
