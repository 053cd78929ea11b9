//! The [`Scheduler`] abstraction and the lifecycle core shared by the
//! concrete schedulers.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cadence_common::{LifecycleError, LifecycleManager, LifecyclePhase, LifecycleState, Transition};
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::observability::SchedulerMetrics;
use crate::scheduling::error::SchedulerResult;
use crate::scheduling::executor::{deadline_after, ExecutorPair, TaskExecutor};
use crate::scheduling::job::{Job, JobRunner, TriggerKind};

/// Bounded wait for executors to drain during dispose
pub const DEFAULT_DISPOSE_TIMEOUT: Duration = Duration::from_millis(5000);

/// A named, lifecycle-managed trigger for a [`Job`].
///
/// Lifecycle calls take `&self`; implementations serialize them internally
/// so a scheduler can be shared as `Arc<dyn Scheduler>`.
#[async_trait]
pub trait Scheduler: fmt::Debug + Send + Sync {
    /// Registry key
    fn name(&self) -> &str;

    fn state(&self) -> LifecycleState;

    fn is_started(&self) -> bool {
        self.state() == LifecycleState::Started
    }

    /// Allocate execution resources. Must run once before `start`.
    async fn initialise(&self) -> SchedulerResult<Transition>;

    /// Begin triggering. A no-op when already started.
    async fn start(&self) -> SchedulerResult<Transition>;

    /// Stop triggering. A no-op when not started.
    async fn stop(&self) -> SchedulerResult<Transition>;

    /// Run the job once, now, whatever the lifecycle state. Does not wait
    /// for the job.
    fn schedule(&self) -> SchedulerResult<()>;

    /// Release every resource. Best effort: failures are logged.
    async fn dispose(&self) -> Transition;
}

/// State and resources every concrete scheduler carries.
pub(crate) struct SchedulerCore {
    name: String,
    lifecycle: LifecycleManager,
    executors: Mutex<ExecutorPair>,
    runner: JobRunner,
    dispose_timeout: Duration,
}

impl SchedulerCore {
    pub(crate) fn new(name: &str, job: Arc<dyn Job>) -> Self {
        Self {
            name: name.to_string(),
            lifecycle: LifecycleManager::new(name),
            executors: Mutex::new(ExecutorPair::default()),
            runner: JobRunner::new(name, job, Arc::new(SchedulerMetrics::new()), None),
            dispose_timeout: DEFAULT_DISPOSE_TIMEOUT,
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    pub(crate) fn runner(&self) -> &JobRunner {
        &self.runner
    }

    pub(crate) fn metrics(&self) -> Arc<SchedulerMetrics> {
        Arc::clone(self.runner.metrics())
    }

    pub(crate) fn set_runner(&mut self, runner: JobRunner) {
        self.runner = runner;
    }

    pub(crate) fn dispose_timeout(&self) -> Duration {
        self.dispose_timeout
    }

    /// Deadline for a dispose that begins now
    pub(crate) fn dispose_deadline(&self) -> Instant {
        deadline_after(self.dispose_timeout)
    }

    pub(crate) fn set_dispose_timeout(&mut self, timeout: Duration) {
        self.dispose_timeout = timeout;
    }

    /// Guard `phase`, run `effect`, then commit. A failed effect rolls the
    /// state back.
    pub(crate) async fn transition<F, Fut>(
        &self,
        phase: LifecyclePhase,
        effect: F,
    ) -> SchedulerResult<Transition>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = SchedulerResult<()>>,
    {
        let Some(pending) = self.lifecycle.begin(phase)? else {
            debug!(
                scheduler = %self.name,
                phase = %phase,
                state = %self.state(),
                "lifecycle call is a no-op"
            );
            return Ok(Transition::AlreadyInState(self.state()));
        };

        effect().await?;

        let from = pending.from_state();
        let transition = pending.commit();
        info!(
            scheduler = %self.name,
            phase = %phase,
            from = %from,
            to = %self.state(),
            "lifecycle transition applied"
        );
        Ok(transition)
    }

    pub(crate) fn allocate(&self) -> SchedulerResult<()> {
        let pair = ExecutorPair::allocate(&self.name)?;
        *self.executors.lock() = pair;
        Ok(())
    }

    pub(crate) fn begin_periodic(&self) -> SchedulerResult<TaskExecutor> {
        self.executors.lock().begin_periodic(&self.name)
    }

    pub(crate) fn end_periodic(&self) -> SchedulerResult<()> {
        self.executors.lock().end_periodic(&self.name)
    }

    /// Submit an on-demand run to whichever executor is accepting work.
    pub(crate) fn schedule(&self) -> SchedulerResult<()> {
        if self.lifecycle.is_disposed() {
            return Err(LifecycleError::Disposed { component: self.name.clone() }.into());
        }

        let executors = self.executors.lock();
        let Some(target) = executors.trigger_target() else {
            let error = if self.lifecycle.is_disposed() {
                LifecycleError::Disposed { component: self.name.clone() }
            } else {
                LifecycleError::NotInitialised { component: self.name.clone() }
            };
            return Err(error.into());
        };

        let runner = self.runner.clone();
        target.submit(async move { runner.run(TriggerKind::OnDemand).await })?;
        debug!(scheduler = %self.name, executor = target.name(), "on-demand run submitted");
        Ok(())
    }

    /// Shut every executor down by `deadline`. Never fails.
    pub(crate) async fn release(&self, deadline: Instant) {
        let pair = std::mem::take(&mut *self.executors.lock());
        if !pair.release(&self.name, deadline).await {
            tracing::warn!(
                scheduler = %self.name,
                timeout_ms = self.dispose_timeout.as_millis() as u64,
                "executors forced to terminate during dispose"
            );
        }
    }
}

impl Drop for SchedulerCore {
    fn drop(&mut self) {
        let pair = self.executors.get_mut();
        let mut live = pair.executors().filter(|executor| !executor.is_terminated()).peekable();
        if live.peek().is_some() {
            tracing::warn!(scheduler = %self.name, "scheduler dropped without dispose; cancelling tasks");
        }
        for executor in live {
            executor.shutdown_now();
        }
    }
}
