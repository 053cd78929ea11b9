//! Task executors backing a scheduler's two execution resources.
//!
//! A [`TaskExecutor`] spawns work on a tokio runtime and tracks it so the
//! owner can shut it down in two steps:
//!
//! - [`shutdown`](TaskExecutor::shutdown) refuses new work and stops
//!   periodic loops after their current run; in-flight runs complete.
//! - [`shutdown_now`](TaskExecutor::shutdown_now) additionally cancels
//!   in-flight runs at their next suspension point.
//!
//! [`ExecutorPair`] holds the periodic and on-demand executors of one
//! scheduler and implements the hand-over between them on start and stop.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

use crate::scheduling::error::{SchedulerError, SchedulerResult};

/// Stand-in for delays too large to add to the current instant
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// The instant `after` from now, clamped to [`FAR_FUTURE`] when the sum
/// would overflow.
pub(crate) fn deadline_after(after: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(after).unwrap_or_else(|| now + FAR_FUTURE)
}

struct Inner {
    name: String,
    handle: Handle,
    tracker: TaskTracker,
    shutdown: CancellationToken,
    force: CancellationToken,
}

/// Cancellable, tracked task spawner.
///
/// Cloning yields another handle to the same executor.
#[derive(Clone)]
pub struct TaskExecutor {
    inner: Arc<Inner>,
}

impl TaskExecutor {
    /// Create an executor on the current tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::AllocationFailed`] when called outside a
    /// runtime.
    pub fn new<S: Into<String>>(name: S) -> SchedulerResult<Self> {
        let name = name.into();
        let handle = Handle::try_current()
            .map_err(|err| SchedulerError::AllocationFailed { name: name.clone(), reason: err.to_string() })?;
        Ok(Self::with_handle(name, handle))
    }

    /// Create an executor on an explicit runtime.
    pub fn with_handle<S: Into<String>>(name: S, handle: Handle) -> Self {
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                handle,
                tracker: TaskTracker::new(),
                shutdown: CancellationToken::new(),
                force: CancellationToken::new(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Run `task` once, as soon as possible. Never waits for the task.
    pub fn submit<F>(&self, task: F) -> SchedulerResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.ensure_running()?;
        let force = self.inner.force.clone();
        let name = self.inner.name.clone();
        self.inner.tracker.spawn_on(
            async move {
                tokio::select! {
                    biased;
                    () = force.cancelled() => debug!(executor = %name, "submitted task cancelled"),
                    () = task => {}
                }
            },
            &self.inner.handle,
        );
        Ok(())
    }

    /// Run `task` every `period`, first after `initial_delay`.
    ///
    /// Runs never overlap. A run that overruns its period delays the next
    /// tick; missed ticks are skipped rather than replayed in a burst.
    pub fn schedule_at_fixed_rate<F, Fut>(
        &self,
        initial_delay: Duration,
        period: Duration,
        mut task: F,
    ) -> SchedulerResult<()>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if period.is_zero() {
            return Err(SchedulerError::InvalidConfiguration {
                message: "fixed-rate period must be greater than zero".to_string(),
            });
        }
        self.ensure_running()?;

        let shutdown = self.inner.shutdown.clone();
        let force = self.inner.force.clone();
        let name = self.inner.name.clone();
        self.inner.tracker.spawn_on(
            async move {
                let mut ticker = tokio::time::interval_at(deadline_after(initial_delay), period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    tokio::select! {
                        biased;
                        () = shutdown.cancelled() => break,
                        _ = ticker.tick() => {}
                    }
                    tokio::select! {
                        biased;
                        () = force.cancelled() => break,
                        () = task() => {}
                    }
                }
                debug!(executor = %name, "fixed-rate loop finished");
            },
            &self.inner.handle,
        );
        Ok(())
    }

    /// Refuse new work and let running work finish.
    pub fn shutdown(&self) {
        self.inner.shutdown.cancel();
        self.inner.tracker.close();
    }

    /// Refuse new work and cancel running work.
    pub fn shutdown_now(&self) {
        self.shutdown();
        self.inner.force.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    /// Shut down with no tasks left
    pub fn is_terminated(&self) -> bool {
        self.inner.tracker.is_closed() && self.inner.tracker.is_empty()
    }

    /// Number of tasks still running
    pub fn active_tasks(&self) -> usize {
        self.inner.tracker.len()
    }

    /// Wait up to `timeout` for every task to finish after a shutdown.
    ///
    /// Returns `false` on timeout, and always `false` if the executor was
    /// never shut down and still has work.
    pub async fn await_termination(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.inner.tracker.wait()).await.is_ok()
    }

    fn ensure_running(&self) -> SchedulerResult<()> {
        if self.is_shutdown() {
            return Err(SchedulerError::ExecutorShutdown { name: self.inner.name.clone() });
        }
        Ok(())
    }
}

impl std::fmt::Debug for TaskExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskExecutor")
            .field("name", &self.inner.name)
            .field("shutdown", &self.is_shutdown())
            .field("active_tasks", &self.active_tasks())
            .finish()
    }
}

/// Periodic and on-demand executors of one scheduler.
///
/// Only one of the two accepts work at a time once the scheduler has been
/// started or stopped: the periodic executor while started, the on-demand
/// executor while stopped.
///
/// Executors replaced by a hand-over are kept until their last task ends so
/// that [`release`](Self::release) still bounds and cancels it.
#[derive(Debug, Default)]
pub struct ExecutorPair {
    periodic: Option<TaskExecutor>,
    on_demand: Option<TaskExecutor>,
    retired: Vec<TaskExecutor>,
}

impl ExecutorPair {
    /// Allocate both executors.
    pub fn allocate(scheduler: &str) -> SchedulerResult<Self> {
        Ok(Self {
            periodic: Some(TaskExecutor::new(format!("{scheduler}.periodic"))?),
            on_demand: Some(TaskExecutor::new(format!("{scheduler}.on-demand"))?),
            retired: Vec::new(),
        })
    }

    pub fn periodic(&self) -> Option<&TaskExecutor> {
        self.periodic.as_ref()
    }

    pub fn on_demand(&self) -> Option<&TaskExecutor> {
        self.on_demand.as_ref()
    }

    /// Replaced executors that still have running tasks
    pub fn retired(&self) -> &[TaskExecutor] {
        &self.retired
    }

    /// Every executor the pair still owns, current and retired.
    pub fn executors(&self) -> impl Iterator<Item = &TaskExecutor> {
        self.periodic.iter().chain(self.on_demand.iter()).chain(self.retired.iter())
    }

    fn retire(&mut self, executor: TaskExecutor) {
        self.retired.retain(|retired| !retired.is_terminated());
        if !executor.is_terminated() {
            self.retired.push(executor);
        }
    }

    /// Hand over to the periodic executor for a start.
    ///
    /// Shuts down the on-demand executor, abandoning its queued work, and
    /// replaces the periodic executor if a previous stop shut it down.
    pub fn begin_periodic(&mut self, scheduler: &str) -> SchedulerResult<TaskExecutor> {
        if let Some(on_demand) = &self.on_demand {
            on_demand.shutdown_now();
        }
        let periodic = match self.periodic.take() {
            Some(executor) if !executor.is_shutdown() => executor,
            previous => {
                let fresh = TaskExecutor::new(format!("{scheduler}.periodic"))?;
                if let Some(previous) = previous {
                    self.retire(previous);
                }
                fresh
            }
        };
        self.periodic = Some(periodic.clone());
        Ok(periodic)
    }

    /// Hand over to a fresh on-demand executor for a stop.
    pub fn end_periodic(&mut self, scheduler: &str) -> SchedulerResult<()> {
        if let Some(periodic) = &self.periodic {
            periodic.shutdown();
        }
        let fresh = TaskExecutor::new(format!("{scheduler}.on-demand"))?;
        if let Some(previous) = self.on_demand.replace(fresh) {
            previous.shutdown_now();
            self.retire(previous);
        }
        Ok(())
    }

    /// The executor `schedule()` should use: on-demand while the periodic
    /// executor is shut down, periodic otherwise.
    pub fn trigger_target(&self) -> Option<&TaskExecutor> {
        match &self.periodic {
            Some(periodic) if !periodic.is_shutdown() => Some(periodic),
            _ => self.on_demand.as_ref(),
        }
    }

    /// Shut every executor down, wait until `deadline` for them to drain,
    /// then force whatever is left.
    ///
    /// Returns `true` when everything terminated gracefully.
    pub async fn release(self, scheduler: &str, deadline: Instant) -> bool {
        let executors: Vec<TaskExecutor> =
            self.periodic.into_iter().chain(self.on_demand).chain(self.retired).collect();
        for executor in &executors {
            executor.shutdown();
        }

        let mut graceful = true;
        for executor in &executors {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if !executor.await_termination(remaining).await {
                warn!(
                    scheduler = scheduler,
                    executor = executor.name(),
                    active_tasks = executor.active_tasks(),
                    "executor did not terminate in time, forcing shutdown"
                );
                executor.shutdown_now();
                graceful = false;
            }
        }
        graceful
    }
}
