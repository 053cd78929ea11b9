//! The unit of work a scheduler triggers.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, error, warn};

use crate::observability::{log_metric, SchedulerMetrics};

/// Work triggered by a [`Scheduler`](super::Scheduler).
///
/// Failures are logged and counted by the scheduler; they never stop the
/// schedule.
#[async_trait]
pub trait Job: Send + Sync {
    async fn run(&self) -> anyhow::Result<()>;
}

/// [`Job`] backed by a closure returning a future.
pub struct FnJob<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> Job for FnJob<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send,
{
    async fn run(&self) -> anyhow::Result<()> {
        (self.f)().await
    }
}

impl<F> fmt::Debug for FnJob<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnJob")
    }
}

/// Wrap a closure as a shareable job.
///
/// ```
/// use cadence_infra::scheduling::job_fn;
///
/// let job = job_fn(|| async { Ok(()) });
/// # drop(job);
/// ```
pub fn job_fn<F, Fut>(f: F) -> Arc<dyn Job>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(FnJob { f })
}

/// What started a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerKind {
    Periodic,
    OnDemand,
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Periodic => f.write_str("periodic"),
            Self::OnDemand => f.write_str("on-demand"),
        }
    }
}

/// Runs a scheduler's job with timeout, logging and metrics.
#[derive(Clone)]
pub struct JobRunner {
    scheduler: Arc<str>,
    job: Arc<dyn Job>,
    metrics: Arc<SchedulerMetrics>,
    timeout: Option<Duration>,
}

impl JobRunner {
    pub fn new(
        scheduler: &str,
        job: Arc<dyn Job>,
        metrics: Arc<SchedulerMetrics>,
        timeout: Option<Duration>,
    ) -> Self {
        Self { scheduler: Arc::from(scheduler), job, metrics, timeout }
    }

    pub fn metrics(&self) -> &Arc<SchedulerMetrics> {
        &self.metrics
    }

    pub fn with_metrics(self, metrics: Arc<SchedulerMetrics>) -> Self {
        Self { metrics, ..self }
    }

    pub fn with_timeout(self, timeout: Option<Duration>) -> Self {
        Self { timeout, ..self }
    }

    /// Run the job once. Never fails; outcomes are logged and counted.
    pub async fn run(&self, trigger: TriggerKind) {
        match trigger {
            TriggerKind::Periodic => {
                log_metric(self.metrics.record_periodic_run(), "scheduler.job.periodic");
            }
            TriggerKind::OnDemand => {
                log_metric(self.metrics.record_on_demand_run(), "scheduler.job.on_demand");
            }
        }
        let started = Instant::now();

        let outcome = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.job.run()).await.ok(),
            None => Some(self.job.run().await),
        };

        match outcome {
            Some(Ok(())) => {
                log_metric(self.metrics.record_success(), "scheduler.job.success");
                debug!(
                    scheduler = %self.scheduler,
                    trigger = %trigger,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "job finished"
                );
            }
            Some(Err(err)) => {
                log_metric(self.metrics.record_failure(), "scheduler.job.failure");
                error!(
                    scheduler = %self.scheduler,
                    trigger = %trigger,
                    error = %format!("{err:#}"),
                    "job failed"
                );
            }
            None => {
                log_metric(self.metrics.record_timeout(), "scheduler.job.timeout");
                warn!(
                    scheduler = %self.scheduler,
                    trigger = %trigger,
                    timeout_ms = self.timeout.map_or(0, |limit| limit.as_millis() as u64),
                    "job timed out"
                );
            }
        }
    }
}

impl fmt::Debug for JobRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobRunner")
            .field("scheduler", &self.scheduler)
            .field("timeout", &self.timeout)
            .finish()
    }
}
