//! Scheduler triggered by a cron expression.
//!
//! Expressions use the six or seven field format with seconds first
//! (`"0 */5 * * * *"` fires every five minutes). They are evaluated in the
//! scheduler's time zone: UTC when none is configured, GMT when the
//! configured name is not a known IANA zone.
//!
//! Cron firings are submitted to the scheduler's periodic executor, so stop
//! and dispose cover them exactly like fixed-rate runs. A firing that arrives
//! while the previous run is still active is skipped.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cadence_common::{LifecyclePhase, LifecycleState, Transition};
use chrono::DateTime;
use chrono_tz::Tz;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_cron_scheduler::{Job as CronJob, JobScheduler};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::config::CronConfig;
use crate::observability::SchedulerMetrics;
use crate::scheduling::error::{SchedulerError, SchedulerResult};
use crate::scheduling::executor::TaskExecutor;
use crate::scheduling::job::{Job, JobRunner, TriggerKind};
use crate::scheduling::scheduler::{Scheduler, SchedulerCore};

/// Zone used when a configured name cannot be resolved
pub const FALLBACK_TIME_ZONE: Tz = Tz::GMT;

/// Resolve a configured zone name.
///
/// `None` means UTC. Unknown names log a warning and resolve to
/// [`FALLBACK_TIME_ZONE`].
pub fn resolve_time_zone(name: Option<&str>) -> Tz {
    let Some(name) = name.map(str::trim).filter(|name| !name.is_empty()) else {
        return Tz::UTC;
    };
    match name.parse::<Tz>() {
        Ok(zone) => zone,
        Err(err) => {
            warn!(
                time_zone = name,
                fallback = %FALLBACK_TIME_ZONE,
                error = %err,
                "unknown time zone, using fallback"
            );
            FALLBACK_TIME_ZONE
        }
    }
}

struct CronEngine {
    scheduler: JobScheduler,
    job_id: Uuid,
}

/// Cron-driven [`Scheduler`].
pub struct CronScheduler {
    core: SchedulerCore,
    expression: String,
    time_zone: Tz,
    /// Also serializes lifecycle calls.
    engine: Mutex<Option<CronEngine>>,
}

impl CronScheduler {
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidCron`] when `expression` does not
    /// parse. An unknown `time_zone` is not an error.
    pub fn new(
        name: &str,
        job: Arc<dyn Job>,
        expression: &str,
        time_zone: Option<&str>,
    ) -> SchedulerResult<Self> {
        let time_zone = resolve_time_zone(time_zone);
        CronJob::new_async_tz(expression, time_zone, |_id, _scheduler| Box::pin(async {}))
            .map_err(|err| SchedulerError::InvalidCron {
                expression: expression.to_string(),
                reason: err.to_string(),
            })?;

        Ok(Self {
            core: SchedulerCore::new(name, job),
            expression: expression.to_string(),
            time_zone,
            engine: Mutex::new(None),
        })
    }

    pub fn from_config(name: &str, job: Arc<dyn Job>, config: &CronConfig) -> SchedulerResult<Self> {
        config
            .validate()
            .map_err(|err| SchedulerError::InvalidConfiguration { message: err.to_string() })?;
        let scheduler = Self::new(name, job, &config.expression, config.time_zone.as_deref())?;
        Ok(scheduler.with_job_timeout(config.job_timeout()))
    }

    pub fn with_metrics(mut self, metrics: Arc<SchedulerMetrics>) -> Self {
        let runner = self.core.runner().clone();
        self.core.set_runner(runner.with_metrics(metrics));
        self
    }

    pub fn with_job_timeout(mut self, timeout: Option<Duration>) -> Self {
        let runner = self.core.runner().clone();
        self.core.set_runner(runner.with_timeout(timeout));
        self
    }

    pub fn with_dispose_timeout(mut self, timeout: Duration) -> Self {
        self.core.set_dispose_timeout(timeout);
        self
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Effective zone after fallback
    pub fn time_zone(&self) -> Tz {
        self.time_zone
    }

    pub fn metrics(&self) -> Arc<SchedulerMetrics> {
        self.core.metrics()
    }

    /// Next firing in the scheduler's zone; `None` while not started.
    pub async fn next_fire_time(&self) -> SchedulerResult<Option<DateTime<Tz>>> {
        let mut engine = self.engine.lock().await;
        let Some(engine) = engine.as_mut() else {
            return Ok(None);
        };
        let next = engine
            .scheduler
            .next_tick_for_job(engine.job_id)
            .await
            .map_err(SchedulerError::cron_engine("read the next tick"))?;
        Ok(next.map(|tick| tick.with_timezone(&self.time_zone)))
    }

    async fn launch_engine(&self, periodic: TaskExecutor) -> SchedulerResult<CronEngine> {
        let scheduler = JobScheduler::new().await.map_err(SchedulerError::cron_engine("create"))?;

        let runner: JobRunner = self.core.runner().clone();
        let running = Arc::new(Mutex::new(()));
        let name: Arc<str> = Arc::from(self.core.name());
        let fire = move |_id, _scheduler| {
            let runner = runner.clone();
            let running = Arc::clone(&running);
            let skipped_by = Arc::clone(&name);
            let submitted = periodic.submit(async move {
                let Ok(_active) = running.try_lock() else {
                    debug!(scheduler = %skipped_by, "previous cron run still active, skipping");
                    return;
                };
                runner.run(TriggerKind::Periodic).await;
            });
            if let Err(err) = submitted {
                debug!(scheduler = %name, error = %err, "cron firing dropped");
            }
            Box::pin(async {}) as Pin<Box<dyn Future<Output = ()> + Send>>
        };
        let job = CronJob::new_async_tz(self.expression.as_str(), self.time_zone, fire)
            .map_err(|err| SchedulerError::InvalidCron {
                expression: self.expression.clone(),
                reason: err.to_string(),
            })?;

        let engine = CronEngine { job_id: job.guid(), scheduler };
        let started = async {
            engine.scheduler.add(job).await.map_err(SchedulerError::cron_engine("add the job"))?;
            engine.scheduler.start().await.map_err(SchedulerError::cron_engine("start"))
        }
        .await;
        if let Err(err) = started {
            self.shutdown_engine(engine, self.core.dispose_deadline()).await;
            return Err(err);
        }

        debug!(
            scheduler = %self.core.name(),
            expression = %self.expression,
            time_zone = %self.time_zone,
            job_id = %engine.job_id,
            "cron job registered"
        );
        Ok(engine)
    }

    /// Shut the engine down by `deadline`. Failures are logged.
    async fn shutdown_engine(&self, mut engine: CronEngine, deadline: Instant) {
        match tokio::time::timeout_at(deadline, engine.scheduler.shutdown()).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                warn!(scheduler = %self.core.name(), error = %err, "cron engine shutdown failed");
            }
            Err(_) => {
                warn!(
                    scheduler = %self.core.name(),
                    timeout_ms = self.core.dispose_timeout().as_millis() as u64,
                    "cron engine shutdown timed out"
                );
            }
        }
    }
}

#[async_trait]
impl Scheduler for CronScheduler {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn state(&self) -> LifecycleState {
        self.core.state()
    }

    #[instrument(skip(self), fields(scheduler = %self.core.name()))]
    async fn initialise(&self) -> SchedulerResult<Transition> {
        let _serial = self.engine.lock().await;
        self.core
            .transition(LifecyclePhase::Initialise, move || async move { self.core.allocate() })
            .await
    }

    #[instrument(skip(self), fields(scheduler = %self.core.name()))]
    async fn start(&self) -> SchedulerResult<Transition> {
        let mut engine = self.engine.lock().await;
        let slot = &mut *engine;
        self.core
            .transition(LifecyclePhase::Start, move || async move {
                let periodic = self.core.begin_periodic()?;
                match self.launch_engine(periodic).await {
                    Ok(launched) => {
                        *slot = Some(launched);
                        Ok(())
                    }
                    Err(err) => {
                        self.core.end_periodic()?;
                        Err(err)
                    }
                }
            })
            .await
    }

    #[instrument(skip(self), fields(scheduler = %self.core.name()))]
    async fn stop(&self) -> SchedulerResult<Transition> {
        let mut engine = self.engine.lock().await;
        let slot = &mut *engine;
        self.core
            .transition(LifecyclePhase::Stop, move || async move {
                if let Some(running) = slot.take() {
                    self.shutdown_engine(running, self.core.dispose_deadline()).await;
                }
                self.core.end_periodic()
            })
            .await
    }

    fn schedule(&self) -> SchedulerResult<()> {
        self.core.schedule()
    }

    #[instrument(skip(self), fields(scheduler = %self.core.name()))]
    async fn dispose(&self) -> Transition {
        let mut engine = self.engine.lock().await;
        let slot = &mut *engine;
        let deadline = self.core.dispose_deadline();
        let result = self
            .core
            .transition(LifecyclePhase::Dispose, move || async move {
                if let Some(running) = slot.take() {
                    self.shutdown_engine(running, deadline).await;
                }
                self.core.release(deadline).await;
                Ok(())
            })
            .await;
        result.unwrap_or_else(|err| {
            tracing::error!(scheduler = %self.core.name(), error = %err, "dispose failed");
            Transition::AlreadyInState(self.core.state())
        })
    }
}

impl std::fmt::Debug for CronScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CronScheduler")
            .field("name", &self.core.name())
            .field("state", &self.core.state())
            .field("expression", &self.expression)
            .field("time_zone", &self.time_zone)
            .finish()
    }
}
