//! Periodic scheduler firing at a fixed rate.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use cadence_infra::scheduling::{job_fn, FixedFrequencyScheduler, Scheduler, SchedulerResult};
//!
//! # async fn example() -> SchedulerResult<()> {
//! let scheduler = FixedFrequencyScheduler::new(
//!     "orders.polling.1",
//!     job_fn(|| async { Ok(()) }),
//!     Duration::from_secs(5),
//!     Duration::ZERO,
//! )?;
//!
//! scheduler.initialise().await?;
//! scheduler.start().await?;
//! scheduler.schedule()?; // extra run now
//! scheduler.stop().await?;
//! scheduler.dispose().await;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cadence_common::{LifecyclePhase, LifecycleState, Transition};
use tokio::sync::Mutex;
use tracing::instrument;

use crate::config::FixedFrequencyConfig;
use crate::observability::SchedulerMetrics;
use crate::scheduling::error::{SchedulerError, SchedulerResult};
use crate::scheduling::job::{Job, TriggerKind};
use crate::scheduling::scheduler::{Scheduler, SchedulerCore};

/// Scheduler that runs its job every `frequency` after `start_delay`.
///
/// While stopped, [`schedule`](Scheduler::schedule) still runs the job
/// through a separate on-demand executor, which is replaced on every stop.
pub struct FixedFrequencyScheduler {
    core: SchedulerCore,
    frequency: Duration,
    start_delay: Duration,
    transitions: Mutex<()>,
}

impl FixedFrequencyScheduler {
    /// # Errors
    ///
    /// Returns [`SchedulerError::InvalidConfiguration`] for a zero frequency.
    pub fn new(
        name: &str,
        job: Arc<dyn Job>,
        frequency: Duration,
        start_delay: Duration,
    ) -> SchedulerResult<Self> {
        if frequency.is_zero() {
            return Err(SchedulerError::InvalidConfiguration {
                message: format!("scheduler '{name}' needs a frequency greater than zero"),
            });
        }
        Ok(Self {
            core: SchedulerCore::new(name, job),
            frequency,
            start_delay,
            transitions: Mutex::new(()),
        })
    }

    /// Build from configuration, converting through its time unit.
    pub fn from_config(
        name: &str,
        job: Arc<dyn Job>,
        config: &FixedFrequencyConfig,
    ) -> SchedulerResult<Self> {
        config
            .validate()
            .map_err(|err| SchedulerError::InvalidConfiguration { message: err.to_string() })?;
        let scheduler = Self::new(name, job, config.period(), config.initial_delay())?;
        Ok(scheduler.with_job_timeout(config.job_timeout()))
    }

    /// Share `metrics` instead of the scheduler's own counters.
    pub fn with_metrics(mut self, metrics: Arc<SchedulerMetrics>) -> Self {
        let runner = self.core.runner().clone();
        self.core.set_runner(runner.with_metrics(metrics));
        self
    }

    /// Bound every job run by `timeout`.
    pub fn with_job_timeout(mut self, timeout: Option<Duration>) -> Self {
        let runner = self.core.runner().clone();
        self.core.set_runner(runner.with_timeout(timeout));
        self
    }

    /// Override the graceful-termination wait used by dispose.
    pub fn with_dispose_timeout(mut self, timeout: Duration) -> Self {
        self.core.set_dispose_timeout(timeout);
        self
    }

    pub fn frequency(&self) -> Duration {
        self.frequency
    }

    pub fn start_delay(&self) -> Duration {
        self.start_delay
    }

    pub fn metrics(&self) -> Arc<SchedulerMetrics> {
        self.core.metrics()
    }
}

#[async_trait]
impl Scheduler for FixedFrequencyScheduler {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn state(&self) -> LifecycleState {
        self.core.state()
    }

    #[instrument(skip(self), fields(scheduler = %self.core.name()))]
    async fn initialise(&self) -> SchedulerResult<Transition> {
        let _serial = self.transitions.lock().await;
        self.core
            .transition(LifecyclePhase::Initialise, move || async move { self.core.allocate() })
            .await
    }

    #[instrument(skip(self), fields(scheduler = %self.core.name()))]
    async fn start(&self) -> SchedulerResult<Transition> {
        let _serial = self.transitions.lock().await;
        self.core
            .transition(LifecyclePhase::Start, move || async move {
                let periodic = self.core.begin_periodic()?;
                let runner = self.core.runner().clone();
                let scheduled =
                    periodic.schedule_at_fixed_rate(self.start_delay, self.frequency, move || {
                        let runner = runner.clone();
                        async move { runner.run(TriggerKind::Periodic).await }
                    });
                if let Err(err) = scheduled {
                    self.core.end_periodic()?;
                    return Err(err);
                }
                Ok(())
            })
            .await
    }

    #[instrument(skip(self), fields(scheduler = %self.core.name()))]
    async fn stop(&self) -> SchedulerResult<Transition> {
        let _serial = self.transitions.lock().await;
        self.core
            .transition(LifecyclePhase::Stop, move || async move { self.core.end_periodic() })
            .await
    }

    fn schedule(&self) -> SchedulerResult<()> {
        self.core.schedule()
    }

    #[instrument(skip(self), fields(scheduler = %self.core.name()))]
    async fn dispose(&self) -> Transition {
        let _serial = self.transitions.lock().await;
        let deadline = self.core.dispose_deadline();
        let result = self
            .core
            .transition(LifecyclePhase::Dispose, move || async move {
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

impl std::fmt::Debug for FixedFrequencyScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixedFrequencyScheduler")
            .field("name", &self.core.name())
            .field("state", &self.core.state())
            .field("frequency", &self.frequency)
            .field("start_delay", &self.start_delay)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for scheduling::fixed_frequency.
    use std::sync::atomic::{AtomicU32, Ordering};

    use cadence_common::testing::wait_until;
    use cadence_common::LifecycleError;

    use super::*;
    use crate::scheduling::job_fn;

    fn counting_job() -> (Arc<dyn Job>, Arc<AtomicU32>) {
        let runs = Arc::new(AtomicU32::new(0));
        let seen = runs.clone();
        let job = job_fn(move || {
            let seen = seen.clone();
            async move {
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });
        (job, runs)
    }

    fn scheduler(frequency_ms: u64) -> (FixedFrequencyScheduler, Arc<AtomicU32>) {
        let (job, runs) = counting_job();
        let scheduler = FixedFrequencyScheduler::new(
            "test.polling.1",
            job,
            Duration::from_millis(frequency_ms),
            Duration::ZERO,
        )
        .unwrap();
        (scheduler, runs)
    }

    #[test]
    fn zero_frequency_is_rejected() {
        let (job, _) = counting_job();
        let err = FixedFrequencyScheduler::new("bad", job, Duration::ZERO, Duration::ZERO).unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidConfiguration { .. }));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn start_before_initialise_fails() {
        let (scheduler, _) = scheduler(10);
        let err = scheduler.start().await.unwrap_err();
        assert!(matches!(err, SchedulerError::Lifecycle(LifecycleError::NotInitialised { .. })));
        assert_eq!(scheduler.state(), LifecycleState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn start_twice_keeps_one_trigger() {
        let (scheduler, runs) = scheduler(100);
        scheduler.initialise().await.unwrap();
        assert!(scheduler.start().await.unwrap().is_applied());
        assert_eq!(
            scheduler.start().await.unwrap(),
            Transition::AlreadyInState(LifecycleState::Started)
        );

        tokio::time::sleep(Duration::from_millis(450)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 5);
        scheduler.dispose().await;
    }

    #[tokio::test(start_paused = true)]
    async fn start_delay_postpones_first_run() {
        let (job, runs) = counting_job();
        let scheduler = FixedFrequencyScheduler::new(
            "delayed",
            job,
            Duration::from_millis(100),
            Duration::from_millis(1000),
        )
        .unwrap();
        scheduler.initialise().await.unwrap();
        scheduler.start().await.unwrap();

        tokio::time::sleep(Duration::from_millis(900)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        scheduler.dispose().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stop_halts_periodic_runs_and_is_idempotent() {
        let (scheduler, runs) = scheduler(100);
        scheduler.initialise().await.unwrap();
        scheduler.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(250)).await;

        assert!(scheduler.stop().await.unwrap().is_applied());
        assert_eq!(
            scheduler.stop().await.unwrap(),
            Transition::AlreadyInState(LifecycleState::Stopped)
        );

        let after_stop = runs.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(runs.load(Ordering::SeqCst), after_stop);
        scheduler.dispose().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn schedule_while_stopped_runs_once_on_demand() {
        let (scheduler, runs) = scheduler(60_000);
        scheduler.initialise().await.unwrap();
        scheduler.start().await.unwrap();
        scheduler.stop().await.unwrap();
        let before = runs.load(Ordering::SeqCst);

        scheduler.schedule().unwrap();

        assert!(
            wait_until(Duration::from_secs(2), Duration::from_millis(5), || {
                runs.load(Ordering::SeqCst) == before + 1
            })
            .await
        );
        let snapshot = scheduler.metrics().snapshot();
        assert_eq!(snapshot.on_demand_runs, 1);
        scheduler.dispose().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn schedule_while_started_runs_alongside_periodic() {
        let (scheduler, runs) = scheduler(60_000);
        scheduler.initialise().await.unwrap();
        scheduler.start().await.unwrap();

        scheduler.schedule().unwrap();
        scheduler.schedule().unwrap();

        assert!(
            wait_until(Duration::from_secs(2), Duration::from_millis(5), || {
                scheduler.metrics().snapshot().on_demand_runs == 2
            })
            .await
        );
        assert!(runs.load(Ordering::SeqCst) >= 2);
        scheduler.dispose().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn schedule_before_initialise_fails() {
        let (scheduler, _) = scheduler(10);
        assert!(matches!(
            scheduler.schedule(),
            Err(SchedulerError::Lifecycle(LifecycleError::NotInitialised { .. }))
        ));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn disposed_scheduler_refuses_everything() {
        let (scheduler, _) = scheduler(10);
        scheduler.initialise().await.unwrap();
        scheduler.start().await.unwrap();
        assert!(scheduler.dispose().await.is_applied());
        assert_eq!(scheduler.state(), LifecycleState::Disposed);

        assert!(matches!(
            scheduler.start().await,
            Err(SchedulerError::Lifecycle(LifecycleError::Disposed { .. }))
        ));
        assert!(scheduler.schedule().is_err());
        assert!(!scheduler.stop().await.unwrap().is_applied());
        assert!(!scheduler.dispose().await.is_applied());
    }

    #[tokio::test(start_paused = true)]
    async fn dispose_is_bounded_when_job_hangs() {
        let job = job_fn(|| async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        });
        let scheduler =
            FixedFrequencyScheduler::new("hung", job, Duration::from_millis(10), Duration::ZERO)
                .unwrap()
                .with_dispose_timeout(Duration::from_millis(500));
        scheduler.initialise().await.unwrap();
        scheduler.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let started = tokio::time::Instant::now();
        scheduler.dispose().await;
        assert!(started.elapsed() <= Duration::from_millis(600));
        assert_eq!(scheduler.state(), LifecycleState::Disposed);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn from_config_converts_time_unit() {
        let (job, _) = counting_job();
        let config = FixedFrequencyConfig {
            frequency: 3,
            start_delay: 2,
            time_unit: cadence_common::TimeUnit::Seconds,
            job_timeout_ms: None,
        };
        let scheduler = FixedFrequencyScheduler::from_config("cfg", job, &config).unwrap();
        assert_eq!(scheduler.frequency(), Duration::from_secs(3));
        assert_eq!(scheduler.start_delay(), Duration::from_secs(2));
    }
}
