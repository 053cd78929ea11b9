//! Per-scheduler job counters.
//!
//! Counters are independent `AtomicU64`s; `Relaxed` ordering is enough since
//! no metric is derived from two of them at once.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::observability::{MetricsError, MetricsResult};

/// Counters shared by every run of one scheduler's job.
#[derive(Debug, Default)]
pub struct SchedulerMetrics {
    periodic_runs: AtomicU64,
    on_demand_runs: AtomicU64,
    job_successes: AtomicU64,
    job_failures: AtomicU64,
    job_timeouts: AtomicU64,
}

/// Point-in-time copy of [`SchedulerMetrics`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SchedulerMetricsSnapshot {
    pub periodic_runs: u64,
    pub on_demand_runs: u64,
    pub job_successes: u64,
    pub job_failures: u64,
    pub job_timeouts: u64,
}

impl SchedulerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a run started by the periodic trigger
    pub fn record_periodic_run(&self) -> MetricsResult<()> {
        increment(&self.periodic_runs, "scheduler.job.periodic")
    }

    /// Record a run started by `schedule()`
    pub fn record_on_demand_run(&self) -> MetricsResult<()> {
        increment(&self.on_demand_runs, "scheduler.job.on_demand")
    }

    pub fn record_success(&self) -> MetricsResult<()> {
        increment(&self.job_successes, "scheduler.job.success")
    }

    pub fn record_failure(&self) -> MetricsResult<()> {
        increment(&self.job_failures, "scheduler.job.failure")
    }

    pub fn record_timeout(&self) -> MetricsResult<()> {
        increment(&self.job_timeouts, "scheduler.job.timeout")
    }

    /// Total runs regardless of trigger
    pub fn total_runs(&self) -> u64 {
        self.periodic_runs
            .load(Ordering::Relaxed)
            .saturating_add(self.on_demand_runs.load(Ordering::Relaxed))
    }

    pub fn snapshot(&self) -> SchedulerMetricsSnapshot {
        SchedulerMetricsSnapshot {
            periodic_runs: self.periodic_runs.load(Ordering::Relaxed),
            on_demand_runs: self.on_demand_runs.load(Ordering::Relaxed),
            job_successes: self.job_successes.load(Ordering::Relaxed),
            job_failures: self.job_failures.load(Ordering::Relaxed),
            job_timeouts: self.job_timeouts.load(Ordering::Relaxed),
        }
    }
}

fn increment(counter: &AtomicU64, metric: &'static str) -> MetricsResult<()> {
    counter
        .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |value| value.checked_add(1))
        .map(|_| ())
        .map_err(|_| MetricsError::Overflow { metric })
}
