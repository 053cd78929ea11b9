//! Shared helpers for cadence-infra integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Once};
use std::time::Duration;

use cadence_infra::scheduling::{job_fn, Job};

static TRACING: Once = Once::new();

/// Install a test subscriber once per binary; honours `RUST_LOG`.
pub fn init_test_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Job counting its runs, optionally taking `work` per run.
pub struct CountingJob {
    runs: Arc<AtomicU32>,
    work: Duration,
}

impl CountingJob {
    pub fn new() -> Self {
        Self::taking(Duration::ZERO)
    }

    pub fn taking(work: Duration) -> Self {
        Self { runs: Arc::new(AtomicU32::new(0)), work }
    }

    pub fn runs(&self) -> u32 {
        self.runs.load(Ordering::SeqCst)
    }

    pub fn counter(&self) -> Arc<AtomicU32> {
        Arc::clone(&self.runs)
    }

    pub fn job(&self) -> Arc<dyn Job> {
        let runs = Arc::clone(&self.runs);
        let work = self.work;
        job_fn(move || {
            let runs = Arc::clone(&runs);
            async move {
                if !work.is_zero() {
                    tokio::time::sleep(work).await;
                }
                runs.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
    }
}

impl Default for CountingJob {
    fn default() -> Self {
        Self::new()
    }
}

/// Job that always fails.
pub fn failing_job() -> Arc<dyn Job> {
    job_fn(|| async { Err(anyhow::anyhow!("downstream unavailable")) })
}
