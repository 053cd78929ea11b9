//! Observability for schedulers: tracing setup and lock-free job counters.
//!
//! Record methods return [`MetricsResult`] so a future bounded recorder can
//! refuse a sample without an API break. Callers log a failed recording and
//! carry on; a metric never fails a job.

pub mod metrics;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

pub use metrics::{SchedulerMetrics, SchedulerMetricsSnapshot};

/// Default filter when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "cadence_infra=info,cadence_common=info";

/// Metrics error type
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// A counter reached its maximum value
    #[error("Counter '{metric}' overflowed")]
    Overflow {
        /// Metric name
        metric: &'static str,
    },
}

/// Result type for metrics operations
pub type MetricsResult<T> = Result<T, MetricsError>;

/// Log a failed metric recording without propagating it.
pub(crate) fn log_metric(result: MetricsResult<()>, metric: &'static str) {
    if let Err(err) = result {
        tracing::warn!(metric = metric, error = ?err, "Failed to record scheduler metric");
    }
}

/// Install a global `fmt` subscriber filtered by `RUST_LOG`.
///
/// Returns `false` if a global subscriber was already installed.
pub fn init_tracing() -> bool {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILTER.to_string());
    init_tracing_with(&filter)
}

/// Install a global `fmt` subscriber with an explicit filter directive.
pub fn init_tracing_with(filter: &str) -> bool {
    tracing_subscriber::registry()
        .with(EnvFilter::new(filter))
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .try_init()
        .is_ok()
}
