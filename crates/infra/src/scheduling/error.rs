//! Scheduler error types

use cadence_common::{ErrorClassification, ErrorSeverity, LifecycleError};
use thiserror::Error;
use tokio_cron_scheduler::JobSchedulerError;

/// Scheduler-specific errors
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Execution resources could not be allocated
    #[error("Failed to allocate executor '{name}': {reason}")]
    AllocationFailed { name: String, reason: String },

    /// A factory or post-processor produced no scheduler
    #[error("Failed to create scheduler '{name}': {reason}")]
    CreationFailed { name: String, reason: String },

    /// Work was submitted to an executor that no longer accepts it
    #[error("Executor '{name}' is shut down")]
    ExecutorShutdown { name: String },

    /// The cron expression could not be parsed
    #[error("Invalid cron expression '{expression}': {reason}")]
    InvalidCron { expression: String, reason: String },

    /// Scheduler configuration values are out of range
    #[error("Invalid scheduler configuration: {message}")]
    InvalidConfiguration { message: String },

    /// The cron engine rejected an operation
    #[error("Cron engine failed to {operation}: {source}")]
    CronEngine {
        operation: &'static str,
        #[source]
        source: JobSchedulerError,
    },

    /// A scheduler with the same name is already registered
    #[error("Scheduler '{name}' is already registered")]
    AlreadyRegistered { name: String },

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

impl SchedulerError {
    pub(crate) fn cron_engine(operation: &'static str) -> impl FnOnce(JobSchedulerError) -> Self {
        move |source| Self::CronEngine { operation, source }
    }
}

impl ErrorClassification for SchedulerError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::CronEngine { .. })
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::AllocationFailed { .. } | Self::CreationFailed { .. } => ErrorSeverity::Critical,
            Self::ExecutorShutdown { .. } | Self::AlreadyRegistered { .. } => {
                ErrorSeverity::Warning
            }
            _ => ErrorSeverity::Error,
        }
    }
}

/// Convenience type alias for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;
