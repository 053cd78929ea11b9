//! Lifecycle-managed schedulers for recurring background work
//!
//! A [`Scheduler`] triggers a [`Job`] either at a fixed rate
//! ([`FixedFrequencyScheduler`]) or on a cron schedule ([`CronScheduler`]),
//! and runs it on demand through [`Scheduler::schedule`] in any lifecycle
//! state. Each scheduler owns two executors:
//! - a periodic executor, accepting work while started
//! - an on-demand executor, accepting work while stopped
//!
//! Lifecycle calls are idempotent and serialized per scheduler. Disposal
//! waits a bounded time for running jobs and then cancels them.
//!
//! Schedulers are normally built through a [`SchedulerFactory`], which
//! applies the cluster hook and post-processors and registers the result in
//! a [`SchedulerRegistry`].

pub mod cluster;
pub mod cron_scheduler;
pub mod error;
pub mod executor;
pub mod factory;
pub mod fixed_frequency;
pub mod job;
pub mod registry;
pub mod scheduler;

pub use cluster::{ClusterCoordinator, ClusterizableScheduler, StandaloneCoordinator};
pub use cron_scheduler::{resolve_time_zone, CronScheduler, FALLBACK_TIME_ZONE};
pub use error::{SchedulerError, SchedulerResult};
pub use executor::{ExecutorPair, TaskExecutor};
pub use factory::{
    create_from_definition, CronSchedulerFactory, FixedFrequencySchedulerFactory, PostProcessor,
    SchedulerFactory, SchedulerFactoryContext, SchedulerFactoryContextBuilder,
};
pub use fixed_frequency::FixedFrequencyScheduler;
pub use job::{job_fn, FnJob, Job, JobRunner, TriggerKind};
pub use registry::{polling_scheduler_name, InMemorySchedulerRegistry, SchedulerRegistry};
pub use scheduler::{Scheduler, DEFAULT_DISPOSE_TIMEOUT};
