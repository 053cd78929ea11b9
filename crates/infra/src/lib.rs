//! # Cadence Infrastructure
//!
//! Schedulers, their executors and configuration, built on the lifecycle
//! and retry primitives of `cadence-common`.
//!
//! This crate contains:
//! - Fixed-rate and cron schedulers with on-demand triggering
//! - Scheduler factories, post-processors, cluster gating and a registry
//! - TOML/JSON configuration loading
//! - Scheduler metrics and tracing setup
//! - A retrying connection helper
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use cadence_infra::config::FixedFrequencyConfig;
//! use cadence_infra::scheduling::{
//!     job_fn, polling_scheduler_name, FixedFrequencySchedulerFactory, InMemorySchedulerRegistry,
//!     SchedulerFactory, SchedulerFactoryContext,
//! };
//!
//! # async fn example() -> cadence_infra::scheduling::SchedulerResult<()> {
//! let registry = Arc::new(InMemorySchedulerRegistry::new());
//! let context = SchedulerFactoryContext::builder().registry(registry.clone()).build();
//! let factory = FixedFrequencySchedulerFactory::new(FixedFrequencyConfig::default(), context);
//!
//! let scheduler =
//!     factory.create(&polling_scheduler_name("orders", 1), job_fn(|| async { Ok(()) }))?;
//! scheduler.initialise().await?;
//! scheduler.start().await?;
//!
//! registry.dispose_all().await;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]

pub mod config;
pub mod connection;
pub mod observability;
pub mod scheduling;

pub use config::{ConfigError, ConfigResult, SchedulingConfig};
pub use connection::{connect_with_retry, Connectable};
pub use scheduling::{Scheduler, SchedulerError, SchedulerResult};
