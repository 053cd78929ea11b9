//! Scheduler creation with enrichment and registration.
//!
//! [`SchedulerFactory::create`] is a template method: a concrete factory
//! only builds the bare scheduler in [`do_create`](SchedulerFactory::do_create).
//! `create` then wraps it in the cluster hook, applies every post-processor
//! in order and registers the result.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::{
    ConfigError, CronConfig, FixedFrequencyConfig, SchedulerDefinition, TriggerConfig,
};
use crate::scheduling::cluster::{ClusterCoordinator, ClusterizableScheduler};
use crate::scheduling::cron_scheduler::CronScheduler;
use crate::scheduling::error::{SchedulerError, SchedulerResult};
use crate::scheduling::fixed_frequency::FixedFrequencyScheduler;
use crate::scheduling::job::Job;
use crate::scheduling::registry::SchedulerRegistry;
use crate::scheduling::scheduler::Scheduler;

/// Enrichment step applied to every created scheduler. Returning `None`
/// aborts the creation.
pub type PostProcessor =
    Arc<dyn Fn(Arc<dyn Scheduler>) -> Option<Arc<dyn Scheduler>> + Send + Sync>;

/// Collaborators shared by the factories of one deployment.
#[derive(Clone, Default)]
pub struct SchedulerFactoryContext {
    post_processors: Vec<PostProcessor>,
    registry: Option<Arc<dyn SchedulerRegistry>>,
    coordinator: Option<Arc<dyn ClusterCoordinator>>,
}

impl SchedulerFactoryContext {
    pub fn builder() -> SchedulerFactoryContextBuilder {
        SchedulerFactoryContextBuilder::default()
    }

    pub fn post_processors(&self) -> &[PostProcessor] {
        &self.post_processors
    }

    pub fn registry(&self) -> Option<&Arc<dyn SchedulerRegistry>> {
        self.registry.as_ref()
    }

    pub fn coordinator(&self) -> Option<&Arc<dyn ClusterCoordinator>> {
        self.coordinator.as_ref()
    }
}

impl std::fmt::Debug for SchedulerFactoryContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchedulerFactoryContext")
            .field("post_processors", &self.post_processors.len())
            .field("registry", &self.registry.is_some())
            .field("coordinator", &self.coordinator.is_some())
            .finish()
    }
}

/// Builder for [`SchedulerFactoryContext`]
#[derive(Default)]
pub struct SchedulerFactoryContextBuilder {
    context: SchedulerFactoryContext,
}

impl SchedulerFactoryContextBuilder {
    /// Append a post-processor; they run in insertion order.
    pub fn post_processor<F>(mut self, processor: F) -> Self
    where
        F: Fn(Arc<dyn Scheduler>) -> Option<Arc<dyn Scheduler>> + Send + Sync + 'static,
    {
        self.context.post_processors.push(Arc::new(processor));
        self
    }

    pub fn registry(mut self, registry: Arc<dyn SchedulerRegistry>) -> Self {
        self.context.registry = Some(registry);
        self
    }

    /// Wrap every created scheduler so it only starts on the primary node.
    pub fn coordinator(mut self, coordinator: Arc<dyn ClusterCoordinator>) -> Self {
        self.context.coordinator = Some(coordinator);
        self
    }

    pub fn build(self) -> SchedulerFactoryContext {
        self.context
    }
}

/// Builds, enriches and registers schedulers.
pub trait SchedulerFactory: Send + Sync {
    fn context(&self) -> &SchedulerFactoryContext;

    /// Build the bare scheduler. Must not start or stop it.
    fn do_create(
        &self,
        name: &str,
        job: Arc<dyn Job>,
    ) -> SchedulerResult<Option<Arc<dyn Scheduler>>>;

    /// Build the scheduler, enrich it and register it under `name`.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::CreationFailed`] when `do_create` or a
    /// post-processor yields nothing; nothing is registered in that case.
    /// Registration failures are logged, not returned.
    fn create(&self, name: &str, job: Arc<dyn Job>) -> SchedulerResult<Arc<dyn Scheduler>> {
        let mut scheduler =
            self.do_create(name, job)?.ok_or_else(|| SchedulerError::CreationFailed {
                name: name.to_string(),
                reason: "factory produced no scheduler".to_string(),
            })?;

        let context = self.context();
        if let Some(coordinator) = context.coordinator() {
            scheduler = Arc::new(ClusterizableScheduler::new(scheduler, Arc::clone(coordinator)));
        }

        for (index, processor) in context.post_processors().iter().enumerate() {
            scheduler = processor(scheduler).ok_or_else(|| SchedulerError::CreationFailed {
                name: name.to_string(),
                reason: format!("post-processor #{index} returned no scheduler"),
            })?;
        }

        if let Some(registry) = context.registry() {
            if let Err(err) = registry.register(name, Arc::clone(&scheduler)) {
                warn!(scheduler = name, error = %err, "failed to register scheduler");
            }
        }

        debug!(scheduler = name, "scheduler created");
        Ok(scheduler)
    }
}

/// Factory for [`FixedFrequencyScheduler`]s sharing one configuration.
#[derive(Debug, Clone)]
pub struct FixedFrequencySchedulerFactory {
    config: FixedFrequencyConfig,
    context: SchedulerFactoryContext,
}

impl FixedFrequencySchedulerFactory {
    pub fn new(config: FixedFrequencyConfig, context: SchedulerFactoryContext) -> Self {
        Self { config, context }
    }

    pub fn config(&self) -> &FixedFrequencyConfig {
        &self.config
    }
}

impl SchedulerFactory for FixedFrequencySchedulerFactory {
    fn context(&self) -> &SchedulerFactoryContext {
        &self.context
    }

    fn do_create(
        &self,
        name: &str,
        job: Arc<dyn Job>,
    ) -> SchedulerResult<Option<Arc<dyn Scheduler>>> {
        let scheduler = FixedFrequencyScheduler::from_config(name, job, &self.config)?;
        Ok(Some(Arc::new(scheduler)))
    }
}

/// Factory for [`CronScheduler`]s sharing one configuration.
#[derive(Debug, Clone)]
pub struct CronSchedulerFactory {
    config: CronConfig,
    context: SchedulerFactoryContext,
}

impl CronSchedulerFactory {
    pub fn new(config: CronConfig, context: SchedulerFactoryContext) -> Self {
        Self { config, context }
    }

    pub fn config(&self) -> &CronConfig {
        &self.config
    }
}

impl SchedulerFactory for CronSchedulerFactory {
    fn context(&self) -> &SchedulerFactoryContext {
        &self.context
    }

    fn do_create(
        &self,
        name: &str,
        job: Arc<dyn Job>,
    ) -> SchedulerResult<Option<Arc<dyn Scheduler>>> {
        let scheduler = CronScheduler::from_config(name, job, &self.config)?;
        Ok(Some(Arc::new(scheduler)))
    }
}

/// Create the scheduler a configuration entry describes.
pub fn create_from_definition(
    definition: &SchedulerDefinition,
    job: Arc<dyn Job>,
    context: &SchedulerFactoryContext,
) -> SchedulerResult<Arc<dyn Scheduler>> {
    let trigger = definition.trigger().map_err(invalid_definition)?;
    match trigger {
        TriggerConfig::FixedFrequency(config) => {
            FixedFrequencySchedulerFactory::new(config.clone(), context.clone())
                .create(&definition.name, job)
        }
        TriggerConfig::Cron(config) => {
            CronSchedulerFactory::new(config.clone(), context.clone()).create(&definition.name, job)
        }
    }
}

fn invalid_definition(err: ConfigError) -> SchedulerError {
    SchedulerError::InvalidConfiguration { message: err.to_string() }
}
