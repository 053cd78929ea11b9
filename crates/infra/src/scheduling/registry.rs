//! Named lookup of live schedulers.
//!
//! Polling schedulers follow the naming convention
//! `"{construct}.polling.{id}"` (see [`polling_scheduler_name`]), which the
//! prefix helpers on [`InMemorySchedulerRegistry`] rely on.

use std::fmt::Display;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, info};

use crate::scheduling::error::{SchedulerError, SchedulerResult};
use crate::scheduling::scheduler::Scheduler;

const POLLING_SEGMENT: &str = ".polling.";

/// Registry key of the `id`-th polling scheduler of `construct`.
pub fn polling_scheduler_name(construct: &str, id: impl Display) -> String {
    format!("{construct}{POLLING_SEGMENT}{id}")
}

/// Where factories publish the schedulers they create.
pub trait SchedulerRegistry: Send + Sync {
    /// # Errors
    ///
    /// [`SchedulerError::AlreadyRegistered`] when `name` is taken.
    fn register(&self, name: &str, scheduler: Arc<dyn Scheduler>) -> SchedulerResult<()>;

    fn unregister(&self, name: &str) -> Option<Arc<dyn Scheduler>>;

    fn get(&self, name: &str) -> Option<Arc<dyn Scheduler>>;

    /// Every scheduler whose name matches `predicate`, ordered by name.
    fn lookup(&self, predicate: &dyn Fn(&str) -> bool) -> Vec<Arc<dyn Scheduler>>;
}

/// Concurrent in-process registry.
#[derive(Default)]
pub struct InMemorySchedulerRegistry {
    schedulers: DashMap<String, Arc<dyn Scheduler>>,
}

impl InMemorySchedulerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.schedulers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schedulers.is_empty()
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> =
            self.schedulers.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }

    /// Every polling scheduler, whatever its construct.
    pub fn polling_schedulers(&self) -> Vec<Arc<dyn Scheduler>> {
        self.lookup(&|name| name.contains(POLLING_SEGMENT))
    }

    /// Polling schedulers belonging to `construct`.
    pub fn polling_schedulers_for(&self, construct: &str) -> Vec<Arc<dyn Scheduler>> {
        let prefix = format!("{construct}{POLLING_SEGMENT}");
        self.lookup(&|name| name.starts_with(&prefix))
    }

    /// Dispose and unregister every scheduler. Returns how many were
    /// disposed by this call.
    pub async fn dispose_all(&self) -> usize {
        let names = self.names();
        let mut disposed = 0;
        for name in names {
            let Some((_, scheduler)) = self.schedulers.remove(&name) else {
                continue;
            };
            if scheduler.dispose().await.is_applied() {
                disposed += 1;
            }
        }
        info!(disposed, "registry disposed its schedulers");
        disposed
    }
}

impl SchedulerRegistry for InMemorySchedulerRegistry {
    fn register(&self, name: &str, scheduler: Arc<dyn Scheduler>) -> SchedulerResult<()> {
        match self.schedulers.entry(name.to_string()) {
            Entry::Occupied(_) => Err(SchedulerError::AlreadyRegistered { name: name.to_string() }),
            Entry::Vacant(slot) => {
                slot.insert(scheduler);
                debug!(scheduler = name, "scheduler registered");
                Ok(())
            }
        }
    }

    fn unregister(&self, name: &str) -> Option<Arc<dyn Scheduler>> {
        self.schedulers.remove(name).map(|(_, scheduler)| scheduler)
    }

    fn get(&self, name: &str) -> Option<Arc<dyn Scheduler>> {
        self.schedulers.get(name).map(|entry| Arc::clone(entry.value()))
    }

    fn lookup(&self, predicate: &dyn Fn(&str) -> bool) -> Vec<Arc<dyn Scheduler>> {
        let mut matches: Vec<(String, Arc<dyn Scheduler>)> = self
            .schedulers
            .iter()
            .filter(|entry| predicate(entry.key()))
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect();
        matches.sort_by(|a, b| a.0.cmp(&b.0));
        matches.into_iter().map(|(_, scheduler)| scheduler).collect()
    }
}

impl std::fmt::Debug for InMemorySchedulerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemorySchedulerRegistry").field("names", &self.names()).finish()
    }
}
