//! Primary-node gating for schedulers in multi-node deployments.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use cadence_common::{LifecycleState, Transition};
use tracing::{info, instrument};

use crate::scheduling::error::SchedulerResult;
use crate::scheduling::scheduler::Scheduler;

/// Answers whether this process is the node that runs scheduled work.
pub trait ClusterCoordinator: Send + Sync {
    fn is_primary_node(&self) -> bool;
}

/// Single-node deployment: always primary.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandaloneCoordinator;

impl ClusterCoordinator for StandaloneCoordinator {
    fn is_primary_node(&self) -> bool {
        true
    }
}

/// Wraps a scheduler so that `start` only reaches it on the primary node.
///
/// On a secondary node `start` reports `AlreadyInState` and remembers the
/// request; [`promote`](Self::promote) replays it once the node becomes
/// primary. Every other call delegates unconditionally.
pub struct ClusterizableScheduler {
    inner: Arc<dyn Scheduler>,
    coordinator: Arc<dyn ClusterCoordinator>,
    start_requested: AtomicBool,
}

impl ClusterizableScheduler {
    pub fn new(inner: Arc<dyn Scheduler>, coordinator: Arc<dyn ClusterCoordinator>) -> Self {
        Self { inner, coordinator, start_requested: AtomicBool::new(false) }
    }

    pub fn inner(&self) -> &Arc<dyn Scheduler> {
        &self.inner
    }

    /// Whether a start was held back on a secondary node
    pub fn is_start_pending(&self) -> bool {
        self.start_requested.load(Ordering::SeqCst)
    }

    /// Start the wrapped scheduler if a start is pending and this node is
    /// now primary.
    pub async fn promote(&self) -> SchedulerResult<Transition> {
        if !self.coordinator.is_primary_node()
            || !self.start_requested.swap(false, Ordering::SeqCst)
        {
            return Ok(Transition::AlreadyInState(self.inner.state()));
        }
        info!(scheduler = self.inner.name(), "node promoted to primary, starting held scheduler");
        self.inner.start().await
    }
}

#[async_trait]
impl Scheduler for ClusterizableScheduler {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn state(&self) -> LifecycleState {
        self.inner.state()
    }

    async fn initialise(&self) -> SchedulerResult<Transition> {
        self.inner.initialise().await
    }

    #[instrument(skip(self), fields(scheduler = %self.inner.name()))]
    async fn start(&self) -> SchedulerResult<Transition> {
        if self.coordinator.is_primary_node() {
            self.start_requested.store(false, Ordering::SeqCst);
            return self.inner.start().await;
        }
        self.start_requested.store(true, Ordering::SeqCst);
        info!(scheduler = self.inner.name(), "not the primary node, start deferred");
        Ok(Transition::AlreadyInState(self.inner.state()))
    }

    async fn stop(&self) -> SchedulerResult<Transition> {
        self.start_requested.store(false, Ordering::SeqCst);
        self.inner.stop().await
    }

    fn schedule(&self) -> SchedulerResult<()> {
        self.inner.schedule()
    }

    async fn dispose(&self) -> Transition {
        self.start_requested.store(false, Ordering::SeqCst);
        self.inner.dispose().await
    }
}

impl std::fmt::Debug for ClusterizableScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterizableScheduler")
            .field("name", &self.inner.name())
            .field("state", &self.inner.state())
            .field("start_requested", &self.is_start_pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for scheduling::cluster.
    use std::time::Duration;

    use super::*;
    use crate::scheduling::{job_fn, FixedFrequencyScheduler};

    #[derive(Default)]
    struct SwitchableCoordinator {
        primary: AtomicBool,
    }

    impl ClusterCoordinator for SwitchableCoordinator {
        fn is_primary_node(&self) -> bool {
            self.primary.load(Ordering::SeqCst)
        }
    }

    fn wrapped(coordinator: Arc<dyn ClusterCoordinator>) -> ClusterizableScheduler {
        let inner = FixedFrequencyScheduler::new(
            "cluster.polling.1",
            job_fn(|| async { Ok(()) }),
            Duration::from_secs(60),
            Duration::ZERO,
        )
        .unwrap();
        ClusterizableScheduler::new(Arc::new(inner), coordinator)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn primary_node_starts_immediately() {
        let scheduler = wrapped(Arc::new(StandaloneCoordinator));
        scheduler.initialise().await.unwrap();
        assert!(scheduler.start().await.unwrap().is_applied());
        assert_eq!(scheduler.state(), LifecycleState::Started);
        scheduler.dispose().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn secondary_node_defers_until_promoted() {
        let coordinator = Arc::new(SwitchableCoordinator::default());
        let scheduler = wrapped(coordinator.clone());
        scheduler.initialise().await.unwrap();

        let outcome = scheduler.start().await.unwrap();
        assert_eq!(outcome, Transition::AlreadyInState(LifecycleState::Initialized));
        assert!(scheduler.is_start_pending());

        assert!(!scheduler.promote().await.unwrap().is_applied());

        coordinator.primary.store(true, Ordering::SeqCst);
        assert!(scheduler.promote().await.unwrap().is_applied());
        assert_eq!(scheduler.state(), LifecycleState::Started);
        assert!(!scheduler.is_start_pending());
        scheduler.dispose().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn stop_cancels_a_deferred_start() {
        let scheduler = wrapped(Arc::new(SwitchableCoordinator::default()));
        scheduler.initialise().await.unwrap();
        let _ = scheduler.start().await.unwrap();
        let _ = scheduler.stop().await.unwrap();
        assert!(!scheduler.is_start_pending());
        scheduler.dispose().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn schedule_is_not_gated() {
        let scheduler = wrapped(Arc::new(SwitchableCoordinator::default()));
        scheduler.initialise().await.unwrap();
        assert!(scheduler.schedule().is_ok());
        scheduler.dispose().await;
    }
}
