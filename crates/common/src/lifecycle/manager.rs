//! Guarded lifecycle transitions.
//!
//! [`LifecycleManager`] owns the state of one component. A lifecycle call
//! asks it to [`begin`](LifecycleManager::begin) a phase; the guard check and
//! the move into the transient state happen under one lock, so concurrent
//! readers never observe a half-applied transition. The returned
//! [`PendingTransition`] is committed once the side effect succeeded; dropping
//! it uncommitted rolls the state back.
//!
//! ```
//! # #[cfg(feature = "foundation")]
//! # {
//! use cadence_common::lifecycle::{LifecycleManager, LifecyclePhase, LifecycleState};
//!
//! let lifecycle = LifecycleManager::new("poller");
//! let pending = lifecycle.begin(LifecyclePhase::Initialise).unwrap().unwrap();
//! // ... allocate resources ...
//! let _ = pending.commit();
//! assert_eq!(lifecycle.state(), LifecycleState::Initialized);
//! # }
//! ```

use parking_lot::Mutex;
use thiserror::Error;

use super::state::{LifecyclePhase, LifecycleState, Transition, TransitionRefusal};

/// Lifecycle errors surfaced to callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    /// The request is not valid from the current state
    #[error("cannot {phase} '{component}' while {from}")]
    InvalidTransition { component: String, from: LifecycleState, phase: LifecyclePhase },

    /// Start was requested before initialise
    #[error("'{component}' must be initialised before it can start")]
    NotInitialised { component: String },

    /// The component was disposed and cannot be used again
    #[error("'{component}' is disposed")]
    Disposed { component: String },
}

/// Result alias for lifecycle operations
pub type LifecycleResult<T> = Result<T, LifecycleError>;

#[derive(Debug)]
struct Inner {
    state: LifecycleState,
    initialised: bool,
}

/// Thread-safe lifecycle state holder for a single named component.
#[derive(Debug)]
pub struct LifecycleManager {
    component: String,
    inner: Mutex<Inner>,
}

impl LifecycleManager {
    /// Create a manager in the initial `Stopped` state.
    pub fn new<S: Into<String>>(component: S) -> Self {
        Self {
            component: component.into(),
            inner: Mutex::new(Inner { state: LifecycleState::Stopped, initialised: false }),
        }
    }

    /// Name of the managed component
    pub fn component(&self) -> &str {
        &self.component
    }

    /// Current state
    pub fn state(&self) -> LifecycleState {
        self.inner.lock().state
    }

    /// Whether initialise has completed at some point
    pub fn is_initialised(&self) -> bool {
        self.inner.lock().initialised
    }

    /// Whether the component is started
    pub fn is_started(&self) -> bool {
        self.state() == LifecycleState::Started
    }

    /// Whether disposal has begun or completed
    pub fn is_disposed(&self) -> bool {
        self.state().is_disposed()
    }

    /// Atomically check the guard for `phase` and move into its transient
    /// state.
    ///
    /// `Ok(None)` means the component is already in (or moving to) the target
    /// state and the caller must not run the side effect.
    pub fn begin(&self, phase: LifecyclePhase) -> LifecycleResult<Option<PendingTransition<'_>>> {
        let mut inner = self.inner.lock();
        let from = inner.state;

        match from.plan(phase, inner.initialised) {
            Ok(Some(transient)) => {
                inner.state = transient;
                Ok(Some(PendingTransition { manager: self, phase, from, committed: false }))
            }
            Ok(None) => Ok(None),
            Err(refusal) => Err(self.refusal_error(refusal, from, phase)),
        }
    }

    /// Run `phase` as a whole: guard, side effect, commit or roll back.
    pub fn transition<F, E>(&self, phase: LifecyclePhase, effect: F) -> Result<Transition, E>
    where
        F: FnOnce() -> Result<(), E>,
        E: From<LifecycleError>,
    {
        match self.begin(phase)? {
            Some(pending) => {
                effect()?;
                Ok(pending.commit())
            }
            None => Ok(Transition::AlreadyInState(self.state())),
        }
    }

    fn refusal_error(
        &self,
        refusal: TransitionRefusal,
        from: LifecycleState,
        phase: LifecyclePhase,
    ) -> LifecycleError {
        let component = self.component.clone();
        match refusal {
            TransitionRefusal::Disposed => LifecycleError::Disposed { component },
            TransitionRefusal::NotInitialised => LifecycleError::NotInitialised { component },
            TransitionRefusal::Invalid => LifecycleError::InvalidTransition { component, from, phase },
        }
    }

    fn finish(&self, phase: LifecyclePhase) {
        let mut inner = self.inner.lock();
        inner.state = phase.target();
        if phase == LifecyclePhase::Initialise {
            inner.initialised = true;
        }
    }

    fn roll_back(&self, from: LifecycleState) {
        self.inner.lock().state = from;
    }
}

/// A transition whose side effect is in progress.
///
/// Dropping it without [`commit`](Self::commit) restores the state it
/// started from. Dispose never rolls back: a dropped dispose still lands in
/// `Disposed`.
#[derive(Debug)]
#[must_use = "an uncommitted transition rolls back when dropped"]
pub struct PendingTransition<'a> {
    manager: &'a LifecycleManager,
    phase: LifecyclePhase,
    from: LifecycleState,
    committed: bool,
}

impl PendingTransition<'_> {
    /// The phase being applied
    pub fn phase(&self) -> LifecyclePhase {
        self.phase
    }

    /// The state the transition started from
    pub fn from_state(&self) -> LifecycleState {
        self.from
    }

    /// Move to the phase's target state.
    pub fn commit(mut self) -> Transition {
        self.committed = true;
        self.manager.finish(self.phase);
        Transition::Applied
    }
}

impl Drop for PendingTransition<'_> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        if self.phase == LifecyclePhase::Dispose {
            self.manager.finish(self.phase);
        } else {
            self.manager.roll_back(self.from);
        }
    }
}
