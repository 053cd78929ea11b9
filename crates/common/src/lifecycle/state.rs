//! Lifecycle states, phases and the transition table.
//!
//! ```text
//!              initialise                 start
//!   Stopped ──────────────► Initialized ─────────► Started
//!      ▲    (Initializing)       │     (Starting)    │
//!      │                         │ start             │ stop
//!      └─────────────────────────┴──── (Stopping) ◄──┘
//!
//!   any non-disposed state ── dispose ──► (Disposing) ──► Disposed
//! ```

use std::fmt;

use thiserror::Error;

/// Lifecycle status of a managed component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LifecycleState {
    /// Not running. Initial state, and the state after a completed stop.
    #[default]
    Stopped,
    /// Execution resources are being allocated
    Initializing,
    /// Resources allocated, never started
    Initialized,
    /// Start in progress
    Starting,
    /// Running
    Started,
    /// Stop in progress
    Stopping,
    /// Dispose in progress
    Disposing,
    /// Terminal; resources released
    Disposed,
}

impl LifecycleState {
    /// True for the in-flight states (`Initializing`, `Starting`, `Stopping`,
    /// `Disposing`).
    pub fn is_transient(self) -> bool {
        matches!(self, Self::Initializing | Self::Starting | Self::Stopping | Self::Disposing)
    }

    /// True once disposal has begun.
    pub fn is_disposed(self) -> bool {
        matches!(self, Self::Disposing | Self::Disposed)
    }

    /// Decide what a `phase` request does from this state.
    ///
    /// Returns `Ok(Some(transient))` when the transition proceeds through
    /// `transient`, `Ok(None)` when the component is already in (or moving
    /// to) the phase's target, and an error for requests the state forbids.
    pub fn plan(
        self,
        phase: LifecyclePhase,
        initialised: bool,
    ) -> Result<Option<LifecycleState>, TransitionRefusal> {
        use LifecycleState as S;

        match phase {
            LifecyclePhase::Initialise => match self {
                S::Disposing | S::Disposed => Err(TransitionRefusal::Disposed),
                S::Stopped if !initialised => Ok(Some(S::Initializing)),
                _ => Ok(None),
            },
            LifecyclePhase::Start => match self {
                S::Disposing | S::Disposed => Err(TransitionRefusal::Disposed),
                S::Starting | S::Started => Ok(None),
                S::Stopped if !initialised => Err(TransitionRefusal::NotInitialised),
                S::Initialized | S::Stopped => Ok(Some(S::Starting)),
                S::Initializing | S::Stopping => Err(TransitionRefusal::Invalid),
            },
            LifecyclePhase::Stop => match self {
                S::Started => Ok(Some(S::Stopping)),
                S::Stopped | S::Initialized | S::Stopping | S::Disposing | S::Disposed => Ok(None),
                S::Initializing | S::Starting => Err(TransitionRefusal::Invalid),
            },
            LifecyclePhase::Dispose => match self {
                S::Disposing | S::Disposed => Ok(None),
                _ => Ok(Some(S::Disposing)),
            },
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stopped => write!(f, "stopped"),
            Self::Initializing => write!(f, "initializing"),
            Self::Initialized => write!(f, "initialized"),
            Self::Starting => write!(f, "starting"),
            Self::Started => write!(f, "started"),
            Self::Stopping => write!(f, "stopping"),
            Self::Disposing => write!(f, "disposing"),
            Self::Disposed => write!(f, "disposed"),
        }
    }
}

/// A lifecycle request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecyclePhase {
    /// Allocate execution resources
    Initialise,
    /// Begin triggering
    Start,
    /// Stop triggering
    Stop,
    /// Release everything; terminal
    Dispose,
}

impl LifecyclePhase {
    /// The state a completed transition lands in.
    pub fn target(self) -> LifecycleState {
        match self {
            Self::Initialise => LifecycleState::Initialized,
            Self::Start => LifecycleState::Started,
            Self::Stop => LifecycleState::Stopped,
            Self::Dispose => LifecycleState::Disposed,
        }
    }
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initialise => write!(f, "initialise"),
            Self::Start => write!(f, "start"),
            Self::Stop => write!(f, "stop"),
            Self::Dispose => write!(f, "dispose"),
        }
    }
}

/// Outcome of a lifecycle call that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum Transition {
    /// The side effect ran and the component moved to the target state.
    Applied,
    /// Nothing ran; the component was already in (or moving to) the target.
    AlreadyInState(LifecycleState),
}

impl Transition {
    /// True when the call performed the transition.
    pub fn is_applied(self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// Why [`LifecycleState::plan`] refused a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransitionRefusal {
    /// The component was disposed
    #[error("component is disposed")]
    Disposed,
    /// Start was requested before initialise
    #[error("component was never initialised")]
    NotInitialised,
    /// The request conflicts with an in-flight transition
    #[error("invalid transition")]
    Invalid,
}
