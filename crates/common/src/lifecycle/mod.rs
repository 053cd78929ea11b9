//! Lifecycle management for long-lived components
//!
//! - **[`state`]**: lifecycle states, phases and the transition table
//! - **[`manager`]**: thread-safe guarded transitions with rollback

pub mod manager;
pub mod state;

pub use manager::{LifecycleError, LifecycleManager, LifecycleResult, PendingTransition};
pub use state::{LifecyclePhase, LifecycleState, Transition, TransitionRefusal};
