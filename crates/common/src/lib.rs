//! Shared building blocks for the Cadence scheduling and retry crates.
//!
//! # Feature Tiers
//!
//! Enable cargo features to opt into the tiers you need:
//! - `foundation`: errors, lifecycle state machine, time units
//! - `runtime`: async infrastructure (retry orchestration, test helpers)
//! - `observability`: tracing support (pulled in by `runtime`)

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Foundation tier
// -----------------------------------------------------------------
#[cfg(feature = "foundation")]
pub mod error;
#[cfg(feature = "foundation")]
pub mod lifecycle;
#[cfg(feature = "foundation")]
pub mod time;

// Runtime tier
// --------------------------------------------------------------------
#[cfg(feature = "runtime")]
pub mod retry;

// Testing utilities
// ---------------------------------------------------------------
#[cfg(any(feature = "runtime", feature = "test-utils"))]
pub mod testing;

// Re-export commonly used types and traits for convenience
// ------------------------
#[cfg(feature = "foundation")]
pub use error::{CommonError, CommonResult, ErrorClassification, ErrorSeverity};
#[cfg(feature = "foundation")]
pub use lifecycle::{
    LifecycleError, LifecycleManager, LifecyclePhase, LifecycleResult, LifecycleState,
    PendingTransition, Transition,
};
#[cfg(feature = "runtime")]
pub use retry::{
    classify_error, ErrorClass, Failure, LoggingRetryNotifier, PolicyFactory, PolicyStatus,
    RetryCallback, RetryCancelled, RetryContext, RetryError, RetryNotifier, RetryPolicy,
    RetryResult, RetryTemplate, SimpleRetryPolicyFactory,
};
#[cfg(feature = "foundation")]
pub use time::TimeUnit;
