//! Testing utilities and helpers
//!
//! - **[`async_utils`]**: polling and timeout helpers for async tests
//! - **[`retry`]**: recording notifier and scripted callbacks for exercising
//!   [`RetryTemplate`](crate::retry::RetryTemplate)
//!
//! ## Usage
//!
//! ```rust
//! # #[cfg(feature = "runtime")]
//! # {
//! use cadence_common::testing::{RecordingNotifier, ScriptedCallback};
//!
//! let notifier = RecordingNotifier::new();
//! let callback = ScriptedCallback::failing_times("connect", 2);
//! assert_eq!(notifier.failures(), 0);
//! assert_eq!(callback.calls(), 0);
//! # }
//! ```

pub mod async_utils;
pub mod retry;

pub use async_utils::{timeout_ok, wait_until};
pub use retry::{Outcome, RecordingNotifier, ScriptedCallback};
