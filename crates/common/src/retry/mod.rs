//! Retry orchestration.
//!
//! A [`RetryTemplate`] runs a [`RetryCallback`] in a loop. After every failed
//! attempt the failure is classified: cancelled attempts end the session at
//! once, anything else is handed to the session's [`RetryPolicy`], which
//! either waits and answers [`PolicyStatus::ok`] or gives up with
//! [`PolicyStatus::exhausted`].
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use async_trait::async_trait;
//! use cadence_common::retry::{RetryCallback, RetryContext, RetryTemplate, SimpleRetryPolicyFactory};
//!
//! struct Connect;
//!
//! #[async_trait]
//! impl RetryCallback for Connect {
//!     async fn do_work(&self, _context: &mut RetryContext) -> anyhow::Result<()> {
//!         Ok(())
//!     }
//!
//!     fn work_description(&self) -> String {
//!         "connect to broker".into()
//!     }
//! }
//!
//! # async fn run() -> anyhow::Result<()> {
//! let factory = SimpleRetryPolicyFactory::new(3, Duration::from_millis(500))?;
//! let template = RetryTemplate::new(Arc::new(factory));
//! let context = template.execute(&Connect).await?;
//! assert!(context.is_ok());
//! # Ok(())
//! # }
//! ```

pub mod backoff;
pub mod classify;
pub mod constants;
pub mod context;
pub mod error;
pub mod failure;
pub mod notifier;
pub mod policy;
pub mod status;
pub mod template;

pub use backoff::{BackoffStrategy, Jitter};
pub use classify::{classify_error, ErrorClass, ErrorClassifier, RetryCancelled};
pub use constants::RETRY_COUNT_FOREVER;
pub use context::RetryContext;
pub use error::{RetryError, RetryResult};
pub use failure::Failure;
pub use notifier::{LoggingRetryNotifier, RetryNotifier};
pub use policy::{
    BackoffRetryPolicyFactory, NoRetryPolicyFactory, PolicyFactory, RetryPolicy,
    SimpleRetryPolicyFactory,
};
pub use status::PolicyStatus;
pub use template::{RetryCallback, RetryTemplate};
