//! Shareable attempt failure.
//!
//! A failed attempt is observed by the context, the notifier, the policy and
//! finally the exhaustion error. `anyhow::Error` cannot be cloned, so the
//! retry layer passes it around behind an [`Arc`].

use std::fmt;
use std::sync::Arc;

/// The error returned by one failed attempt.
#[derive(Clone)]
pub struct Failure(Arc<anyhow::Error>);

impl Failure {
    /// The underlying error
    pub fn inner(&self) -> &anyhow::Error {
        &self.0
    }

    /// Whether any cause in the chain is an `E`.
    pub fn is<E>(&self) -> bool
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        self.0.chain().any(|cause| cause.is::<E>())
    }
}

impl From<anyhow::Error> for Failure {
    fn from(error: anyhow::Error) -> Self {
        Self(Arc::new(error))
    }
}

impl fmt::Debug for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.0, f)
    }
}

impl std::error::Error for Failure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        (**self.0).source()
    }
}
