//! Failure classification for the retry loop.
//!
//! The template does not consult the policy for cancelled attempts; it stops
//! at once. Classification walks the whole `anyhow` cause chain.

use std::io;

use thiserror::Error;

use crate::error::CommonError;

/// Outcome of classifying an attempt failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Ask the policy whether to try again
    Retryable,
    /// The attempt was interrupted; abort the session
    Cancelled,
}

/// Marker error a callback returns (or wraps) to abort its retry session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("retry cancelled: {reason}")]
pub struct RetryCancelled {
    reason: String,
}

impl RetryCancelled {
    pub fn new<S: Into<String>>(reason: S) -> Self {
        Self { reason: reason.into() }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// Signature of a pluggable classifier
pub type ErrorClassifier = fn(&anyhow::Error) -> ErrorClass;

/// Default classifier.
///
/// An error is [`ErrorClass::Cancelled`] when any cause is a
/// [`RetryCancelled`], a [`CommonError::TaskCancelled`], a cancelled
/// [`tokio::task::JoinError`], or an [`io::Error`] of kind `Interrupted`.
pub fn classify_error(error: &anyhow::Error) -> ErrorClass {
    let cancelled = error.chain().any(|cause| {
        cause.is::<RetryCancelled>()
            || matches!(cause.downcast_ref::<CommonError>(), Some(CommonError::TaskCancelled { .. }))
            || cause.downcast_ref::<tokio::task::JoinError>().is_some_and(|err| err.is_cancelled())
            || cause
                .downcast_ref::<io::Error>()
                .is_some_and(|err| err.kind() == io::ErrorKind::Interrupted)
    });

    if cancelled {
        ErrorClass::Cancelled
    } else {
        ErrorClass::Retryable
    }
}
