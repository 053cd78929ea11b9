use thiserror::Error;

use super::failure::Failure;
use crate::error::{CommonError, ErrorClassification, ErrorSeverity};

/// Errors raised by retry orchestration.
#[derive(Debug, Error)]
pub enum RetryError {
    /// The policy gave up; `source` is the last attempt's failure
    #[error("retry policy {policy} exhausted for '{description}' after {attempts} attempt(s)")]
    Exhausted {
        description: String,
        policy: String,
        attempts: u32,
        #[source]
        source: Failure,
    },

    /// A policy was configured with values it cannot honour
    #[error("invalid retry policy: {message}")]
    InvalidPolicy { message: String },

    #[error(transparent)]
    Common(#[from] CommonError),
}

/// Result type for retry operations
pub type RetryResult<T> = Result<T, RetryError>;

impl RetryError {
    /// The last failure of an exhausted session
    pub fn last_failure(&self) -> Option<&Failure> {
        match self {
            Self::Exhausted { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl ErrorClassification for RetryError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Common(err) => err.is_retryable(),
            Self::Exhausted { .. } | Self::InvalidPolicy { .. } => false,
        }
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Exhausted { .. } | Self::InvalidPolicy { .. } => ErrorSeverity::Error,
            Self::Common(err) => err.severity(),
        }
    }
}
