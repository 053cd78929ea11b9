//! Verdict returned by a [`RetryPolicy`](super::RetryPolicy) after a failed
//! attempt.

use super::failure::Failure;

/// Either keep going (`ok`) or stop and report the carried cause
/// (`exhausted`).
#[derive(Debug, Clone)]
pub struct PolicyStatus {
    exhausted: Option<Failure>,
}

impl PolicyStatus {
    /// Continue with another attempt
    pub fn ok() -> Self {
        Self { exhausted: None }
    }

    /// Stop retrying; `cause` is the failure reported to the caller
    pub fn exhausted(cause: Failure) -> Self {
        Self { exhausted: Some(cause) }
    }

    pub fn is_ok(&self) -> bool {
        self.exhausted.is_none()
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted.is_some()
    }

    /// The cause carried by an exhausted status
    pub fn throwable(&self) -> Option<&Failure> {
        self.exhausted.as_ref()
    }

    pub fn into_throwable(self) -> Option<Failure> {
        self.exhausted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_and_exhausted_are_exclusive() {
        let ok = PolicyStatus::ok();
        assert!(ok.is_ok());
        assert!(!ok.is_exhausted());
        assert!(ok.throwable().is_none());

        let exhausted = PolicyStatus::exhausted(Failure::from(anyhow::anyhow!("gone")));
        assert!(!exhausted.is_ok());
        assert!(exhausted.is_exhausted());
        assert_eq!(exhausted.throwable().map(ToString::to_string), Some("gone".to_string()));
    }
}
