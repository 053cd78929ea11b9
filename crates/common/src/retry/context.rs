//! State of one retry session.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use uuid::Uuid;

use super::failure::Failure;

/// Accumulated state of one [`RetryTemplate::execute`](super::RetryTemplate::execute)
/// call.
///
/// A fresh context is created per session and handed to the callback on
/// every attempt. `is_ok()` is always the negation of `is_failed()`.
#[derive(Debug, Clone)]
pub struct RetryContext {
    session_id: Uuid,
    description: String,
    meta_info: BTreeMap<String, String>,
    return_messages: Vec<String>,
    last_failure: Option<Failure>,
    failed: bool,
    attempts: u32,
    started_at: Instant,
}

impl RetryContext {
    pub fn new<S: Into<String>>(description: S) -> Self {
        Self::with_meta_info(description, BTreeMap::new())
    }

    /// Create a context seeded with caller supplied metadata.
    pub fn with_meta_info<S: Into<String>>(
        description: S,
        meta_info: BTreeMap<String, String>,
    ) -> Self {
        Self {
            session_id: Uuid::now_v7(),
            description: description.into(),
            meta_info,
            return_messages: Vec::new(),
            last_failure: None,
            failed: false,
            attempts: 0,
            started_at: Instant::now(),
        }
    }

    /// Identifier used to correlate the log lines of one session
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Read-only view of the session metadata
    pub fn meta_info(&self) -> &BTreeMap<String, String> {
        &self.meta_info
    }

    pub fn insert_meta_info<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) {
        self.meta_info.insert(key.into(), value.into());
    }

    /// Messages returned by the callback, oldest first
    pub fn return_messages(&self) -> &[String] {
        &self.return_messages
    }

    /// Append a message, keeping the ones recorded by earlier attempts.
    pub fn add_return_message<S: Into<String>>(&mut self, message: S) {
        self.return_messages.push(message.into());
    }

    /// Replace all recorded messages
    pub fn set_return_messages(&mut self, messages: Vec<String>) {
        self.return_messages = messages;
    }

    pub fn last_failure(&self) -> Option<&Failure> {
        self.last_failure.as_ref()
    }

    /// Mark the session failed with `failure` as the most recent cause.
    pub fn set_failed(&mut self, failure: Failure) {
        self.last_failure = Some(failure);
        self.failed = true;
    }

    /// Clear the failed flag. The last failure stays available for
    /// diagnostics.
    pub fn set_ok(&mut self) {
        self.failed = false;
    }

    pub fn is_ok(&self) -> bool {
        !self.failed
    }

    pub fn is_failed(&self) -> bool {
        self.failed
    }

    /// Number of attempts started so far
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub(crate) fn record_attempt(&mut self) -> u32 {
        self.attempts = self.attempts.saturating_add(1);
        self.attempts
    }

    /// Time since the session began
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}
