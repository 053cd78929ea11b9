//! Retry test doubles.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::retry::{Failure, RetryCallback, RetryCancelled, RetryContext, RetryNotifier};

/// Notifier that records every observation.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    successes: AtomicU32,
    failures: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn successes(&self) -> u32 {
        self.successes.load(Ordering::SeqCst)
    }

    pub fn failures(&self) -> u32 {
        self.failures.lock().len() as u32
    }

    /// Display form of every failure seen, oldest first
    pub fn failure_messages(&self) -> Vec<String> {
        self.failures.lock().clone()
    }
}

impl RetryNotifier for RecordingNotifier {
    fn success(&self, _context: &RetryContext) {
        self.successes.fetch_add(1, Ordering::SeqCst);
    }

    fn failed(&self, _context: &RetryContext, failure: &Failure) {
        self.failures.lock().push(failure.to_string());
    }
}

/// Scripted result of one attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Succeed,
    Fail(String),
    Cancel,
}

/// Callback that plays back a script of outcomes.
///
/// Once the script runs out the last outcome repeats; an empty script
/// always succeeds.
#[derive(Debug)]
pub struct ScriptedCallback {
    description: String,
    script: Mutex<VecDeque<Outcome>>,
    last: Mutex<Outcome>,
    calls: AtomicU32,
}

impl ScriptedCallback {
    pub fn new<S: Into<String>>(description: S, script: Vec<Outcome>) -> Self {
        Self {
            description: description.into(),
            script: Mutex::new(script.into()),
            last: Mutex::new(Outcome::Succeed),
            calls: AtomicU32::new(0),
        }
    }

    /// Fail `failures` times, then succeed.
    pub fn failing_times<S: Into<String>>(description: S, failures: u32) -> Self {
        let mut script: Vec<Outcome> =
            (1..=failures).map(|n| Outcome::Fail(format!("failure {n}"))).collect();
        script.push(Outcome::Succeed);
        Self::new(description, script)
    }

    /// Fail on every attempt.
    pub fn always_failing<S: Into<String>>(description: S) -> Self {
        Self::new(description, vec![Outcome::Fail("always fails".to_string())])
    }

    /// Number of attempts made so far
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_outcome(&self) -> Outcome {
        let mut last = self.last.lock();
        if let Some(outcome) = self.script.lock().pop_front() {
            *last = outcome;
        }
        last.clone()
    }
}

#[async_trait]
impl RetryCallback for ScriptedCallback {
    async fn do_work(&self, context: &mut RetryContext) -> anyhow::Result<()> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        match self.next_outcome() {
            Outcome::Succeed => {
                context.add_return_message(format!("{} succeeded on call {call}", self.description));
                Ok(())
            }
            Outcome::Fail(message) => Err(anyhow::anyhow!(message)),
            Outcome::Cancel => Err(RetryCancelled::new(format!("call {call} cancelled")).into()),
        }
    }

    fn work_description(&self) -> String {
        self.description.clone()
    }
}
