//! Async testing utilities

#![allow(clippy::missing_errors_doc)]

use std::future::Future;
use std::time::Duration;

/// Poll `condition` every `interval` until it holds or `timeout` elapses.
///
/// Returns whether the condition became true.
///
/// ```no_run
/// # #[cfg(feature = "runtime")]
/// # {
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// use cadence_common::testing::wait_until;
///
/// #[tokio::test(flavor = "multi_thread")]
/// async fn fires_eventually() {
///     let fired = Arc::new(AtomicBool::new(false));
///     let flag = fired.clone();
///     tokio::spawn(async move { flag.store(true, Ordering::SeqCst) });
///
///     assert!(wait_until(Duration::from_secs(1), Duration::from_millis(5), || {
///         fired.load(Ordering::SeqCst)
///     })
///     .await);
/// }
/// # }
/// ```
pub async fn wait_until<F>(timeout: Duration, interval: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(interval).await;
    }
}

/// Wait for a future to complete with a timeout, returning a Result
pub async fn timeout_ok<F, T>(duration: Duration, fut: F) -> Result<T, tokio::time::error::Elapsed>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(duration, fut).await
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn wait_until_sees_condition_change() {
        let polls = AtomicU32::new(0);
        let met = wait_until(Duration::from_secs(1), Duration::from_millis(10), || {
            polls.fetch_add(1, Ordering::SeqCst) >= 3
        })
        .await;
        assert!(met);
        assert_eq!(polls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_until_gives_up_at_timeout() {
        assert!(!wait_until(Duration::from_millis(50), Duration::from_millis(10), || false).await);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_ok_reports_elapsed() {
        let slow = timeout_ok(Duration::from_millis(10), tokio::time::sleep(Duration::from_secs(1)));
        assert!(slow.await.is_err());
        assert_eq!(timeout_ok(Duration::from_secs(1), async { 7 }).await.ok(), Some(7));
    }
}
