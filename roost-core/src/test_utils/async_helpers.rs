//! Async test helpers
//!
//! Timeout wrappers and watch-channel waits for testing code that settles
//! in background tasks.

use std::future::Future;
use tokio::sync::watch;
use tokio::time::{timeout, Duration};

/// Default timeout duration for tests (5 seconds)
pub const DEFAULT_TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Short timeout for tests that should fail fast (100ms)
pub const SHORT_TEST_TIMEOUT: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutError {
    Elapsed,
}

impl std::fmt::Display for TimeoutError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "operation timed out")
    }
}

impl std::error::Error for TimeoutError {}

/// Run a future with a timeout, returning Ok(result) or Err on timeout
pub async fn with_timeout<F, T>(duration: Duration, future: F) -> Result<T, TimeoutError>
where
    F: Future<Output = T>,
{
    timeout(duration, future)
        .await
        .map_err(|_| TimeoutError::Elapsed)
}

/// Helper to assert a future completes within duration
pub async fn assert_completes_within<F, T>(duration: Duration, future: F) -> T
where
    F: Future<Output = T>,
{
    match timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => panic!("Future did not complete within {:?}", duration),
    }
}

/// Helper to assert a future does NOT complete within duration
pub async fn assert_times_out<F, T>(duration: Duration, future: F)
where
    F: Future<Output = T>,
{
    if timeout(duration, future).await.is_ok() {
        panic!("Expected future to timeout, but it completed within {:?}", duration);
    }
}

/// Wait until the watched value satisfies `predicate`, returning a copy of it
pub async fn wait_for_state<T, F>(rx: &mut watch::Receiver<T>, predicate: F) -> T
where
    T: Clone,
    F: FnMut(&T) -> bool,
{
    match timeout(DEFAULT_TEST_TIMEOUT, rx.wait_for(predicate)).await {
        Ok(Ok(value)) => value.clone(),
        Ok(Err(_)) => panic!("watch channel closed while waiting"),
        Err(_) => panic!("state not reached within {:?}", DEFAULT_TEST_TIMEOUT),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_with_timeout_elapses() {
        let result = with_timeout(Duration::from_millis(5), std::future::pending::<()>()).await;
        assert_eq!(result, Err(TimeoutError::Elapsed));
    }

    #[tokio::test]
    async fn test_wait_for_state_sees_later_value() {
        let (tx, mut rx) = watch::channel(0u32);
        tokio::spawn(async move {
            tx.send_replace(3);
            // Keep the sender alive until the waiter has observed the value
            tokio::time::sleep(Duration::from_millis(50)).await;
        });

        let value = wait_for_state(&mut rx, |v| *v == 3).await;
        assert_eq!(value, 3);
    }
}
