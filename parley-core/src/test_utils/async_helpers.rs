//! Async test helpers
//!
//! Timeout wrappers for futures and streams, so a broken stream fails a test
//! instead of hanging it.

use futures::{Stream, StreamExt};
use std::future::Future;
use tokio::time::{timeout, Duration};

/// Default timeout duration for tests (5 seconds)
pub const DEFAULT_TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Short timeout for tests that expect nothing to happen (100ms)
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

/// Next item of `stream`, or `Err` if none arrives within `duration`
pub async fn next_within<S>(stream: &mut S, duration: Duration) -> Result<Option<S::Item>, TimeoutError>
where
    S: Stream + Unpin,
{
    timeout(duration, stream.next())
        .await
        .map_err(|_| TimeoutError::Elapsed)
}

/// Next item of `stream`; panics if the stream ends or stalls
pub async fn expect_next<S>(stream: &mut S) -> S::Item
where
    S: Stream + Unpin,
{
    match next_within(stream, DEFAULT_TEST_TIMEOUT).await {
        Ok(Some(item)) => item,
        Ok(None) => panic!("Stream ended unexpectedly"),
        Err(_) => panic!("No stream item within {:?}", DEFAULT_TEST_TIMEOUT),
    }
}

/// Panics unless `stream` ends (yields `None`) within the default timeout
pub async fn expect_end<S>(stream: &mut S)
where
    S: Stream + Unpin,
{
    match next_within(stream, DEFAULT_TEST_TIMEOUT).await {
        Ok(None) => (),
        Ok(Some(_)) => panic!("Expected end of stream, got an item"),
        Err(_) => panic!("Stream did not end within {:?}", DEFAULT_TEST_TIMEOUT),
    }
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

/// Poll `condition` until it holds; panics after the default timeout
pub async fn wait_until<F>(mut condition: F)
where
    F: FnMut() -> bool,
{
    let waited = timeout(DEFAULT_TEST_TIMEOUT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await;

    if waited.is_err() {
        panic!("Condition not met within {:?}", DEFAULT_TEST_TIMEOUT);
    }
}
