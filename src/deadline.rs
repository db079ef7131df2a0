//! Deadline race: bound an operation's latency on the monotonic clock.
//!
//! The race only reports timing. It drops the losing future but cannot know
//! what resources that future was driving, so cleanup is supplied by the
//! caller and runs only when the deadline wins.
use crate::error::{HarnessError, Result};
use std::future::Future;
use std::time::Duration;

/// Resolve with the operation's output, or `Timeout` once `timeout` elapses.
///
/// The deadline is checked before the operation on every wakeup, so an
/// operation that becomes ready exactly at `timeout` loses.
pub async fn race<F>(operation: F, timeout: Duration) -> Result<F::Output>
where
    F: Future,
{
    let deadline = tokio::time::sleep(timeout);
    tokio::select! {
        biased;
        () = deadline => Err(HarnessError::Timeout(timeout)),
        output = operation => Ok(output),
    }
}

/// Like [`race`], invoking `cleanup` exactly once if the deadline wins.
pub async fn race_with_cleanup<F, C>(
    operation: F,
    timeout: Duration,
    cleanup: C,
) -> Result<F::Output>
where
    F: Future,
    C: FnOnce(),
{
    match race(operation, timeout).await {
        Ok(output) => Ok(output),
        Err(err) => {
            tracing::debug!(
                timeout_ms = timeout.as_millis() as u64,
                "deadline elapsed, cleaning up"
            );
            cleanup();
            Err(err)
        }
    }
}

/// Race only when a deadline is configured.
pub async fn race_optional<F>(operation: F, timeout: Option<Duration>) -> Result<F::Output>
where
    F: Future,
{
    match timeout {
        Some(timeout) => race(operation, timeout).await,
        None => Ok(operation.await),
    }
}
