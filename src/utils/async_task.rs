use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::Error;
use crate::Result;

/// Sleeps for `delay` unless `cancel` fires first.
pub(crate) async fn sleep_or_cancel(
    delay: Duration,
    cancel: &CancellationToken,
) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(Error::Canceled);
    }
    if delay.is_zero() {
        return Ok(());
    }
    trace!(delay_ms = delay.as_millis() as u64, "sleeping before next poll");
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Canceled),
        _ = sleep(delay) => Ok(()),
    }
}

/// Runs `task`, abandoning it as soon as `cancel` fires.
///
/// Returns `None` when cancelled. The abandoned future is dropped, which is
/// what unblocks a backend that does not watch the token itself.
pub(crate) async fn run_cancellable<F, T>(
    task: F,
    cancel: &CancellationToken,
) -> Option<T>
where
    F: Future<Output = T>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        r = task => Some(r),
    }
}
