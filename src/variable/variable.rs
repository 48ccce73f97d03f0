use std::time::SystemTime;

use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::trace;
use tracing::warn;

use crate::async_task::run_cancellable;
use crate::async_task::sleep_or_cancel;
use crate::backoff::Backoff;
use crate::BackoffPolicy;
use crate::Error;
use crate::ErrorClass;
use crate::ErrorCode;
use crate::Result;
use crate::RuntimeVarConfig;
use crate::Snapshot;
use crate::StateToken;
use crate::WatchResult;
use crate::Watcher;

/// Where a variable is in its poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableState {
    /// Created, never watched
    Idle,
    /// Inside `watch`, waiting on the backend
    Polling,
    /// Last `watch` returned (value or error) to the caller
    Delivering,
    Closed,
}

/// Turns a backend [`Watcher`] into a stream of snapshots, one per `watch` call.
///
/// A `Variable` is driven by one caller at a time (`watch` takes `&mut self`).
/// It owns the backoff counters, the last state token and the memory of the
/// last error surfaced, so separate variables never share state.
pub struct Variable<T: Send + Sync + 'static> {
    watcher: Box<dyn Watcher<T>>,
    backoff: Backoff,
    state: VariableState,
    prev: Option<StateToken>,
    last_error: Option<(ErrorCode, String)>,
    last_update_time: Option<SystemTime>,
}

impl<T: Send + Sync + 'static> Variable<T> {
    pub fn new(
        watcher: Box<dyn Watcher<T>>,
        policy: BackoffPolicy,
    ) -> Self {
        let backoff = Backoff::new(policy, watcher.min_retry_delay());
        Self {
            watcher,
            backoff,
            state: VariableState::Idle,
            prev: None,
            last_error: None,
            last_update_time: None,
        }
    }

    pub fn from_config(
        watcher: Box<dyn Watcher<T>>,
        config: &RuntimeVarConfig,
    ) -> Self {
        Self::new(watcher, config.backoff)
    }

    pub fn state(&self) -> VariableState {
        self.state
    }

    /// Blocks until the variable holds a value the caller has not seen, or
    /// until an error worth surfacing.
    ///
    /// - The first call returns the current value (or why there is none).
    /// - `Unchanged` results are slept through with jitter.
    /// - Transient failures back off and are only returned once the retry
    ///   budget is used up.
    /// - Permanent failures are returned once; an identical repeat is not
    ///   returned again until a value has been delivered in between.
    /// - Cancellation ends the loop immediately with [`Error::Canceled`].
    pub async fn watch(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<Snapshot<T>> {
        if self.state == VariableState::Closed {
            return Err(Error::Closed);
        }
        self.state = VariableState::Polling;
        let result = self.poll_until_deliverable(cancel).await;
        if self.state != VariableState::Closed {
            self.state = VariableState::Delivering;
        }
        result
    }

    async fn poll_until_deliverable(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<Snapshot<T>> {
        loop {
            if cancel.is_cancelled() {
                return Err(Error::Canceled);
            }

            trace!(has_prev = self.prev.is_some(), "polling backend");
            let polled = run_cancellable(self.watcher.watch_variable(cancel, self.prev.clone()), cancel).await;
            let Some(result) = polled else {
                debug!("watch canceled while backend call in flight");
                return Err(Error::Canceled);
            };

            match result {
                WatchResult::Changed(snapshot) => {
                    self.backoff.reset();
                    self.prev = Some(snapshot.state().clone());
                    if let Some(last) = self.last_update_time {
                        if snapshot.update_time() < last {
                            warn!(
                                update_time = ?snapshot.update_time(),
                                last_delivered = ?last,
                                "dropping snapshot older than the last one delivered"
                            );
                            continue;
                        }
                    }
                    self.last_update_time = Some(snapshot.update_time());
                    self.last_error = None;
                    debug!(update_time = ?snapshot.update_time(), "variable changed");
                    return Ok(snapshot);
                }
                WatchResult::Unchanged(suggested) => {
                    self.backoff.reset();
                    let delay = self.backoff.jittered(suggested);
                    trace!(delay_ms = delay.as_millis() as u64, "variable unchanged");
                    sleep_or_cancel(delay, cancel).await?;
                }
                WatchResult::Failed(err) => self.on_failure(err, cancel).await?,
            }
        }
    }

    /// Returns `Err` when the failure must reach the caller, `Ok` to keep polling
    async fn on_failure(
        &mut self,
        err: Error,
        cancel: &CancellationToken,
    ) -> Result<()> {
        match err.class() {
            ErrorClass::Canceled => Err(err),
            ErrorClass::Closed => {
                self.state = VariableState::Closed;
                Err(err)
            }
            ErrorClass::Transient => {
                let delay = self.backoff.next_failure_delay();
                if self.backoff.exhausted() {
                    error!(
                        attempts = self.backoff.consecutive_failures(),
                        error = %err,
                        "backend still unavailable, giving up on this watch"
                    );
                    self.backoff.reset();
                    self.last_error = Some(err.signature());
                    return Err(err);
                }
                warn!(
                    attempt = self.backoff.consecutive_failures(),
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient watch failure, retrying"
                );
                sleep_or_cancel(delay, cancel).await
            }
            ErrorClass::Permanent => {
                let signature = err.signature();
                let delay = self.backoff.next_failure_delay();
                if self.last_error.as_ref() == Some(&signature) {
                    trace!(error = %err, "same error as last surfaced, not repeating it");
                    return sleep_or_cancel(delay, cancel).await;
                }
                warn!(error = %err, "watch failed");
                self.last_error = Some(signature);
                // The caller saw the error instead of the old value; whatever
                // comes back next is a change, even identical bytes
                self.prev = None;
                Err(err)
            }
        }
    }

    /// Releases the backend. Safe to call more than once.
    pub async fn close(&mut self) -> Result<()> {
        if self.state == VariableState::Closed {
            return Ok(());
        }
        self.state = VariableState::Closed;
        debug!("closing variable");
        self.watcher.close().await
    }
}
