//! Background refresher keeping the newest good snapshot at hand.

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::error;
use tracing::warn;

use super::Variable;
use crate::Error;
use crate::ErrorClass;
use crate::ErrorCode;
use crate::Result;
use crate::Snapshot;

/// Health of a background refreshed variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Health {
    /// A good snapshot is available and no newer error was seen
    Healthy,
    /// Nothing received yet, neither a value nor an error
    Pending,
    /// No good snapshot yet, or the newest event was an error
    Unhealthy { code: ErrorCode, message: String },
}

struct LatestState<T> {
    snapshot: Option<Snapshot<T>>,
    last_error: Option<(ErrorCode, String)>,
    /// Set once the refresher task ended
    stopped: bool,
}

impl<T> Default for LatestState<T> {
    fn default() -> Self {
        Self {
            snapshot: None,
            last_error: None,
            stopped: false,
        }
    }
}

/// Drives [`Variable::watch`] on a tokio task and keeps the newest good value.
///
/// Readers call [`latest`](LatestVariable::latest), which only waits until the
/// first good value arrives. Errors never replace a good value; they only
/// show up in [`check_health`](LatestVariable::check_health).
pub struct LatestVariable<T: Clone + Send + Sync + 'static> {
    rx: watch::Receiver<LatestState<T>>,
    shutdown: CancellationToken,
    handle: Option<JoinHandle<Variable<T>>>,
}

impl<T: Clone + Send + Sync + 'static> LatestVariable<T> {
    pub fn spawn(variable: Variable<T>) -> Self {
        let (tx, rx) = watch::channel(LatestState::default());
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(refresh_loop(variable, tx, shutdown.clone()));
        Self {
            rx,
            shutdown,
            handle: Some(handle),
        }
    }

    /// Newest good snapshot, waiting for the first one if needed
    pub async fn latest(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Snapshot<T>> {
        let mut rx = self.rx.clone();
        loop {
            {
                let state = rx.borrow_and_update();
                if let Some(snapshot) = state.snapshot.as_ref() {
                    return Ok(snapshot.clone());
                }
                if state.stopped {
                    return Err(Error::Closed);
                }
            }
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Canceled),
                changed = rx.changed() => {
                    if changed.is_err() {
                        return Err(Error::Closed);
                    }
                }
            }
        }
    }

    pub fn check_health(&self) -> Health {
        let state = self.rx.borrow();
        match (&state.snapshot, &state.last_error) {
            (Some(_), None) => Health::Healthy,
            (_, Some((code, message))) => Health::Unhealthy {
                code: *code,
                message: message.clone(),
            },
            (None, None) if state.stopped => Health::Unhealthy {
                code: ErrorCode::Closed,
                message: Error::Closed.to_string(),
            },
            (None, None) => Health::Pending,
        }
    }

    /// Stops the refresher and closes the wrapped variable
    pub async fn close(&mut self) -> Result<()> {
        self.shutdown.cancel();
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        match handle.await {
            Ok(mut variable) => variable.close().await,
            Err(e) => {
                error!("latest variable refresher task failed: {:?}", e);
                Err(Error::Backend(Box::new(e)))
            }
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Drop for LatestVariable<T> {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn refresh_loop<T: Clone + Send + Sync + 'static>(
    mut variable: Variable<T>,
    tx: watch::Sender<LatestState<T>>,
    shutdown: CancellationToken,
) -> Variable<T> {
    loop {
        match variable.watch(&shutdown).await {
            Ok(snapshot) => {
                tx.send_modify(|state| {
                    state.snapshot = Some(snapshot);
                    state.last_error = None;
                });
            }
            Err(err) => match err.class() {
                ErrorClass::Canceled | ErrorClass::Closed => {
                    debug!(error = %err, "latest variable refresher stopping");
                    break;
                }
                ErrorClass::Transient | ErrorClass::Permanent => {
                    warn!(error = %err, "latest variable keeps previous value");
                    tx.send_modify(|state| state.last_error = Some(err.signature()));
                }
            },
        }
    }
    tx.send_modify(|state| state.stopped = true);
    variable
}
