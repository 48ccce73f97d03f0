//! Backend capability: report whether a variable changed since a given state.

use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tokio_util::sync::CancellationToken;

use crate::Error;
use crate::Result;
use crate::Snapshot;
use crate::StateToken;

/// Outcome of a single `watch_variable` call.
#[derive(Debug)]
pub enum WatchResult<T> {
    /// A value the caller has not seen yet
    Changed(Snapshot<T>),
    /// Nothing new; ask again after the given delay
    Unchanged(Duration),
    Failed(Error),
}

impl<T> WatchResult<T> {
    pub fn is_changed(&self) -> bool {
        matches!(self, WatchResult::Changed(_))
    }
}

/// Implemented once per backend. The variable client drives it.
///
/// Contract:
/// - Blocks until a change is seen, a backend chosen wait elapses, or
///   `cancel` fires.
/// - `prev == None` must yield the current value (`Changed`) or an error,
///   never `Unchanged`.
/// - A missing variable is `Failed(NotFound)`; it may show up later.
/// - Decoder failures are `Failed(Decode)`.
/// - Cancellation unblocks promptly with `Failed(Canceled)`.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Watcher<T: Send + Sync + 'static>: Send + Sync {
    async fn watch_variable(
        &self,
        cancel: &CancellationToken,
        prev: Option<StateToken>,
    ) -> WatchResult<T>;

    /// Releases backend resources. Called at most once by the client.
    async fn close(&self) -> Result<()>;

    /// Backend suggested minimum retry interval, overriding the policy base delay
    fn min_retry_delay(&self) -> Option<Duration> {
        None
    }
}
