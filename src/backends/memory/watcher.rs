use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep_until;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use super::MemoryStore;
use super::MemoryStoreError;
use super::MemoryVariable;
use crate::Decoder;
use crate::Error;
use crate::Result;
use crate::Snapshot;
use crate::StateToken;
use crate::WatchResult;
use crate::Watcher;

/// What a memory watcher hands out as state token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct MemoryToken {
    version: u64,
}

/// Long-polling watcher over a [`MemoryStore`] variable.
pub struct MemoryWatcher<T> {
    store: MemoryStore,
    name: String,
    decoder: Decoder<T>,
    long_poll_timeout: Duration,
    closed: AtomicBool,
}

impl<T> MemoryWatcher<T> {
    pub fn new(
        store: MemoryStore,
        name: &str,
        decoder: Decoder<T>,
        long_poll_timeout: Duration,
    ) -> Self {
        Self {
            store,
            name: name.to_string(),
            decoder,
            long_poll_timeout,
            closed: AtomicBool::new(false),
        }
    }

    fn observe(
        &self,
        variable: MemoryVariable,
    ) -> WatchResult<T> {
        match self.decoder.decode(&variable.value) {
            Ok(value) => {
                let token = StateToken::new(MemoryToken {
                    version: variable.version,
                });
                WatchResult::Changed(Snapshot::new(value, variable.update_time, token).with_raw(variable))
            }
            Err(e) => WatchResult::Failed(Error::decode(&self.name, e)),
        }
    }
}

#[async_trait]
impl<T: Send + Sync + 'static> Watcher<T> for MemoryWatcher<T> {
    async fn watch_variable(
        &self,
        cancel: &CancellationToken,
        prev: Option<StateToken>,
    ) -> WatchResult<T> {
        if self.closed.load(Ordering::Acquire) {
            return WatchResult::Failed(Error::Closed);
        }

        let seen_version = prev
            .as_ref()
            .and_then(|t| t.downcast_ref::<MemoryToken>())
            .map(|t| t.version);
        let deadline = Instant::now() + self.long_poll_timeout;
        let mut revisions = self.store.subscribe();

        loop {
            // Mark the current revision seen before reading, so a mutation
            // landing between the read and the park still wakes us up.
            revisions.borrow_and_update();

            match self.store.get(&self.name) {
                None => {
                    return WatchResult::Failed(Error::not_found_with(
                        &self.name,
                        MemoryStoreError::NotFound(self.name.clone()),
                    ))
                }
                Some(current) if Some(current.version) == seen_version => {
                    trace!(variable = %self.name, version = current.version, "no change, parking");
                }
                Some(current) => return self.observe(current),
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return WatchResult::Failed(Error::Canceled),
                changed = revisions.changed() => {
                    if changed.is_err() {
                        return WatchResult::Failed(Error::Closed);
                    }
                }
                _ = sleep_until(deadline) => return WatchResult::Unchanged(Duration::ZERO),
            }
        }
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}
