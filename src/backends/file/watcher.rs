use std::io;
use std::path::Path;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use std::time::SystemTime;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::trace;

use crate::time::strictly_after;
use crate::Decoder;
use crate::Error;
use crate::FileBackendConfig;
use crate::Result;
use crate::Snapshot;
use crate::StateToken;
use crate::WatchResult;
use crate::Watcher;

/// Native handle exposed by file snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileVariable {
    pub path: PathBuf,
    pub modified: SystemTime,
    pub len: u64,
}

/// Native error of the file backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Failed to read {}: {message}", path.display())]
pub struct FileReadError {
    pub path: PathBuf,
    pub kind: io::ErrorKind,
    pub message: String,
}

impl FileReadError {
    fn new(
        path: &Path,
        e: &io::Error,
    ) -> Self {
        Self {
            path: path.to_path_buf(),
            kind: e.kind(),
            message: e.to_string(),
        }
    }
}

/// Last content delivered to the caller
struct FileToken {
    content: Arc<Vec<u8>>,
}

/// Polling watcher over one file.
pub struct FileWatcher<T> {
    path: PathBuf,
    name: String,
    decoder: Decoder<T>,
    poll_interval: Duration,
    last_update_time: Mutex<Option<SystemTime>>,
    closed: AtomicBool,
}

impl<T> FileWatcher<T> {
    pub fn new(
        path: impl Into<PathBuf>,
        decoder: Decoder<T>,
        poll_interval: Duration,
    ) -> Self {
        let path = path.into();
        Self {
            name: path.display().to_string(),
            path,
            decoder,
            poll_interval,
            last_update_time: Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    pub fn from_config(
        path: impl Into<PathBuf>,
        decoder: Decoder<T>,
        config: &FileBackendConfig,
    ) -> Self {
        Self::new(path, decoder, config.poll_interval())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> std::result::Result<(Vec<u8>, FileVariable), io::Error> {
        let content = tokio::fs::read(&self.path).await?;
        let metadata = tokio::fs::metadata(&self.path).await?;
        let variable = FileVariable {
            path: self.path.clone(),
            modified: metadata.modified().unwrap_or_else(|_| SystemTime::now()),
            len: content.len() as u64,
        };
        Ok((content, variable))
    }

    fn read_failure(
        &self,
        e: io::Error,
    ) -> Error {
        let native = FileReadError::new(&self.path, &e);
        match e.kind() {
            io::ErrorKind::NotFound => Error::not_found_with(&self.name, native),
            _ => Error::unavailable(format!("reading {}", self.name), native),
        }
    }
}

#[async_trait]
impl<T: Send + Sync + 'static> Watcher<T> for FileWatcher<T> {
    async fn watch_variable(
        &self,
        cancel: &CancellationToken,
        prev: Option<StateToken>,
    ) -> WatchResult<T> {
        if self.closed.load(Ordering::Acquire) {
            return WatchResult::Failed(Error::Closed);
        }

        let read = tokio::select! {
            biased;
            _ = cancel.cancelled() => return WatchResult::Failed(Error::Canceled),
            r = self.read() => r,
        };
        let (content, variable) = match read {
            Ok(r) => r,
            Err(e) => {
                debug!(path = %self.name, error = %e, "file read failed");
                return WatchResult::Failed(self.read_failure(e));
            }
        };

        let unchanged = prev
            .as_ref()
            .and_then(|t| t.downcast_ref::<FileToken>())
            .is_some_and(|t| *t.content == content);
        if unchanged {
            trace!(path = %self.name, "content unchanged");
            return WatchResult::Unchanged(self.poll_interval);
        }

        let value = match self.decoder.decode(&content) {
            Ok(v) => v,
            Err(e) => return WatchResult::Failed(Error::decode(&self.name, e)),
        };

        let update_time = {
            let mut last = self.last_update_time.lock();
            let t = strictly_after(*last, variable.modified);
            *last = Some(t);
            t
        };
        let token = StateToken::new(FileToken {
            content: Arc::new(content),
        });
        WatchResult::Changed(Snapshot::new(value, update_time, token).with_raw(variable))
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }

    /// Retrying faster than the poll interval cannot observe anything new
    fn min_retry_delay(&self) -> Option<Duration> {
        Some(self.poll_interval)
    }
}
