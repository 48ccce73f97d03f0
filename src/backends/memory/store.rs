use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::SystemTime;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::debug;

use super::MemoryWatcher;
use crate::time::strictly_after;
use crate::Decoder;
use crate::MemoryBackendConfig;

/// Stored form of a variable, also the native handle snapshots expose.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryVariable {
    pub name: String,
    pub value: Vec<u8>,
    /// Store-wide monotonic; a recreated variable never reuses a version
    pub version: u64,
    pub update_time: SystemTime,
}

/// Native error of the in-process store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MemoryStoreError {
    #[error("Variable {0} already exists")]
    AlreadyExists(String),

    #[error("Variable {0} does not exist")]
    NotFound(String),
}

struct StoreInner {
    variables: DashMap<String, MemoryVariable>,
    next_version: AtomicU64,
    last_update_time: Mutex<Option<SystemTime>>,
    /// Bumped after every mutation; long-polling watchers park on it
    revision: watch::Sender<u64>,
}

/// In-process variable store.
///
/// Cloning is cheap and every clone sees the same variables.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<StoreInner>,
    config: MemoryBackendConfig,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(MemoryBackendConfig::default())
    }
}

impl MemoryStore {
    pub fn new(config: MemoryBackendConfig) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            inner: Arc::new(StoreInner {
                variables: DashMap::new(),
                next_version: AtomicU64::new(1),
                last_update_time: Mutex::new(None),
                revision,
            }),
            config,
        }
    }

    pub fn config(&self) -> &MemoryBackendConfig {
        &self.config
    }

    pub fn watcher<T>(
        &self,
        name: &str,
        decoder: Decoder<T>,
    ) -> MemoryWatcher<T> {
        MemoryWatcher::new(self.clone(), name, decoder, self.config.long_poll_timeout())
    }

    pub fn get(
        &self,
        name: &str,
    ) -> Option<MemoryVariable> {
        self.inner.variables.get(name).map(|v| v.value().clone())
    }

    pub fn create(
        &self,
        name: &str,
        value: &[u8],
    ) -> std::result::Result<MemoryVariable, MemoryStoreError> {
        let stored = match self.inner.variables.entry(name.to_string()) {
            Entry::Occupied(_) => return Err(MemoryStoreError::AlreadyExists(name.to_string())),
            Entry::Vacant(slot) => slot.insert(self.stamp(name, value)).value().clone(),
        };
        self.notify(name, "create");
        Ok(stored)
    }

    pub fn update(
        &self,
        name: &str,
        value: &[u8],
    ) -> std::result::Result<MemoryVariable, MemoryStoreError> {
        let stored = match self.inner.variables.get_mut(name) {
            Some(mut existing) => {
                *existing = self.stamp(name, value);
                existing.clone()
            }
            None => return Err(MemoryStoreError::NotFound(name.to_string())),
        };
        self.notify(name, "update");
        Ok(stored)
    }

    /// Create-or-update
    pub fn set(
        &self,
        name: &str,
        value: &[u8],
    ) -> MemoryVariable {
        let stored = self.stamp(name, value);
        self.inner.variables.insert(name.to_string(), stored.clone());
        self.notify(name, "set");
        stored
    }

    pub fn delete(
        &self,
        name: &str,
    ) -> std::result::Result<(), MemoryStoreError> {
        if self.inner.variables.remove(name).is_none() {
            return Err(MemoryStoreError::NotFound(name.to_string()));
        }
        self.notify(name, "delete");
        Ok(())
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.revision.subscribe()
    }

    fn stamp(
        &self,
        name: &str,
        value: &[u8],
    ) -> MemoryVariable {
        let version = self.inner.next_version.fetch_add(1, Ordering::SeqCst);
        let update_time = {
            let mut last = self.inner.last_update_time.lock();
            let t = strictly_after(*last, SystemTime::now());
            *last = Some(t);
            t
        };
        MemoryVariable {
            name: name.to_string(),
            value: value.to_vec(),
            version,
            update_time,
        }
    }

    fn notify(
        &self,
        name: &str,
        op: &'static str,
    ) {
        self.inner.revision.send_modify(|r| *r += 1);
        debug!(variable = %name, op, "memory store mutated");
    }
}
