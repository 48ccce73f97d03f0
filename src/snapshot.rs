//! Snapshot: one decoded observation of a variable.
//!
//! A snapshot carries the decoded value, the backend's update time, an
//! optional backend-native handle and the opaque state token the backend
//! wants back on the next watch call.

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

/// Opaque marker of "what the caller has already seen".
///
/// Backends put whatever they need in here (a version number, a content
/// copy, a hash). The variable client only stores and returns it.
#[derive(Clone)]
pub struct StateToken(Arc<dyn Any + Send + Sync>);

impl StateToken {
    pub fn new<V>(state: V) -> Self
    where
        V: Any + Send + Sync,
    {
        Self(Arc::new(state))
    }

    pub fn downcast_ref<V: Any>(&self) -> Option<&V> {
        self.0.downcast_ref::<V>()
    }
}

impl fmt::Debug for StateToken {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str("StateToken(..)")
    }
}

/// Immutable decoded value of a variable at a point in time.
#[derive(Clone)]
pub struct Snapshot<T> {
    value: T,
    update_time: SystemTime,
    raw: Option<Arc<dyn Any + Send + Sync>>,
    state: StateToken,
}

impl<T> Snapshot<T> {
    pub fn new(
        value: T,
        update_time: SystemTime,
        state: StateToken,
    ) -> Self {
        Self {
            value,
            update_time,
            raw: None,
            state,
        }
    }

    /// Attaches the backend-native object this snapshot was built from
    pub fn with_raw<V>(
        mut self,
        raw: V,
    ) -> Self
    where
        V: Any + Send + Sync,
    {
        self.raw = Some(Arc::new(raw));
        self
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn into_value(self) -> T {
        self.value
    }

    pub fn update_time(&self) -> SystemTime {
        self.update_time
    }

    pub fn state(&self) -> &StateToken {
        &self.state
    }

    /// Borrowing form of the capability query on the backend handle
    pub fn raw_as<V: Any>(&self) -> Option<&V> {
        self.raw.as_ref().and_then(|raw| raw.downcast_ref::<V>())
    }

    /// Copies the backend handle into `target` if it is a `V`.
    ///
    /// Returns false and leaves `target` untouched otherwise.
    pub fn as_native<V>(
        &self,
        target: &mut V,
    ) -> bool
    where
        V: Any + Clone,
    {
        match self.raw_as::<V>() {
            Some(raw) => {
                *target = raw.clone();
                true
            }
            None => false,
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Snapshot<T> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("Snapshot")
            .field("value", &self.value)
            .field("update_time", &self.update_time)
            .field("has_raw", &self.raw.is_some())
            .finish()
    }
}
