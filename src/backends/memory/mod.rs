//! In-process backend.
//!
//! Variables live in a [`MemoryStore`] shared by clones. Watchers long-poll:
//! a call with an up-to-date state token parks until the store changes or
//! `long_poll_timeout_ms` elapses.

mod store;
mod watcher;

pub use store::*;
pub use watcher::*;
