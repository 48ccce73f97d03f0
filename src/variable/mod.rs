//! Variable client: the poll loop between an application and a backend watcher.
//!
//! - [`Variable`] - one `watch` call per desired next snapshot
//! - [`LatestVariable`] - background refresher exposing the newest good value
//!
//! # Basic Usage
//! ```ignore
//! use runtimevar::{Decoder, MemoryStore, Variable, BackoffPolicy};
//! use tokio_util::sync::CancellationToken;
//!
//! let store = MemoryStore::default();
//! store.set("v1", b"hello");
//!
//! let watcher = store.watcher("v1", Decoder::string());
//! let mut variable = Variable::new(Box::new(watcher), BackoffPolicy::default());
//!
//! let cancel = CancellationToken::new();
//! let snapshot = variable.watch(&cancel).await?;
//! assert_eq!(snapshot.value(), "hello");
//! variable.close().await?;
//! ```

mod latest;
#[allow(clippy::module_inception)]
mod variable;

pub use latest::*;
pub use variable::*;

#[cfg(test)]
mod latest_test;
