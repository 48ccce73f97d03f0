//! File backend.
//!
//! A variable is the whole content of one file. There is no change
//! notification: a watcher re-reads the file and reports `Unchanged` with the
//! configured poll interval while the bytes stay the same.

mod watcher;

pub use watcher::*;
