//! Reference backends.
//!
//! - [`memory`] - in-process store with native long-poll
//! - [`file`] - file on disk, polled
//!
//! Both expose their native objects through [`Snapshot::as_native`](crate::Snapshot::as_native)
//! and their native errors through [`error_as`](crate::error_as).

pub mod file;
pub mod memory;

pub use file::*;
pub use memory::*;
