//! the test_utils folder here will share scripted watchers and fixtures
//! between unit tests
mod common;
mod mock;

pub use common::*;
pub use mock::*;
