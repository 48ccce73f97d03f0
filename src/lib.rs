mod backends;
mod backoff;
mod config;
pub mod conformance;
mod decoder;
mod errors;
mod snapshot;
pub mod utils;
mod variable;
mod watcher;

pub use backends::*;
pub use config::*;
pub use decoder::*;
pub use errors::*;
pub use snapshot::*;
pub use utils::*;
pub use variable::*;
pub use watcher::*;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub mod test_utils;
