//! Backend conformance suite.
//!
//! Any backend can prove it satisfies the watcher contract by implementing
//! [`Harness`] and calling [`run_conformance_tests`]:
//!
//! ```ignore
//! let report = run_conformance_tests(|| async { Ok(MyHarness::new()) }, &[&VerifyAs], &ConformanceConfig::default()).await;
//! report.assert_passed();
//! ```
//!
//! Every scenario gets a fresh harness and its own variable name. The
//! variable is deleted and the harness closed however the scenario ends,
//! panics included. Backends are allowed to be eventually consistent: each
//! expectation is retried until [`ConformanceConfig::step_timeout`].

mod eventually;
mod harness;
mod report;
mod scenarios;

pub use harness::*;
pub use report::*;
pub use scenarios::*;
