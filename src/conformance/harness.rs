use std::time::Duration;

use async_trait::async_trait;

use crate::BackoffPolicy;
use crate::Decoder;
use crate::Error;
use crate::Result;
use crate::Snapshot;
use crate::Watcher;

/// Backend adapter driven by the conformance suite.
#[async_trait]
pub trait Harness: Send + Sync {
    /// Builds a watcher for `name`. The variable may not exist yet.
    async fn make_watcher<T: Send + Sync + 'static>(
        &self,
        name: &str,
        decoder: Decoder<T>,
    ) -> Result<Box<dyn Watcher<T>>>;

    async fn create_variable(
        &self,
        name: &str,
        value: &[u8],
    ) -> Result<()>;

    async fn update_variable(
        &self,
        name: &str,
        value: &[u8],
    ) -> Result<()>;

    async fn delete_variable(
        &self,
        name: &str,
    ) -> Result<()>;

    /// Releases everything the harness holds
    async fn close(&self) -> Result<()>;

    /// False for backends whose variables cannot be updated in place
    fn mutable(&self) -> bool;
}

/// Backend-specific check of the native objects behind snapshots and errors.
///
/// Implementations typically call [`Snapshot::as_native`] and
/// [`Error::as_native`] with the backend's own types.
pub trait AsTest: Send + Sync {
    fn name(&self) -> &str;

    fn snapshot_check(
        &self,
        snapshot: &Snapshot<String>,
    ) -> std::result::Result<(), String>;

    /// Called with the error returned for a variable that does not exist
    fn error_check(
        &self,
        err: &Error,
    ) -> std::result::Result<(), String>;
}

/// Timing knobs of the conformance suite
#[derive(Debug, Clone)]
pub struct ConformanceConfig {
    /// Upper bound for any single expectation, retries included
    pub step_timeout: Duration,

    /// How long a watch must stay silent to count as "no duplicate"
    pub quiet_period: Duration,

    /// Raw watcher calls that must report `Unchanged` after the first read
    pub unchanged_polls: usize,

    /// Delay before the token is cancelled in the cancellation scenario
    pub cancel_delay: Duration,

    /// How quickly a watch must return once its token is cancelled
    pub cancel_grace: Duration,

    /// Retry policy of the variables the suite creates
    pub backoff: BackoffPolicy,
}

impl Default for ConformanceConfig {
    fn default() -> Self {
        Self {
            step_timeout: Duration::from_secs(5),
            quiet_period: Duration::from_millis(300),
            unchanged_polls: 3,
            cancel_delay: Duration::from_millis(50),
            cancel_grace: Duration::from_secs(1),
            backoff: BackoffPolicy {
                max_retries: 5,
                base_delay_ms: 10,
                max_delay_ms: 100,
                multiplier: 2.0,
                jitter_ratio: 0.1,
            },
        }
    }
}
