use std::time::Duration;
use std::time::SystemTime;

use crate::BackoffPolicy;
use crate::Error;
use crate::Snapshot;
use crate::StateToken;
use crate::WatchResult;

pub fn at(secs: u64) -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
}

/// A `Changed` result whose state token is `version`
pub fn changed(
    value: &str,
    secs: u64,
    version: u64,
) -> WatchResult<String> {
    WatchResult::Changed(Snapshot::new(value.to_string(), at(secs), StateToken::new(version)))
}

pub fn unavailable() -> WatchResult<String> {
    WatchResult::Failed(Error::unavailable(
        "connection reset",
        std::io::Error::from(std::io::ErrorKind::ConnectionReset),
    ))
}

/// No jitter, so sleeps are exact under a paused clock
pub fn fast_policy() -> BackoffPolicy {
    BackoffPolicy {
        max_retries: 3,
        base_delay_ms: 10,
        max_delay_ms: 40,
        multiplier: 2.0,
        jitter_ratio: 0.0,
    }
}
