use std::time::Duration;
use std::time::SystemTime;

/// Smallest step used to keep update times strictly increasing
pub(crate) const MIN_TIME_STEP: Duration = Duration::from_nanos(1);

/// Returns `candidate`, nudged forward so it is strictly after `prev`.
pub(crate) fn strictly_after(
    prev: Option<SystemTime>,
    candidate: SystemTime,
) -> SystemTime {
    match prev {
        Some(prev) if candidate <= prev => prev + MIN_TIME_STEP,
        _ => candidate,
    }
}
