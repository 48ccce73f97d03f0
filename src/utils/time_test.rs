use std::time::Duration;
use std::time::SystemTime;

use crate::time::strictly_after;
use crate::time::MIN_TIME_STEP;

#[test]
fn test_strictly_after_without_previous() {
    let now = SystemTime::now();
    assert_eq!(strictly_after(None, now), now);
}

#[test]
fn test_strictly_after_keeps_later_candidate() {
    let prev = SystemTime::UNIX_EPOCH + Duration::from_secs(5);
    let candidate = prev + Duration::from_millis(1);
    assert_eq!(strictly_after(Some(prev), candidate), candidate);
}

#[test]
fn test_strictly_after_nudges_equal_or_older_candidate() {
    let prev = SystemTime::UNIX_EPOCH + Duration::from_secs(5);
    assert_eq!(strictly_after(Some(prev), prev), prev + MIN_TIME_STEP);
    assert_eq!(
        strictly_after(Some(prev), prev - Duration::from_secs(1)),
        prev + MIN_TIME_STEP
    );
}
