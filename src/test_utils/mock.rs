use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::MockWatcher;
use crate::WatchResult;

/// Versions carried by the state tokens a scripted watcher received
pub type SeenTokens = Arc<Mutex<Vec<Option<u64>>>>;

/// Mock answering with `results` in order, then with `exhausted` forever.
///
/// Tokens are expected to wrap a `u64` version, as built by
/// [`changed`](super::changed).
pub fn scripted(
    results: Vec<WatchResult<String>>,
    exhausted: Duration,
) -> (MockWatcher<String>, SeenTokens) {
    let queue = Mutex::new(VecDeque::from(results));
    let seen: SeenTokens = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = seen.clone();

    let mut mock = MockWatcher::<String>::new();
    mock.expect_min_retry_delay().return_const(None::<Duration>);
    mock.expect_watch_variable().returning(move |_, prev| {
        seen_clone
            .lock()
            .push(prev.as_ref().and_then(|t| t.downcast_ref::<u64>().copied()));
        queue
            .lock()
            .pop_front()
            .unwrap_or(WatchResult::Unchanged(exhausted))
    });
    (mock, seen)
}
