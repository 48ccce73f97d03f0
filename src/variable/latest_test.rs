use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::*;
use crate::test_utils::changed;
use crate::test_utils::fast_policy;
use crate::test_utils::scripted;
use crate::DecodeError;
use crate::Error;
use crate::ErrorCode;
use crate::WatchResult;

fn variable(results: Vec<WatchResult<String>>) -> Variable<String> {
    let (mut mock, _) = scripted(results, Duration::from_millis(10));
    mock.expect_close().times(1).returning(|| Ok(()));

    Variable::new(Box::new(mock), fast_policy())
}

async fn wait_for_health(
    latest: &LatestVariable<String>,
    predicate: impl Fn(&Health) -> bool,
) -> Health {
    for _ in 0..1000 {
        let health = latest.check_health();
        if predicate(&health) {
            return health;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("health never reached the expected state: {:?}", latest.check_health());
}

#[tokio::test(start_paused = true)]
async fn test_latest_waits_for_first_good_value() {
    let mut latest = LatestVariable::spawn(variable(vec![
        WatchResult::Failed(Error::not_found("v1")),
        changed("hello", 1, 1),
    ]));

    let snapshot = latest.latest(&CancellationToken::new()).await.unwrap();
    assert_eq!(snapshot.value(), "hello");

    let health = wait_for_health(&latest, |h| *h == Health::Healthy).await;
    assert_eq!(health, Health::Healthy);
    latest.close().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_unhealthy_before_any_value() {
    let mut latest = LatestVariable::spawn(variable(vec![WatchResult::Failed(Error::not_found("v1"))]));

    let health = wait_for_health(&latest, |h| matches!(h, Health::Unhealthy { message, .. } if message.contains("v1"))).await;
    match health {
        Health::Unhealthy { code, .. } => assert_eq!(code, ErrorCode::NotFound),
        other => panic!("no value was ever delivered, got {:?}", other),
    }
    latest.close().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_error_keeps_previous_value() {
    let mut latest = LatestVariable::spawn(variable(vec![
        changed("hello", 1, 1),
        WatchResult::Failed(Error::decode("v1", DecodeError::new(b"{", "eof"))),
    ]));

    let health = wait_for_health(&latest, |h| {
        matches!(
            h,
            Health::Unhealthy {
                code: ErrorCode::DecodeError,
                ..
            }
        )
    })
    .await;
    assert!(matches!(
        health,
        Health::Unhealthy {
            code: ErrorCode::DecodeError,
            ..
        }
    ));

    let snapshot = latest.latest(&CancellationToken::new()).await.unwrap();
    assert_eq!(snapshot.value(), "hello");
    latest.close().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_latest_respects_cancel() {
    let mut latest = LatestVariable::spawn(variable(vec![]));
    let cancel = CancellationToken::new();
    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });

    let err = latest.latest(&cancel).await.unwrap_err();
    assert!(err.is_canceled());
    latest.close().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_close_stops_refresher() {
    let mut latest = LatestVariable::spawn(variable(vec![changed("hello", 1, 1)]));
    latest.latest(&CancellationToken::new()).await.unwrap();

    latest.close().await.unwrap();
    // Second close is a no-op; the mock only allows one backend close
    latest.close().await.unwrap();

    // The last good value stays readable after shutdown
    assert_eq!(latest.latest(&CancellationToken::new()).await.unwrap().value(), "hello");
}

#[tokio::test(start_paused = true)]
async fn test_pending_before_first_poll() {
    let mut latest = LatestVariable::spawn(variable(vec![changed("hello", 1, 1)]));

    // The refresher task has not run yet on this single threaded runtime
    assert_eq!(latest.check_health(), Health::Pending);

    latest.latest(&CancellationToken::new()).await.unwrap();
    assert_eq!(wait_for_health(&latest, |h| *h == Health::Healthy).await, Health::Healthy);
    latest.close().await.unwrap();
}
