//! Bounded retry helpers tolerating eventually consistent backends.
//!
//! Each helper keeps calling [`Variable::watch`] until what it waits for shows
//! up or the timeout elapses. On timeout the last thing observed is returned
//! as the error, ready to be used as the "actual" side of a failure.

use std::fmt::Debug;
use std::time::Duration;

use tokio::time::timeout;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::Error;
use crate::ErrorCode;
use crate::Snapshot;
use crate::Variable;

type Observed = String;

/// Waits for a snapshot accepted by `accept`, skipping interim values and errors.
pub(crate) async fn expect_snapshot<T, F>(
    variable: &mut Variable<T>,
    within: Duration,
    accept: F,
) -> std::result::Result<Snapshot<T>, Observed>
where
    T: Debug + Send + Sync + 'static,
    F: Fn(&T) -> bool,
{
    let cancel = CancellationToken::new();
    let deadline = Instant::now() + within;
    let mut last = String::from("nothing");

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match timeout(remaining, variable.watch(&cancel)).await {
            Err(_) => return Err(format!("{last} after {within:?}")),
            Ok(Ok(snapshot)) if accept(snapshot.value()) => return Ok(snapshot),
            Ok(Ok(snapshot)) => last = format!("value {:?}", snapshot.value()),
            Ok(Err(Error::Closed)) => return Err("variable closed".into()),
            Ok(Err(e)) => last = format!("error \"{e}\""),
        }
        trace!(%last, "not there yet");
        tokio::task::yield_now().await;
    }
}

/// Waits for an error with the given code, skipping values and other errors.
pub(crate) async fn expect_error<T>(
    variable: &mut Variable<T>,
    within: Duration,
    code: ErrorCode,
) -> std::result::Result<Error, Observed>
where
    T: Debug + Send + Sync + 'static,
{
    let cancel = CancellationToken::new();
    let deadline = Instant::now() + within;
    let mut last = String::from("nothing");

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match timeout(remaining, variable.watch(&cancel)).await {
            Err(_) => return Err(format!("{last} after {within:?}")),
            Ok(Err(e)) if e.code() == code => return Ok(e),
            Ok(Err(Error::Closed)) => return Err("variable closed".into()),
            Ok(Err(e)) => last = format!("error \"{e}\""),
            Ok(Ok(snapshot)) => last = format!("value {:?}", snapshot.value()),
        }
        trace!(%last, "not there yet");
        tokio::task::yield_now().await;
    }
}

/// Passes when the variable delivers nothing at all for `period`.
pub(crate) async fn expect_quiet<T>(
    variable: &mut Variable<T>,
    period: Duration,
) -> std::result::Result<(), Observed>
where
    T: Debug + Send + Sync + 'static,
{
    let cancel = CancellationToken::new();
    match timeout(period, variable.watch(&cancel)).await {
        Err(_) => Ok(()),
        Ok(Ok(snapshot)) => Err(format!("value {:?}", snapshot.value())),
        Ok(Err(e)) => Err(format!("error \"{e}\"")),
    }
}
