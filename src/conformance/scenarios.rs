use std::any::Any;
use std::fmt::Debug;
use std::fmt::Display;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Instant;

use futures::FutureExt;
use nanoid::nanoid;
use serde::Deserialize;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::eventually::expect_error;
use super::eventually::expect_quiet;
use super::eventually::expect_snapshot;
use super::AsTest;
use super::ConformanceConfig;
use super::ConformanceFailure;
use super::ConformanceReport;
use super::Harness;
use super::ScenarioOutcome;
use super::ScenarioStatus;
use crate::Decoder;
use crate::ErrorCode;
use crate::Result;
use crate::Variable;
use crate::WatchResult;

const NAME_ALPHABET: [char; 36] = [
    'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r', 's', 't', 'u', 'v',
    'w', 'x', 'y', 'z', '0', '1', '2', '3', '4', '5', '6', '7', '8', '9',
];

type StepResult<T> = std::result::Result<T, ConformanceFailure>;

/// Built-in scenarios, in run order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    /// Missing, created, unchanged, updated, deleted: one variable end to end
    Lifecycle,
    NonExistentVariable,
    StringValue,
    JsonValue,
    InvalidJson,
    NoDuplicates,
    Update,
    DeleteAndRecreate,
    UpdateWithErrors,
    CancellationPromptness,
    Close,
}

impl Scenario {
    pub const ALL: [Scenario; 11] = [
        Scenario::Lifecycle,
        Scenario::NonExistentVariable,
        Scenario::StringValue,
        Scenario::JsonValue,
        Scenario::InvalidJson,
        Scenario::NoDuplicates,
        Scenario::Update,
        Scenario::DeleteAndRecreate,
        Scenario::UpdateWithErrors,
        Scenario::CancellationPromptness,
        Scenario::Close,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Scenario::Lifecycle => "Lifecycle",
            Scenario::NonExistentVariable => "NonExistentVariable",
            Scenario::StringValue => "StringValue",
            Scenario::JsonValue => "JsonValue",
            Scenario::InvalidJson => "InvalidJson",
            Scenario::NoDuplicates => "NoDuplicates",
            Scenario::Update => "Update",
            Scenario::DeleteAndRecreate => "DeleteAndRecreate",
            Scenario::UpdateWithErrors => "UpdateWithErrors",
            Scenario::CancellationPromptness => "CancellationPromptness",
            Scenario::Close => "Close",
        }
    }

    fn needs_mutable(&self) -> bool {
        matches!(self, Scenario::Update | Scenario::UpdateWithErrors)
    }
}

/// Payload of the JSON scenarios
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Message {
    name: String,
    text: String,
}

const JSON_PAYLOAD: &str = r#"[{"name":"foo\\bar","text":"baz"}]"#;

fn json_messages() -> Vec<Message> {
    vec![Message {
        name: "foo\\bar".into(),
        text: "baz".into(),
    }]
}

enum Body<'a> {
    Builtin(Scenario),
    As(&'a dyn AsTest),
}

/// Runs every built-in scenario, then one `As/<name>` scenario per entry of
/// `as_tests`.
///
/// Failures and panics are collected in the report instead of aborting the
/// run. Scenarios needing in-place updates are skipped when the harness says
/// the backend is immutable.
pub async fn run_conformance_tests<H, F, Fut>(
    new_harness: F,
    as_tests: &[&dyn AsTest],
    config: &ConformanceConfig,
) -> ConformanceReport
where
    H: Harness,
    F: Fn() -> Fut,
    Fut: Future<Output = Result<H>>,
{
    let mut report = ConformanceReport::default();
    for scenario in Scenario::ALL {
        let outcome = run_one(scenario.name().to_string(), Body::Builtin(scenario), &new_harness, config).await;
        report.outcomes.push(outcome);
    }
    for as_test in as_tests {
        let label = format!("As/{}", as_test.name());
        let outcome = run_one(label, Body::As(*as_test), &new_harness, config).await;
        report.outcomes.push(outcome);
    }
    report
}

async fn run_one<H, F, Fut>(
    label: String,
    body: Body<'_>,
    new_harness: &F,
    config: &ConformanceConfig,
) -> ScenarioOutcome
where
    H: Harness,
    F: Fn() -> Fut,
    Fut: Future<Output = Result<H>>,
{
    let start = Instant::now();
    let outcome = |status| ScenarioOutcome {
        scenario: label.clone(),
        status,
        elapsed: start.elapsed(),
    };

    let harness = match new_harness().await {
        Ok(h) => h,
        Err(e) => {
            let failure = failure(&label, "make harness", "a harness", e);
            return outcome(ScenarioStatus::Failed(failure));
        }
    };

    if let Body::Builtin(scenario) = &body {
        if scenario.needs_mutable() && !harness.mutable() {
            close_harness(&label, &harness).await;
            return outcome(ScenarioStatus::Skipped("backend is immutable".into()));
        }
    }

    let ctx = Ctx {
        scenario: &label,
        harness: &harness,
        name: format!("var-{}", nanoid!(12, &NAME_ALPHABET)),
        config,
    };
    debug!(scenario = %label, variable = %ctx.name, "running conformance scenario");

    let result = AssertUnwindSafe(run_body(&body, &ctx)).catch_unwind().await;

    // The variable may legitimately be gone already
    if let Err(e) = harness.delete_variable(&ctx.name).await {
        debug!(scenario = %label, error = %e, "cleanup delete failed");
    }
    close_harness(&label, &harness).await;

    let status = match result {
        Ok(Ok(())) => {
            info!(scenario = %label, "conformance scenario passed");
            ScenarioStatus::Passed
        }
        Ok(Err(f)) => {
            warn!(failure = %f, "conformance scenario failed");
            ScenarioStatus::Failed(f)
        }
        Err(payload) => {
            let f = failure(&label, "run", "no panic", panic_message(payload));
            warn!(failure = %f, "conformance scenario panicked");
            ScenarioStatus::Failed(f)
        }
    };
    outcome(status)
}

async fn close_harness<H: Harness>(
    label: &str,
    harness: &H,
) {
    if let Err(e) = harness.close().await {
        warn!(scenario = %label, error = %e, "closing harness failed");
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        format!("panic: {text}")
    } else if let Some(text) = payload.downcast_ref::<String>() {
        format!("panic: {text}")
    } else {
        "panic with a non-string payload".into()
    }
}

fn failure(
    scenario: &str,
    step: &str,
    expected: impl Display,
    actual: impl Display,
) -> ConformanceFailure {
    ConformanceFailure {
        scenario: scenario.to_string(),
        step: step.to_string(),
        expected: expected.to_string(),
        actual: actual.to_string(),
    }
}

struct Ctx<'a, H> {
    scenario: &'a str,
    harness: &'a H,
    name: String,
    config: &'a ConformanceConfig,
}

impl<H: Harness> Ctx<'_, H> {
    fn fail(
        &self,
        step: &str,
        expected: impl Display,
        actual: impl Display,
    ) -> ConformanceFailure {
        failure(self.scenario, step, expected, actual)
    }

    async fn variable<T: Send + Sync + 'static>(
        &self,
        decoder: Decoder<T>,
    ) -> StepResult<Variable<T>> {
        let watcher = self
            .harness
            .make_watcher(&self.name, decoder)
            .await
            .map_err(|e| self.fail("make watcher", "a watcher", e))?;
        Ok(Variable::new(watcher, self.config.backoff))
    }

    async fn create(
        &self,
        value: &[u8],
    ) -> StepResult<()> {
        self.harness
            .create_variable(&self.name, value)
            .await
            .map_err(|e| self.fail("create variable", "success", e))
    }

    async fn update(
        &self,
        value: &[u8],
    ) -> StepResult<()> {
        self.harness
            .update_variable(&self.name, value)
            .await
            .map_err(|e| self.fail("update variable", "success", e))
    }

    async fn delete(&self) -> StepResult<()> {
        self.harness
            .delete_variable(&self.name)
            .await
            .map_err(|e| self.fail("delete variable", "success", e))
    }

    async fn expect_value<T>(
        &self,
        step: &str,
        variable: &mut Variable<T>,
        want: &T,
    ) -> StepResult<crate::Snapshot<T>>
    where
        T: Debug + PartialEq + Send + Sync + 'static,
    {
        expect_snapshot(variable, self.config.step_timeout, |v| v == want)
            .await
            .map_err(|actual| self.fail(step, format!("value {want:?}"), actual))
    }

    async fn expect_error<T>(
        &self,
        step: &str,
        variable: &mut Variable<T>,
        code: ErrorCode,
    ) -> StepResult<crate::Error>
    where
        T: Debug + Send + Sync + 'static,
    {
        expect_error(variable, self.config.step_timeout, code)
            .await
            .map_err(|actual| self.fail(step, format!("{code:?} error"), actual))
    }

    async fn expect_quiet<T>(
        &self,
        step: &str,
        variable: &mut Variable<T>,
    ) -> StepResult<()>
    where
        T: Debug + Send + Sync + 'static,
    {
        expect_quiet(variable, self.config.quiet_period)
            .await
            .map_err(|actual| self.fail(step, format!("nothing for {:?}", self.config.quiet_period), actual))
    }

    async fn close_variable<T: Send + Sync + 'static>(
        &self,
        mut variable: Variable<T>,
    ) -> StepResult<()> {
        variable
            .close()
            .await
            .map_err(|e| self.fail("close variable", "success", e))
    }
}

async fn run_body<H: Harness>(
    body: &Body<'_>,
    ctx: &Ctx<'_, H>,
) -> StepResult<()> {
    match body {
        Body::Builtin(Scenario::Lifecycle) => lifecycle(ctx).await,
        Body::Builtin(Scenario::NonExistentVariable) => non_existent_variable(ctx).await,
        Body::Builtin(Scenario::StringValue) => string_value(ctx).await,
        Body::Builtin(Scenario::JsonValue) => json_value(ctx).await,
        Body::Builtin(Scenario::InvalidJson) => invalid_json(ctx).await,
        Body::Builtin(Scenario::NoDuplicates) => no_duplicates(ctx).await,
        Body::Builtin(Scenario::Update) => update(ctx).await,
        Body::Builtin(Scenario::DeleteAndRecreate) => delete_and_recreate(ctx).await,
        Body::Builtin(Scenario::UpdateWithErrors) => update_with_errors(ctx).await,
        Body::Builtin(Scenario::CancellationPromptness) => cancellation_promptness(ctx).await,
        Body::Builtin(Scenario::Close) => close(ctx).await,
        Body::As(as_test) => verify_as(ctx, *as_test).await,
    }
}

async fn lifecycle<H: Harness>(ctx: &Ctx<'_, H>) -> StepResult<()> {
    let mut variable = ctx.variable(Decoder::string()).await?;
    ctx.expect_error("watch missing variable", &mut variable, ErrorCode::NotFound)
        .await?;

    ctx.create(b"hello").await?;
    let first = ctx
        .expect_value("watch after create", &mut variable, &"hello".to_string())
        .await?;
    ctx.expect_quiet("watch without change", &mut variable).await?;

    if ctx.harness.mutable() {
        ctx.update(b"world").await?;
        let second = ctx
            .expect_value("watch after update", &mut variable, &"world".to_string())
            .await?;
        if second.update_time() <= first.update_time() {
            return Err(ctx.fail(
                "update time after update",
                format!("later than {:?}", first.update_time()),
                format!("{:?}", second.update_time()),
            ));
        }
    }

    ctx.delete().await?;
    ctx.expect_error("watch after delete", &mut variable, ErrorCode::NotFound)
        .await?;
    ctx.close_variable(variable).await
}

async fn non_existent_variable<H: Harness>(ctx: &Ctx<'_, H>) -> StepResult<()> {
    let mut variable = ctx.variable(Decoder::string()).await?;
    ctx.expect_error("watch missing variable", &mut variable, ErrorCode::NotFound)
        .await?;
    ctx.close_variable(variable).await
}

async fn string_value<H: Harness>(ctx: &Ctx<'_, H>) -> StepResult<()> {
    let content = "hello world";
    ctx.create(content.as_bytes()).await?;
    let mut variable = ctx.variable(Decoder::string()).await?;
    ctx.expect_value("watch string", &mut variable, &content.to_string())
        .await?;
    ctx.close_variable(variable).await
}

async fn json_value<H: Harness>(ctx: &Ctx<'_, H>) -> StepResult<()> {
    ctx.create(JSON_PAYLOAD.as_bytes()).await?;
    let mut variable = ctx.variable(Decoder::<Vec<Message>>::json()).await?;
    ctx.expect_value("watch json", &mut variable, &json_messages())
        .await?;
    ctx.close_variable(variable).await
}

async fn invalid_json<H: Harness>(ctx: &Ctx<'_, H>) -> StepResult<()> {
    ctx.create(b"not-json").await?;
    let mut variable = ctx.variable(Decoder::<Vec<Message>>::json()).await?;
    ctx.expect_error("watch invalid json", &mut variable, ErrorCode::DecodeError)
        .await?;
    ctx.close_variable(variable).await
}

async fn no_duplicates<H: Harness>(ctx: &Ctx<'_, H>) -> StepResult<()> {
    ctx.create(b"hello").await?;

    // Raw watcher: the first read is a value, never "unchanged"
    let watcher = ctx
        .harness
        .make_watcher(&ctx.name, Decoder::string())
        .await
        .map_err(|e| ctx.fail("make watcher", "a watcher", e))?;
    let cancel = CancellationToken::new();
    let deadline = tokio::time::Instant::now() + ctx.config.step_timeout;
    let first = loop {
        match tokio::time::timeout_at(deadline, watcher.watch_variable(&cancel, None)).await {
            Ok(WatchResult::Changed(snapshot)) => break snapshot,
            Ok(WatchResult::Unchanged(_)) => {
                return Err(ctx.fail("first raw watch", "Changed", "Unchanged"));
            }
            // Not visible yet
            Ok(WatchResult::Failed(e)) if e.code() == ErrorCode::NotFound => {
                tokio::time::sleep(ctx.config.backoff.base_delay()).await;
            }
            Ok(WatchResult::Failed(e)) => return Err(ctx.fail("first raw watch", "Changed", e)),
            Err(_) => return Err(ctx.fail("first raw watch", "Changed", "timeout")),
        }
    };

    for i in 0..ctx.config.unchanged_polls {
        let step = format!("raw watch #{} with current state", i + 1);
        let result = tokio::time::timeout(ctx.config.step_timeout, watcher.watch_variable(&cancel, Some(first.state().clone()))).await;
        match result {
            Ok(WatchResult::Unchanged(_)) => {}
            Ok(WatchResult::Changed(s)) => {
                return Err(ctx.fail(&step, "Unchanged", format!("duplicate value {:?}", s.value())));
            }
            Ok(WatchResult::Failed(e)) => return Err(ctx.fail(&step, "Unchanged", e)),
            Err(_) => return Err(ctx.fail(&step, "Unchanged", "timeout")),
        }
    }
    watcher
        .close()
        .await
        .map_err(|e| ctx.fail("close raw watcher", "success", e))?;

    let mut variable = ctx.variable(Decoder::string()).await?;
    ctx.expect_value("watch", &mut variable, &"hello".to_string())
        .await?;
    ctx.expect_quiet("watch again", &mut variable).await?;
    ctx.close_variable(variable).await
}

async fn update<H: Harness>(ctx: &Ctx<'_, H>) -> StepResult<()> {
    ctx.create(b"hello").await?;
    let mut variable = ctx.variable(Decoder::string()).await?;
    let first = ctx
        .expect_value("watch", &mut variable, &"hello".to_string())
        .await?;

    ctx.update(b"world").await?;
    let second = ctx
        .expect_value("watch after update", &mut variable, &"world".to_string())
        .await?;
    if second.update_time() <= first.update_time() {
        return Err(ctx.fail(
            "update time after update",
            format!("later than {:?}", first.update_time()),
            format!("{:?}", second.update_time()),
        ));
    }
    ctx.close_variable(variable).await
}

async fn delete_and_recreate<H: Harness>(ctx: &Ctx<'_, H>) -> StepResult<()> {
    ctx.create(b"hello").await?;
    let mut variable = ctx.variable(Decoder::string()).await?;
    let first = ctx
        .expect_value("watch", &mut variable, &"hello".to_string())
        .await?;

    ctx.delete().await?;
    ctx.expect_error("watch after delete", &mut variable, ErrorCode::NotFound)
        .await?;

    // Same bytes as before the delete: still a change
    ctx.create(b"hello").await?;
    let second = ctx
        .expect_value("watch after recreate", &mut variable, &"hello".to_string())
        .await?;
    if second.update_time() <= first.update_time() {
        return Err(ctx.fail(
            "update time after recreate",
            format!("later than {:?}", first.update_time()),
            format!("{:?}", second.update_time()),
        ));
    }
    ctx.close_variable(variable).await
}

async fn update_with_errors<H: Harness>(ctx: &Ctx<'_, H>) -> StepResult<()> {
    ctx.create(JSON_PAYLOAD.as_bytes()).await?;
    let mut variable = ctx.variable(Decoder::<Vec<Message>>::json()).await?;
    ctx.expect_value("watch", &mut variable, &json_messages())
        .await?;

    ctx.update(b"not-json").await?;
    ctx.expect_error("watch after bad update", &mut variable, ErrorCode::DecodeError)
        .await?;

    // The same bad content again must not surface the same error twice
    ctx.update(b"not-json").await?;
    ctx.expect_quiet("watch after identical bad update", &mut variable)
        .await?;

    ctx.update(JSON_PAYLOAD.as_bytes()).await?;
    ctx.expect_value("watch after reverting to the last good value", &mut variable, &json_messages())
        .await?;

    let fixed = vec![Message {
        name: "fixed".into(),
        text: "again".into(),
    }];
    let payload = serde_json::to_vec(&fixed).map_err(|e| ctx.fail("encode json", "bytes", e))?;
    ctx.update(&payload).await?;
    ctx.expect_value("watch after good update", &mut variable, &fixed)
        .await?;
    ctx.close_variable(variable).await
}

async fn cancellation_promptness<H: Harness>(ctx: &Ctx<'_, H>) -> StepResult<()> {
    ctx.create(b"hello").await?;
    let mut variable = ctx.variable(Decoder::string()).await?;
    ctx.expect_value("watch", &mut variable, &"hello".to_string())
        .await?;

    let cancel = CancellationToken::new();
    let limit = ctx.config.cancel_delay + ctx.config.cancel_grace;
    let canceller = async {
        tokio::time::sleep(ctx.config.cancel_delay).await;
        cancel.cancel();
    };
    let start = Instant::now();
    let (result, ()) = tokio::join!(tokio::time::timeout(limit, variable.watch(&cancel)), canceller);

    match result {
        Ok(Err(e)) if e.is_canceled() => {}
        Ok(Err(e)) => return Err(ctx.fail("watch while cancelled", "Canceled error", e)),
        Ok(Ok(s)) => {
            return Err(ctx.fail("watch while cancelled", "Canceled error", format!("value {:?}", s.value())));
        }
        Err(_) => {
            return Err(ctx.fail(
                "watch while cancelled",
                format!("return within {:?} of cancel", ctx.config.cancel_grace),
                format!("still blocked after {:?}", start.elapsed()),
            ));
        }
    }
    ctx.close_variable(variable).await
}

async fn close<H: Harness>(ctx: &Ctx<'_, H>) -> StepResult<()> {
    ctx.create(b"hello").await?;
    let mut variable = ctx.variable(Decoder::string()).await?;
    ctx.expect_value("watch", &mut variable, &"hello".to_string())
        .await?;

    variable
        .close()
        .await
        .map_err(|e| ctx.fail("first close", "success", e))?;
    variable
        .close()
        .await
        .map_err(|e| ctx.fail("second close", "success", e))?;

    match variable.watch(&CancellationToken::new()).await {
        Err(e) if e.code() == ErrorCode::Closed => Ok(()),
        Err(e) => Err(ctx.fail("watch after close", "Closed error", e)),
        Ok(s) => Err(ctx.fail("watch after close", "Closed error", format!("value {:?}", s.value()))),
    }
}

async fn verify_as<H: Harness>(
    ctx: &Ctx<'_, H>,
    as_test: &dyn AsTest,
) -> StepResult<()> {
    let mut variable = ctx.variable(Decoder::string()).await?;
    let err = ctx
        .expect_error("watch missing variable", &mut variable, ErrorCode::NotFound)
        .await?;
    as_test
        .error_check(&err)
        .map_err(|msg| ctx.fail("error check", "native error", msg))?;

    ctx.create(b"hello").await?;
    let snapshot = ctx
        .expect_value("watch after create", &mut variable, &"hello".to_string())
        .await?;
    as_test
        .snapshot_check(&snapshot)
        .map_err(|msg| ctx.fail("snapshot check", "native snapshot", msg))?;
    ctx.close_variable(variable).await
}
