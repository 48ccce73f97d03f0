use std::time::Duration;

use async_trait::async_trait;
use runtimevar::conformance::run_conformance_tests;
use runtimevar::conformance::AsTest;
use runtimevar::conformance::Harness;
use runtimevar::conformance::ScenarioStatus;
use runtimevar::Decoder;
use runtimevar::Error;
use runtimevar::Health;
use runtimevar::LatestVariable;
use runtimevar::MemoryBackendConfig;
use runtimevar::MemoryStore;
use runtimevar::MemoryStoreError;
use runtimevar::MemoryVariable;
use runtimevar::Result;
use runtimevar::RuntimeVarConfig;
use runtimevar::Snapshot;
use runtimevar::Variable;
use runtimevar::Watcher;
use tokio_util::sync::CancellationToken;

use crate::commons::conformance_config;
use crate::commons::expect_not_found;
use crate::commons::string_variable;
use crate::commons::watch_once;

struct MemoryHarness {
    store: MemoryStore,
    mutable: bool,
}

impl MemoryHarness {
    fn new(mutable: bool) -> Self {
        Self {
            store: MemoryStore::new(MemoryBackendConfig {
                long_poll_timeout_ms: 100,
            }),
            mutable,
        }
    }
}

fn backend_error(e: MemoryStoreError) -> Error {
    Error::Backend(Box::new(e))
}

#[async_trait]
impl Harness for MemoryHarness {
    async fn make_watcher<T: Send + Sync + 'static>(
        &self,
        name: &str,
        decoder: Decoder<T>,
    ) -> Result<Box<dyn Watcher<T>>> {
        Ok(Box::new(self.store.watcher(name, decoder)))
    }

    async fn create_variable(
        &self,
        name: &str,
        value: &[u8],
    ) -> Result<()> {
        self.store.create(name, value).map(|_| ()).map_err(backend_error)
    }

    async fn update_variable(
        &self,
        name: &str,
        value: &[u8],
    ) -> Result<()> {
        self.store.update(name, value).map(|_| ()).map_err(backend_error)
    }

    async fn delete_variable(
        &self,
        name: &str,
    ) -> Result<()> {
        self.store.delete(name).map_err(backend_error)
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }

    fn mutable(&self) -> bool {
        self.mutable
    }
}

/// Native objects are the store's own variable and error types
struct VerifyAs;

impl AsTest for VerifyAs {
    fn name(&self) -> &str {
        "verify As"
    }

    fn snapshot_check(
        &self,
        snapshot: &Snapshot<String>,
    ) -> std::result::Result<(), String> {
        let mut native = MemoryVariable {
            name: String::new(),
            value: Vec::new(),
            version: 0,
            update_time: std::time::SystemTime::UNIX_EPOCH,
        };
        if !snapshot.as_native(&mut native) {
            return Err("snapshot.as_native failed for MemoryVariable".into());
        }
        if native.value != snapshot.value().as_bytes() {
            return Err(format!("native value {:?} does not match snapshot", native.value));
        }
        let mut wrong = String::new();
        if snapshot.as_native(&mut wrong) {
            return Err("snapshot.as_native accepted a String".into());
        }
        Ok(())
    }

    fn error_check(
        &self,
        err: &Error,
    ) -> std::result::Result<(), String> {
        let mut native = MemoryStoreError::AlreadyExists(String::new());
        if !err.as_native(&mut native) {
            return Err(format!("error.as_native failed for MemoryStoreError: {err}"));
        }
        match native {
            MemoryStoreError::NotFound(_) => Ok(()),
            other => Err(format!("unexpected native error {other:?}")),
        }
    }
}

#[tokio::test]
async fn test_memory_backend_conformance() {
    let report = run_conformance_tests(|| async { Ok(MemoryHarness::new(true)) }, &[&VerifyAs], &conformance_config()).await;

    report.assert_passed();
    assert!(report.outcome("As/verify As").is_some());
}

#[tokio::test]
async fn test_immutable_memory_backend_conformance() {
    let report = run_conformance_tests(|| async { Ok(MemoryHarness::new(false)) }, &[&VerifyAs], &conformance_config()).await;

    report.assert_passed();
    assert!(matches!(
        report.outcome("Update").map(|o| &o.status),
        Some(ScenarioStatus::Skipped(_))
    ));
}

#[tokio::test]
async fn test_hello_world_delete() {
    let store = MemoryStore::new(MemoryBackendConfig {
        long_poll_timeout_ms: 100,
    });
    let mut variable = string_variable(store.watcher("v1", Decoder::string()));

    store.create("v1", b"hello").unwrap();
    assert_eq!(watch_once(&mut variable).await.unwrap(), "hello");

    store.update("v1", b"world").unwrap();
    assert_eq!(watch_once(&mut variable).await.unwrap(), "world");

    store.delete("v1").unwrap();
    expect_not_found(&mut variable).await;

    variable.close().await.unwrap();
}

#[tokio::test]
async fn test_watchers_built_from_config() {
    let config = RuntimeVarConfig::default();
    let store = MemoryStore::new(config.memory);
    store.set("v1", b"hello");

    let mut variable = Variable::from_config(Box::new(store.watcher("v1", Decoder::string())), &config);
    assert_eq!(watch_once(&mut variable).await.unwrap(), "hello");
    variable.close().await.unwrap();
}

#[tokio::test]
async fn test_latest_variable_follows_updates() {
    let store = MemoryStore::new(MemoryBackendConfig {
        long_poll_timeout_ms: 100,
    });
    store.create("v1", b"hello").unwrap();
    let mut latest = LatestVariable::spawn(string_variable(store.watcher("v1", Decoder::string())));
    let cancel = CancellationToken::new();

    assert_eq!(latest.latest(&cancel).await.unwrap().value(), "hello");

    store.update("v1", b"world").unwrap();
    let mut value = String::new();
    for _ in 0..300 {
        value = latest.latest(&cancel).await.unwrap().into_value();
        if value == "world" {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(value, "world");
    assert_eq!(latest.check_health(), Health::Healthy);

    latest.close().await.unwrap();
}
