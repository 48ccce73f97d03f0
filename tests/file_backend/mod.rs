use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use runtimevar::conformance::run_conformance_tests;
use runtimevar::conformance::AsTest;
use runtimevar::conformance::Harness;
use runtimevar::Decoder;
use runtimevar::Error;
use runtimevar::FileBackendConfig;
use runtimevar::FileReadError;
use runtimevar::FileVariable;
use runtimevar::FileWatcher;
use runtimevar::Result;
use runtimevar::Snapshot;
use runtimevar::Watcher;
use tempfile::NamedTempFile;
use tempfile::TempDir;

use crate::commons::conformance_config;
use crate::commons::expect_not_found;
use crate::commons::string_variable;
use crate::commons::watch_once;

const POLL_INTERVAL_IN_MS: u64 = 20;

/// One directory per harness, one file per variable
struct FileHarness {
    dir: TempDir,
}

impl FileHarness {
    fn new() -> Result<Self> {
        let dir = TempDir::new().map_err(|e| Error::Backend(Box::new(e)))?;
        Ok(Self { dir })
    }

    fn path(
        &self,
        name: &str,
    ) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Replaces the file in one rename so a reader never sees a partial write
    fn write_atomic(
        &self,
        name: &str,
        value: &[u8],
    ) -> Result<()> {
        let mut tmp = NamedTempFile::new_in(self.dir.path()).map_err(|e| Error::Backend(Box::new(e)))?;
        tmp.write_all(value).map_err(|e| Error::Backend(Box::new(e)))?;
        tmp.persist(self.path(name))
            .map_err(|e| Error::Backend(Box::new(e.error)))?;
        Ok(())
    }
}

#[async_trait]
impl Harness for FileHarness {
    async fn make_watcher<T: Send + Sync + 'static>(
        &self,
        name: &str,
        decoder: Decoder<T>,
    ) -> Result<Box<dyn Watcher<T>>> {
        let config = FileBackendConfig {
            poll_interval_ms: POLL_INTERVAL_IN_MS,
        };
        Ok(Box::new(FileWatcher::from_config(self.path(name), decoder, &config)))
    }

    async fn create_variable(
        &self,
        name: &str,
        value: &[u8],
    ) -> Result<()> {
        self.write_atomic(name, value)
    }

    async fn update_variable(
        &self,
        name: &str,
        value: &[u8],
    ) -> Result<()> {
        self.write_atomic(name, value)
    }

    async fn delete_variable(
        &self,
        name: &str,
    ) -> Result<()> {
        std::fs::remove_file(self.path(name)).map_err(|e| Error::Backend(Box::new(e)))
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }

    fn mutable(&self) -> bool {
        true
    }
}

struct VerifyAs;

impl AsTest for VerifyAs {
    fn name(&self) -> &str {
        "verify As"
    }

    fn snapshot_check(
        &self,
        snapshot: &Snapshot<String>,
    ) -> std::result::Result<(), String> {
        match snapshot.raw_as::<FileVariable>() {
            Some(native) if native.len == snapshot.value().len() as u64 => Ok(()),
            Some(native) => Err(format!("native length {} does not match snapshot", native.len)),
            None => Err("snapshot does not carry a FileVariable".into()),
        }
    }

    fn error_check(
        &self,
        err: &Error,
    ) -> std::result::Result<(), String> {
        match runtimevar::error_as::<FileReadError>(err) {
            Some(native) if native.kind == std::io::ErrorKind::NotFound => Ok(()),
            Some(native) => Err(format!("unexpected io error kind {:?}", native.kind)),
            None => Err(format!("no FileReadError behind {err}")),
        }
    }
}

#[tokio::test]
async fn test_file_backend_conformance() {
    let report = run_conformance_tests(|| async { FileHarness::new() }, &[&VerifyAs], &conformance_config()).await;
    report.assert_passed();
}

#[tokio::test]
async fn test_hello_world_delete() {
    let harness = FileHarness::new().unwrap();
    let watcher = FileWatcher::new(
        harness.path("v1"),
        Decoder::string(),
        Duration::from_millis(POLL_INTERVAL_IN_MS),
    );
    let mut variable = string_variable(watcher);

    harness.create_variable("v1", b"hello").await.unwrap();
    assert_eq!(watch_once(&mut variable).await.unwrap(), "hello");

    harness.update_variable("v1", b"world").await.unwrap();
    assert_eq!(watch_once(&mut variable).await.unwrap(), "world");

    harness.delete_variable("v1").await.unwrap();
    expect_not_found(&mut variable).await;

    variable.close().await.unwrap();
}
