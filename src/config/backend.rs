use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// In-process backend settings
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct MemoryBackendConfig {
    /// Longest time a single watch call parks waiting for a change
    ///
    /// Range: 1-600000
    /// Default: 30000 (30 seconds)
    #[serde(default = "default_long_poll_timeout_ms")]
    pub long_poll_timeout_ms: u64,
}

impl Default for MemoryBackendConfig {
    fn default() -> Self {
        Self {
            long_poll_timeout_ms: default_long_poll_timeout_ms(),
        }
    }
}

impl MemoryBackendConfig {
    pub fn long_poll_timeout(&self) -> Duration {
        Duration::from_millis(self.long_poll_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=600_000).contains(&self.long_poll_timeout_ms) {
            return Err(Error::Config(ConfigError::Message(format!(
                "memory long_poll_timeout_ms must be between 1 and 600000, got {}",
                self.long_poll_timeout_ms
            ))));
        }
        Ok(())
    }
}

/// File backend settings
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct FileBackendConfig {
    /// Delay the file watcher recommends between two reads
    ///
    /// Range: 1-3600000
    /// Default: 1000 (1 second)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for FileBackendConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl FileBackendConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=3_600_000).contains(&self.poll_interval_ms) {
            return Err(Error::Config(ConfigError::Message(format!(
                "file poll_interval_ms must be between 1 and 3600000, got {}",
                self.poll_interval_ms
            ))));
        }
        Ok(())
    }
}

fn default_long_poll_timeout_ms() -> u64 {
    30_000
}

fn default_poll_interval_ms() -> u64 {
    1000
}
