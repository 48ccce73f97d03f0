//! Configuration management for runtime variable watching.
//!
//! Provides hierarchical configuration loading and validation with:
//! - Default values as code base
//! - Configuration file named by `RUNTIMEVAR_CONFIG_PATH`
//! - Environment variable overrides (`RUNTIMEVAR__` prefix)
//! - Component-wise validation
mod backend;
mod retry;
pub use backend::*;
pub use retry::*;
#[cfg(test)]
mod config_test;
use std::env;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::Result;

/// Environment variable naming an extra configuration file
pub const CONFIG_PATH_ENV: &str = "RUNTIMEVAR_CONFIG_PATH";

const ENV_PREFIX: &str = "RUNTIMEVAR";

/// Main configuration container
///
/// Combines all subsystem configurations with hierarchical override support:
/// 1. Default values from code implementation
/// 2. Configuration file specified by `RUNTIMEVAR_CONFIG_PATH`
/// 3. Environment variables (highest priority)
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct RuntimeVarConfig {
    /// Poll loop backoff policy
    #[serde(default)]
    pub backoff: BackoffPolicy,
    /// In-process backend settings
    #[serde(default)]
    pub memory: MemoryBackendConfig,
    /// File backend settings
    #[serde(default)]
    pub file: FileBackendConfig,
}

impl RuntimeVarConfig {
    /// Loads configuration from hierarchical sources without validation.
    ///
    /// Callers MUST call `validate()` after all overrides are applied.
    ///
    /// # Examples
    /// ```ignore
    /// std::env::set_var("RUNTIMEVAR__BACKOFF__MAX_DELAY_MS", "5000");
    /// let cfg = RuntimeVarConfig::new()?.validate()?;
    /// ```
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var(CONFIG_PATH_ENV) {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }

        builder = builder.add_source(Self::environment());

        let config: Self = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Applies additional configuration overrides from file without validation.
    ///
    /// Merging order (later sources override earlier):
    /// 1. Current configuration values
    /// 2. New configuration file
    /// 3. Latest environment variables (highest priority)
    pub fn with_override_config(
        &self,
        path: &str,
    ) -> Result<Self> {
        let config: Self = Config::builder()
            .add_source(Config::try_from(self)?)
            .add_source(File::with_name(path))
            .add_source(Self::environment())
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Validates configuration and returns validated instance.
    pub fn validate(self) -> Result<Self> {
        self.backoff.validate()?;
        self.memory.validate()?;
        self.file.validate()?;
        Ok(self)
    }

    fn environment() -> Environment {
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .ignore_empty(true)
            .try_parsing(true)
    }
}
