use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Poll loop retry policy
///
/// `base_delay_ms` is the minimum interval, doubled (by `multiplier`) on
/// every consecutive failure up to `max_delay_ms`, and reset after any
/// successful poll.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    /// Consecutive transient failures tolerated before the error is
    /// surfaced to the caller (0 means never surface, retry forever)
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Backoff base (unit: milliseconds)
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Maximum backoff time (unit: milliseconds)
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Growth factor applied after each consecutive failure
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Random spread applied to every sleep, as a fraction of the delay
    #[serde(default = "default_jitter_ratio")]
    pub jitter_ratio: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            multiplier: default_multiplier(),
            jitter_ratio: default_jitter_ratio(),
        }
    }
}

impl BackoffPolicy {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.base_delay_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "backoff base_delay_ms must be greater than 0".into(),
            )));
        }

        if self.max_delay_ms < self.base_delay_ms {
            return Err(Error::Config(ConfigError::Message(format!(
                "backoff max_delay_ms ({}) must be >= base_delay_ms ({})",
                self.max_delay_ms, self.base_delay_ms
            ))));
        }

        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(Error::Config(ConfigError::Message(format!(
                "backoff multiplier must be >= 1.0, got {}",
                self.multiplier
            ))));
        }

        if !(0.0..=1.0).contains(&self.jitter_ratio) {
            return Err(Error::Config(ConfigError::Message(format!(
                "backoff jitter_ratio must be between 0.0 and 1.0, got {}",
                self.jitter_ratio
            ))));
        }

        Ok(())
    }
}

fn default_max_retries() -> usize {
    5
}
fn default_base_delay_ms() -> u64 {
    100
}
fn default_max_delay_ms() -> u64 {
    30_000
}
fn default_multiplier() -> f64 {
    2.0
}
fn default_jitter_ratio() -> f64 {
    0.1
}
