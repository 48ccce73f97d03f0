//! Exponential backoff with jitter, driven by [`BackoffPolicy`].

use std::time::Duration;

use rand::Rng;
use tracing::warn;

use crate::BackoffPolicy;

/// Per-variable backoff counter. Not shared between variables.
#[derive(Debug, Clone)]
pub(crate) struct Backoff {
    policy: BackoffPolicy,
    base: Duration,
    current: Duration,
    consecutive_failures: usize,
}

impl Backoff {
    /// `hint` is the backend suggested minimum interval, if any
    pub(crate) fn new(
        policy: BackoffPolicy,
        hint: Option<Duration>,
    ) -> Self {
        let policy = sanitized(policy);
        let base = hint.unwrap_or_else(|| policy.base_delay()).min(policy.max_delay());
        Self {
            policy,
            base,
            current: base,
            consecutive_failures: 0,
        }
    }

    pub(crate) fn consecutive_failures(&self) -> usize {
        self.consecutive_failures
    }

    /// Delay to sleep after a failed poll; grows for the next failure
    pub(crate) fn next_failure_delay(&mut self) -> Duration {
        self.consecutive_failures += 1;
        let delay = self.current;
        let grown = self.current.as_nanos() as f64 * self.policy.multiplier;
        let ceiling = self.policy.max_delay().as_nanos() as f64;
        self.current = Duration::from_nanos(grown.min(ceiling) as u64);
        self.jittered(delay)
    }

    /// Any successful poll starts the sequence over
    pub(crate) fn reset(&mut self) {
        self.current = self.base;
        self.consecutive_failures = 0;
    }

    /// Whether transient failures have used up the retry budget
    pub(crate) fn exhausted(&self) -> bool {
        self.policy.max_retries != 0 && self.consecutive_failures >= self.policy.max_retries
    }

    /// Spreads `delay` by the jitter ratio and caps it at the ceiling
    pub(crate) fn jittered(
        &self,
        delay: Duration,
    ) -> Duration {
        let ceiling = self.policy.max_delay();
        let ratio = self.policy.jitter_ratio;
        if ratio <= 0.0 || delay.is_zero() {
            return delay.min(ceiling);
        }
        let factor = rand::thread_rng().gen_range((1.0 - ratio)..=(1.0 + ratio));
        Duration::from_nanos((delay.as_nanos() as f64 * factor) as u64).min(ceiling)
    }
}

/// Clamps factors a policy that skipped `validate()` may carry, so the
/// arithmetic below never sees NaN or a shrinking multiplier.
fn sanitized(mut policy: BackoffPolicy) -> BackoffPolicy {
    let jitter_ratio = if policy.jitter_ratio.is_finite() {
        policy.jitter_ratio.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let multiplier = if policy.multiplier.is_finite() && policy.multiplier >= 1.0 {
        policy.multiplier
    } else {
        1.0
    };
    if jitter_ratio != policy.jitter_ratio || multiplier != policy.multiplier {
        warn!(
            jitter_ratio = policy.jitter_ratio,
            multiplier = policy.multiplier,
            "backoff policy out of range, clamping"
        );
    }
    policy.jitter_ratio = jitter_ratio;
    policy.multiplier = multiplier;
    policy
}
