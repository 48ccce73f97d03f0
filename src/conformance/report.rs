use std::fmt;
use std::time::Duration;

/// A scenario step that did not observe what the contract requires.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("[{scenario}] {step}: expected {expected}, got {actual}")]
pub struct ConformanceFailure {
    pub scenario: String,
    pub step: String,
    pub expected: String,
    pub actual: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScenarioStatus {
    Passed,
    /// Not applicable to this backend, with the reason
    Skipped(String),
    Failed(ConformanceFailure),
}

#[derive(Debug, Clone)]
pub struct ScenarioOutcome {
    pub scenario: String,
    pub status: ScenarioStatus,
    pub elapsed: Duration,
}

/// Result of a full conformance run, one outcome per scenario in run order.
#[derive(Debug, Clone, Default)]
pub struct ConformanceReport {
    pub outcomes: Vec<ScenarioOutcome>,
}

impl ConformanceReport {
    pub fn is_success(&self) -> bool {
        self.failures().is_empty()
    }

    pub fn failures(&self) -> Vec<&ConformanceFailure> {
        self.outcomes
            .iter()
            .filter_map(|o| match &o.status {
                ScenarioStatus::Failed(f) => Some(f),
                _ => None,
            })
            .collect()
    }

    pub fn outcome(
        &self,
        scenario: &str,
    ) -> Option<&ScenarioOutcome> {
        self.outcomes.iter().find(|o| o.scenario == scenario)
    }

    /// Panics with the whole report unless every scenario passed or was skipped.
    #[track_caller]
    pub fn assert_passed(&self) {
        if !self.is_success() {
            panic!("conformance failures:\n{}", self);
        }
    }
}

impl fmt::Display for ConformanceReport {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        for o in &self.outcomes {
            match &o.status {
                ScenarioStatus::Passed => writeln!(f, "PASS {} ({:?})", o.scenario, o.elapsed)?,
                ScenarioStatus::Skipped(reason) => writeln!(f, "SKIP {}: {}", o.scenario, reason)?,
                ScenarioStatus::Failed(failure) => writeln!(f, "FAIL {}", failure)?,
            }
        }
        Ok(())
    }
}
