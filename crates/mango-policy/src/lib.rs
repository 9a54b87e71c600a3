#![forbid(unsafe_code)]

use serde::Serialize;
use std::collections::BTreeSet;
use std::time::{SystemTime, UNIX_EPOCH};

/// Algorithms whose iteration path depends on random state.
pub const DEFAULT_NONDETERMINISTIC_ALGORITHMS: [&str; 5] = [
    "nlopt_gn_direct_l_rand",
    "nlopt_gn_direct_l_rand_noscal",
    "nlopt_gn_crs2_lm",
    "nlopt_ln_praxis",
    "petsc_pounders",
];

pub const DEFAULT_AVAILABLE_PACKAGES: [&str; 5] = ["hopspack", "nlopt", "mango", "petsc", "gsl"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlgorithmPolicy {
    nondeterministic: BTreeSet<String>,
    available_packages: Vec<String>,
}

impl AlgorithmPolicy {
    #[must_use]
    pub fn new<N, P>(nondeterministic: N, available_packages: P) -> Self
    where
        N: IntoIterator,
        N::Item: Into<String>,
        P: IntoIterator,
        P::Item: Into<String>,
    {
        Self {
            nondeterministic: nondeterministic.into_iter().map(Into::into).collect(),
            available_packages: available_packages.into_iter().map(Into::into).collect(),
        }
    }

    #[must_use]
    pub fn with_available_packages<P>(mut self, packages: P) -> Self
    where
        P: IntoIterator,
        P::Item: Into<String>,
    {
        self.available_packages = packages.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn is_deterministic(&self, algorithm: &str) -> bool {
        !self.nondeterministic.contains(algorithm.trim())
    }

    /// True when some available package name is a prefix of `algorithm`.
    #[must_use]
    pub fn package_available(&self, algorithm: &str) -> bool {
        self.available_packages
            .iter()
            .any(|package| algorithm.starts_with(package.as_str()))
    }

    #[must_use]
    pub fn available_packages(&self) -> &[String] {
        &self.available_packages
    }
}

impl Default for AlgorithmPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_NONDETERMINISTIC_ALGORITHMS,
            DEFAULT_AVAILABLE_PACKAGES,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RowOutcome {
    Matched,
    BothFailed,
    SkippedNondeterministic,
    SkippedUnavailablePackage,
    SkippedComment,
    Drift,
}

impl RowOutcome {
    #[must_use]
    pub fn is_skip(self) -> bool {
        matches!(
            self,
            Self::SkippedNondeterministic | Self::SkippedUnavailablePackage | Self::SkippedComment
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckEvent {
    pub ts_millis: u128,
    pub algorithm: String,
    pub line: Option<usize>,
    pub outcome: RowOutcome,
    pub note: String,
}

/// Per-row outcomes gathered while one check runs.
#[derive(Debug, Default, Clone, Serialize)]
pub struct CheckLedger {
    events: Vec<CheckEvent>,
}

impl CheckLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, event: CheckEvent) {
        self.events.push(event);
    }

    #[must_use]
    pub fn events(&self) -> &[CheckEvent] {
        &self.events
    }

    #[must_use]
    pub fn last(&self) -> Option<&CheckEvent> {
        self.events.last()
    }

    #[must_use]
    pub fn count(&self, outcome: RowOutcome) -> usize {
        self.events
            .iter()
            .filter(|event| event.outcome == outcome)
            .count()
    }

    /// Rows that were actually compared, failures-on-both-sides included.
    #[must_use]
    pub fn compared(&self) -> usize {
        self.count(RowOutcome::Matched) + self.count(RowOutcome::BothFailed)
    }

    #[must_use]
    pub fn skipped(&self) -> usize {
        self.events
            .iter()
            .filter(|event| event.outcome.is_skip())
            .count()
    }

    #[must_use]
    pub fn into_events(self) -> Vec<CheckEvent> {
        self.events
    }
}

pub fn record_outcome(
    ledger: &mut CheckLedger,
    algorithm: &str,
    line: Option<usize>,
    outcome: RowOutcome,
    note: impl Into<String>,
) -> RowOutcome {
    let ts_millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis());
    ledger.record(CheckEvent {
        ts_millis,
        algorithm: algorithm.trim().to_string(),
        line,
        outcome,
        note: note.into(),
    });
    outcome
}

#[cfg(test)]
mod tests {
    use super::{AlgorithmPolicy, CheckLedger, RowOutcome, record_outcome};

    #[test]
    fn default_policy_flags_random_algorithms() {
        let policy = AlgorithmPolicy::default();
        assert!(!policy.is_deterministic("nlopt_gn_crs2_lm"));
        assert!(!policy.is_deterministic(" petsc_pounders "));
        assert!(policy.is_deterministic("nlopt_ld_mma"));
        assert!(policy.is_deterministic("nlopt_gn_direct_l"));
    }

    #[test]
    fn package_prefix_matching() {
        let policy = AlgorithmPolicy::default().with_available_packages(["nlopt"]);
        assert!(policy.package_available("nlopt_ln_bobyqa"));
        assert!(!policy.package_available("petsc_nm"));
        assert!(!policy.package_available("hopspack"));
        assert_eq!(policy.available_packages(), ["nlopt".to_string()]);

        let none = AlgorithmPolicy::new(Vec::<String>::new(), Vec::<String>::new());
        assert!(!none.package_available("nlopt_ld_mma"));
        assert!(none.is_deterministic("nlopt_gn_crs2_lm"));
    }

    #[test]
    fn ledger_counts_outcomes() {
        let mut ledger = CheckLedger::new();
        record_outcome(&mut ledger, "a", Some(5), RowOutcome::Matched, "");
        record_outcome(&mut ledger, "b", Some(6), RowOutcome::BothFailed, "");
        record_outcome(&mut ledger, "c", None, RowOutcome::SkippedComment, "#");
        let action = record_outcome(
            &mut ledger,
            " d ",
            Some(8),
            RowOutcome::Drift,
            "last_function_evaluation changed",
        );
        assert_eq!(action, RowOutcome::Drift);
        assert_eq!(ledger.compared(), 2);
        assert_eq!(ledger.skipped(), 1);
        assert_eq!(ledger.count(RowOutcome::Drift), 1);
        let last = ledger.last().expect("event should be present");
        assert_eq!(last.algorithm, "d");
        assert_eq!(ledger.events().len(), 4);
    }
}
