#![forbid(unsafe_code)]

//! Regression check of a fresh `short_summary.*` file against its curated
//! `.reference` file. Algorithm order may differ and reference algorithms from
//! packages that are not available are ignored, but every retained reference
//! algorithm must be present in the new file.

use crate::tolerance::absolute_match;
use crate::{CheckConfig, CheckError, CheckReport, finish_check};
use mango_policy::{AlgorithmPolicy, CheckLedger, RowOutcome, record_outcome};
use mango_summary::{
    HEADER_LINES, SummaryError, SummaryFile, SummaryRow, is_failed, read_lines,
    reference_path_for, resolve_summary_path, summary_path,
};
use std::path::{Path, PathBuf};

pub const CHECK_NAME: &str = "regression";

pub const LAST_FUNCTION_EVALUATION_FIELD: usize = 1;
pub const BEST_FUNCTION_EVALUATION_FIELD: usize = 3;
pub const FIRST_PARAMETER_FIELD: usize = 5;
/// Reference rows carry `N_parameters + 8` fields.
pub const REFERENCE_EXTRA_FIELDS: usize = 8;

// Counted from the end of a reference row.
const REFERENCE_OBJECTIVE_FROM_END: usize = 3;
const REFERENCE_ABS_TOL_X_FROM_END: usize = 2;
const REFERENCE_ABS_TOL_F_FROM_END: usize = 1;

/// Freshly generated rows, searched by algorithm name.
#[derive(Debug, Clone)]
pub struct LiveSummary {
    pub path: PathBuf,
    rows: Vec<SummaryRow>,
}

impl LiveSummary {
    pub fn load(path: &Path) -> Result<Self, SummaryError> {
        Ok(Self::from_lines(path, &read_lines(path)?))
    }

    #[must_use]
    pub fn from_lines(path: &Path, lines: &[String]) -> Self {
        let rows = lines
            .iter()
            .enumerate()
            .skip(HEADER_LINES)
            .map(|(idx, line)| SummaryRow::parse(idx, line))
            .collect();
        Self {
            path: path.to_path_buf(),
            rows,
        }
    }

    #[must_use]
    pub fn find(&self, algorithm: &str) -> Option<&SummaryRow> {
        self.rows
            .iter()
            .find(|row| row.algorithm().trim() == algorithm)
    }
}

/// Compares `{output_dir}/short_summary.{example}` with its `.reference` twin.
pub fn run_regression_check(
    config: &CheckConfig,
    example: &str,
) -> Result<CheckReport, CheckError> {
    let primary = summary_path(&config.output_dir, example);
    let live_path = resolve_summary_path(&primary);
    let reference_path = reference_path_for(&live_path);
    let outcome = LiveSummary::load(&live_path)
        .map_err(|err| match err {
            SummaryError::Io { source, .. } => SummaryError::Io {
                path: primary.clone(),
                source,
            },
            other => other,
        })
        .and_then(|live| SummaryFile::load(&reference_path).map(|reference| (live, reference)))
        .map_err(CheckError::from)
        .and_then(|(live, reference)| {
            let mut ledger = CheckLedger::new();
            compare_with_reference(&live, &reference, &config.policy, &mut ledger)?;
            Ok(CheckReport::from_ledger(
                CHECK_NAME,
                &[live.path.as_path(), reference.path.as_path()],
                ledger,
            ))
        });
    finish_check(
        CHECK_NAME,
        &[live_path.as_path(), reference_path.as_path()],
        outcome,
    )
}

/// Walks the reference rows; returns at the first numeric regression.
/// Iteration-count drift is recorded in the ledger only.
pub fn compare_with_reference(
    live: &LiveSummary,
    reference: &SummaryFile,
    policy: &AlgorithmPolicy,
    ledger: &mut CheckLedger,
) -> Result<(), CheckError> {
    let n_parameters = reference.n_parameters;
    for (idx, line) in reference.lines.iter().enumerate().skip(HEADER_LINES) {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed.starts_with('#') || trimmed.starts_with('!') {
            record_outcome(
                ledger,
                "",
                Some(idx),
                RowOutcome::SkippedComment,
                trimmed.to_string(),
            );
            continue;
        }

        let reference_row = SummaryRow::parse(idx, line);
        let algorithm = reference_row.algorithm().trim();
        if !policy.package_available(algorithm) {
            record_outcome(
                ledger,
                algorithm,
                Some(idx),
                RowOutcome::SkippedUnavailablePackage,
                "package not available",
            );
            continue;
        }

        let Some(live_row) = live.find(algorithm) else {
            return Err(CheckError::MissingAlgorithm {
                algorithm: algorithm.to_string(),
                path: live.path.clone(),
            });
        };

        if live_row.field_from_end(1).is_some_and(is_failed)
            && reference_row.field_from_end(1).is_some_and(is_failed)
        {
            record_outcome(
                ledger,
                algorithm,
                Some(idx),
                RowOutcome::BothFailed,
                "failures in both the new and reference files",
            );
            continue;
        }

        let expected_entries = n_parameters + REFERENCE_EXTRA_FIELDS;
        if reference_row.len() != expected_entries {
            return Err(CheckError::StructuralMismatch(format!(
                "number of elements is wrong on line {} of {}: expected {expected_entries}, found {}",
                idx + 1,
                reference.path.display(),
                reference_row.len()
            )));
        }

        if policy.is_deterministic(algorithm) {
            for (index, label) in [
                (LAST_FUNCTION_EVALUATION_FIELD, "last_function_evaluation"),
                (BEST_FUNCTION_EVALUATION_FIELD, "best_function_evaluation"),
            ] {
                let old = reference_row.field(index).unwrap_or("").trim();
                let new = live_row.field(index).unwrap_or("").trim();
                if old != new {
                    record_outcome(
                        ledger,
                        algorithm,
                        Some(idx),
                        RowOutcome::Drift,
                        format!(
                            "for algorithm {algorithm}, {label} has changed: reference {old}, new {new}"
                        ),
                    );
                }
            }
        }

        let abs_tolerance_f = from_end(
            &reference_row,
            REFERENCE_ABS_TOL_F_FROM_END,
            "abs_tolerance_f",
            &reference.path,
        )?;
        let old_f = from_end(
            &reference_row,
            REFERENCE_OBJECTIVE_FROM_END,
            "reference objective",
            &reference.path,
        )?;
        let new_f = from_end(live_row, 1, "objective", &live.path)?;
        if !absolute_match(old_f, new_f, abs_tolerance_f) {
            return Err(CheckError::ValueMismatch(format!(
                "significant difference in objective function for {algorithm}! reference val={old_f:.15e}, new val={new_f:.15e}, diff={:.3e}, abs_tol={abs_tolerance_f:.3e}",
                (old_f - new_f).abs()
            )));
        }

        let abs_tolerance_x = from_end(
            &reference_row,
            REFERENCE_ABS_TOL_X_FROM_END,
            "abs_tolerance_x",
            &reference.path,
        )?;
        for j in 0..n_parameters {
            let index = FIRST_PARAMETER_FIELD + j;
            let old_x = at(&reference_row, index, &reference.path)?;
            let new_x = at(live_row, index, &live.path)?;
            if !absolute_match(old_x, new_x, abs_tolerance_x) {
                return Err(CheckError::ValueMismatch(format!(
                    "significant difference in x({}) for {algorithm}! reference val={old_x:.15e}, new val={new_x:.15e}, diff={:.3e}, abs_tol={abs_tolerance_x:.3e}",
                    j + 1,
                    (old_x - new_x).abs()
                )));
            }
        }

        record_outcome(
            ledger,
            algorithm,
            Some(idx),
            RowOutcome::Matched,
            format!("f and {n_parameters} parameters within tolerance"),
        );
    }
    Ok(())
}

fn from_end(
    row: &SummaryRow,
    from_end: usize,
    label: &str,
    path: &Path,
) -> Result<f64, CheckError> {
    let raw = row.field_from_end(from_end).unwrap_or("");
    parse_value(raw, label, row, path)
}

fn at(row: &SummaryRow, index: usize, path: &Path) -> Result<f64, CheckError> {
    let raw = row.field(index).unwrap_or("");
    parse_value(raw, &format!("field {index}"), row, path)
}

fn parse_value(
    raw: &str,
    label: &str,
    row: &SummaryRow,
    path: &Path,
) -> Result<f64, CheckError> {
    raw.trim().parse::<f64>().map_err(|_| {
        CheckError::MalformedRow(format!(
            "line {} of {}: error converting {label} to a number: {raw:?}",
            row.line_number + 1,
            path.display()
        ))
    })
}
