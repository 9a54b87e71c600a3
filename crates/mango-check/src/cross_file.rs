#![forbid(unsafe_code)]

//! Cross-file consistency: two summary files (two language backends, or two
//! parallel configurations) must report the same results per algorithm.

use crate::tolerance::{CrossFileTolerances, relative_match};
use crate::{CheckConfig, CheckError, CheckReport, finish_check};
use mango_policy::{CheckLedger, RowOutcome, record_outcome};
use mango_summary::{SummaryFile, SummaryRow, mpi_summary_path};
use std::path::Path;

pub const CHECK_NAME: &str = "cross_file";

pub const ALGORITHM_FIELD: usize = 0;
pub const N_PROCS_FIELD: usize = 1;
pub const N_WORKER_GROUPS_FIELD: usize = 2;
pub const FUNCTION_EVALUATIONS_FIELD: usize = 3;
pub const FIRST_PARAMETER_FIELD: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AlgorithmFilter {
    #[default]
    All,
    Include(Vec<String>),
    Exclude(Vec<String>),
}

impl AlgorithmFilter {
    #[must_use]
    pub fn admits(&self, algorithm: &str) -> bool {
        match self {
            Self::All => true,
            Self::Include(names) => names.iter().any(|name| name == algorithm),
            Self::Exclude(names) => !names.iter().any(|name| name == algorithm),
        }
    }

    /// Algorithm names to compare, in order: the include list as given, or
    /// the distinct names of both files minus exclusions.
    #[must_use]
    pub fn algorithms_of_interest(&self, first: &SummaryFile, second: &SummaryFile) -> Vec<String> {
        if let Self::Include(names) = self {
            return names.clone();
        }
        let mut out: Vec<String> = Vec::new();
        for name in first
            .algorithm_names()
            .into_iter()
            .chain(second.algorithm_names())
        {
            if self.admits(name) && !out.iter().any(|seen| seen == name) {
                out.push(name.to_string());
            }
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PairingMode {
    /// Rows of each algorithm collected per file and paired by position.
    #[default]
    Grouped,
    /// Data lines paired by index; files must have equal line counts.
    LineForLine,
}

/// Loads `short_summary_mpi.{first}` and `short_summary_mpi.{second}` from the
/// configured output directory and compares them.
pub fn compare_examples(
    config: &CheckConfig,
    first_example: &str,
    second_example: &str,
    filter: &AlgorithmFilter,
    mode: PairingMode,
) -> Result<CheckReport, CheckError> {
    let first_path = mpi_summary_path(&config.output_dir, first_example);
    let second_path = mpi_summary_path(&config.output_dir, second_example);
    compare_summary_paths(config, &first_path, &second_path, filter, mode)
}

pub fn compare_summary_paths(
    config: &CheckConfig,
    first_path: &Path,
    second_path: &Path,
    filter: &AlgorithmFilter,
    mode: PairingMode,
) -> Result<CheckReport, CheckError> {
    let outcome = SummaryFile::load_resolved(first_path)
        .and_then(|first| SummaryFile::load_resolved(second_path).map(|second| (first, second)))
        .map_err(CheckError::from)
        .and_then(|(first, second)| {
            let mut ledger = CheckLedger::new();
            compare_summary_files(
                &first,
                &second,
                filter,
                mode,
                config.tolerances,
                &mut ledger,
            )?;
            Ok(CheckReport::from_ledger(
                CHECK_NAME,
                &[first.path.as_path(), second.path.as_path()],
                ledger,
            ))
        });
    finish_check(CHECK_NAME, &[first_path, second_path], outcome)
}

/// Stops at the first inconsistency.
pub fn compare_summary_files(
    first: &SummaryFile,
    second: &SummaryFile,
    filter: &AlgorithmFilter,
    mode: PairingMode,
    tolerances: CrossFileTolerances,
    ledger: &mut CheckLedger,
) -> Result<(), CheckError> {
    if first.n_parameters != second.n_parameters {
        return Err(CheckError::StructuralMismatch(format!(
            "N_parameters differs between {} ({}) and {} ({})",
            first.path.display(),
            first.n_parameters,
            second.path.display(),
            second.n_parameters
        )));
    }
    let pair = FilePair {
        first,
        second,
        tolerances,
    };
    match mode {
        PairingMode::Grouped => pair.compare_grouped(filter, ledger),
        PairingMode::LineForLine => pair.compare_line_for_line(filter, ledger),
    }
}

struct FilePair<'a> {
    first: &'a SummaryFile,
    second: &'a SummaryFile,
    tolerances: CrossFileTolerances,
}

impl FilePair<'_> {
    fn compare_grouped(
        &self,
        filter: &AlgorithmFilter,
        ledger: &mut CheckLedger,
    ) -> Result<(), CheckError> {
        let algorithms = filter.algorithms_of_interest(self.first, self.second);
        if algorithms.is_empty() {
            return Err(self.nothing_to_compare());
        }
        for algorithm in algorithms {
            let rows1 = self.first.rows_for(&algorithm);
            let rows2 = self.second.rows_for(&algorithm);
            self.require_present(&algorithm, &rows1, &rows2)?;
            if rows1.len() != rows2.len() {
                return Err(CheckError::StructuralMismatch(format!(
                    "for algorithm {algorithm}, the number of MPI options in {} ({}) does not equal the corresponding number in {} ({})",
                    self.first.path.display(),
                    rows1.len(),
                    self.second.path.display(),
                    rows2.len()
                )));
            }
            for (position, (row1, row2)) in rows1.iter().zip(&rows2).enumerate() {
                for (index, label) in [
                    (N_PROCS_FIELD, "N_procs"),
                    (N_WORKER_GROUPS_FIELD, "N_worker_groups"),
                ] {
                    let value1 = parse_int(row1, index, label, &self.first.path)?;
                    let value2 = parse_int(row2, index, label, &self.second.path)?;
                    if value1 != value2 {
                        return Err(CheckError::StructuralMismatch(format!(
                            "for algorithm {algorithm} row {position}, {label} does not match between {} and {} ({value1} vs {value2})",
                            self.first.path.display(),
                            self.second.path.display()
                        )));
                    }
                }
                self.compare_results(&algorithm, row1, row2, ledger)?;
            }
        }
        Ok(())
    }

    fn compare_line_for_line(
        &self,
        filter: &AlgorithmFilter,
        ledger: &mut CheckLedger,
    ) -> Result<(), CheckError> {
        if self.first.lines.len() != self.second.lines.len() {
            return Err(CheckError::StructuralMismatch(format!(
                "{} has {} lines but {} has {}",
                self.first.path.display(),
                self.first.lines.len(),
                self.second.path.display(),
                self.second.lines.len()
            )));
        }
        if let AlgorithmFilter::Include(names) = filter {
            for name in names {
                let rows1 = self.first.rows_for(name);
                let rows2 = self.second.rows_for(name);
                self.require_present(name, &rows1, &rows2)?;
            }
        }

        let lines1 = self.first.data_lines();
        let lines2 = self.second.data_lines();
        let offset = self.first.lines.len() - lines1.len();
        let mut compared = 0usize;
        for (idx, (line1, line2)) in lines1.iter().zip(lines2).enumerate() {
            if line1.trim().is_empty() && line2.trim().is_empty() {
                continue;
            }
            let row1 = SummaryRow::parse(offset + idx, line1);
            let row2 = SummaryRow::parse(offset + idx, line2);
            if !filter.admits(row1.algorithm()) && !filter.admits(row2.algorithm()) {
                continue;
            }
            for (index, label) in [
                (ALGORITHM_FIELD, "algorithm"),
                (N_PROCS_FIELD, "N_procs"),
                (N_WORKER_GROUPS_FIELD, "N_worker_groups"),
            ] {
                if row1.field(index) != row2.field(index) {
                    return Err(CheckError::StructuralMismatch(format!(
                        "line {}: {label} differs between {} ({:?}) and {} ({:?})",
                        row1.line_number + 1,
                        self.first.path.display(),
                        row1.field(index).unwrap_or(""),
                        self.second.path.display(),
                        row2.field(index).unwrap_or("")
                    )));
                }
            }
            self.compare_results(row1.algorithm(), &row1, &row2, ledger)?;
            compared += 1;
        }
        if compared == 0 {
            return Err(self.nothing_to_compare());
        }
        Ok(())
    }

    fn nothing_to_compare(&self) -> CheckError {
        CheckError::StructuralMismatch(format!(
            "no algorithm rows left to compare between {} and {}",
            self.first.path.display(),
            self.second.path.display()
        ))
    }

    fn require_present(
        &self,
        algorithm: &str,
        rows1: &[&SummaryRow],
        rows2: &[&SummaryRow],
    ) -> Result<(), CheckError> {
        if rows1.is_empty() {
            return Err(CheckError::MissingAlgorithm {
                algorithm: algorithm.to_string(),
                path: self.first.path.clone(),
            });
        }
        if rows2.is_empty() {
            return Err(CheckError::MissingAlgorithm {
                algorithm: algorithm.to_string(),
                path: self.second.path.clone(),
            });
        }
        Ok(())
    }

    fn compare_results(
        &self,
        algorithm: &str,
        row1: &SummaryRow,
        row2: &SummaryRow,
        ledger: &mut CheckLedger,
    ) -> Result<(), CheckError> {
        let lines = format!("lines {} and {}", row1.line_number + 1, row2.line_number + 1);
        let failed1 = row1.is_failed_at(FUNCTION_EVALUATIONS_FIELD);
        let failed2 = row2.is_failed_at(FUNCTION_EVALUATIONS_FIELD);
        if failed1 && failed2 {
            record_outcome(
                ledger,
                algorithm,
                Some(row1.line_number),
                RowOutcome::BothFailed,
                lines,
            );
            return Ok(());
        }
        if failed1 || failed2 {
            return Err(self.value_mismatch(
                algorithm,
                &lines,
                "function_evaluations",
                row1,
                row2,
                FUNCTION_EVALUATIONS_FIELD,
            ));
        }

        let evals1 = parse_int(
            row1,
            FUNCTION_EVALUATIONS_FIELD,
            "function_evaluations",
            &self.first.path,
        )?;
        let evals2 = parse_int(
            row2,
            FUNCTION_EVALUATIONS_FIELD,
            "function_evaluations",
            &self.second.path,
        )?;
        if evals1 != evals2 {
            return Err(self.value_mismatch(
                algorithm,
                &lines,
                "function_evaluations",
                row1,
                row2,
                FUNCTION_EVALUATIONS_FIELD,
            ));
        }

        let n_parameters = self.first.n_parameters;
        for j in 0..n_parameters {
            let index = FIRST_PARAMETER_FIELD + j;
            let x1 = parse_float(row1, index, &self.first.path)?;
            let x2 = parse_float(row2, index, &self.second.path)?;
            if !relative_match(x1, x2, self.tolerances.solution_vector) {
                return Err(self.value_mismatch(
                    algorithm,
                    &lines,
                    &format!("x[{j}]"),
                    row1,
                    row2,
                    index,
                ));
            }
        }

        let index = FIRST_PARAMETER_FIELD + n_parameters;
        let f1 = parse_float(row1, index, &self.first.path)?;
        let f2 = parse_float(row2, index, &self.second.path)?;
        if !relative_match(f1, f2, self.tolerances.objective) {
            return Err(self.value_mismatch(
                algorithm,
                &lines,
                "the objective function",
                row1,
                row2,
                index,
            ));
        }

        record_outcome(
            ledger,
            algorithm,
            Some(row1.line_number),
            RowOutcome::Matched,
            lines,
        );
        Ok(())
    }

    fn value_mismatch(
        &self,
        algorithm: &str,
        lines: &str,
        what: &str,
        row1: &SummaryRow,
        row2: &SummaryRow,
        index: usize,
    ) -> CheckError {
        CheckError::ValueMismatch(format!(
            "for algorithm {algorithm} ({lines}), {what} does not match between {} and {}: {} vs {}",
            self.first.path.display(),
            self.second.path.display(),
            row1.field(index).unwrap_or("").trim(),
            row2.field(index).unwrap_or("").trim()
        ))
    }
}

fn parse_int(row: &SummaryRow, index: usize, label: &str, path: &Path) -> Result<i64, CheckError> {
    let raw = row.field(index).unwrap_or("");
    raw.trim().parse::<i64>().map_err(|_| {
        CheckError::MalformedRow(format!(
            "line {} of {}: {label} field {index} is not an integer: {raw:?}",
            row.line_number + 1,
            path.display()
        ))
    })
}

fn parse_float(row: &SummaryRow, index: usize, path: &Path) -> Result<f64, CheckError> {
    let raw = row.field(index).unwrap_or("");
    raw.trim().parse::<f64>().map_err(|_| {
        CheckError::MalformedRow(format!(
            "line {} of {}: field {index} is not a number: {raw:?}",
            row.line_number + 1,
            path.display()
        ))
    })
}
