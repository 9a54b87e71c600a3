#![forbid(unsafe_code)]

//! Rows of `short_summary_mpi.*` that repeat one algorithm under different
//! MPI layouts must report the same optimization result.

use crate::{CheckConfig, CheckError, CheckReport, finish_check};
use mango_policy::{AlgorithmPolicy, CheckLedger, RowOutcome, record_outcome};
use mango_summary::{SummaryFile, SummaryRow, mpi_summary_path};

pub const CHECK_NAME: &str = "mpi_independence";

pub const FUNCTION_EVALUATIONS_FIELD: usize = 3;
pub const BEST_EVALUATION_FIELD: usize = 5;
/// Parameters and objective start here and run to the end of the row.
pub const FIRST_RESULT_FIELD: usize = 7;

pub fn verify_mpi_independence(
    config: &CheckConfig,
    example: &str,
) -> Result<CheckReport, CheckError> {
    let primary = mpi_summary_path(&config.output_dir, example);
    let outcome = SummaryFile::load_resolved(&primary)
        .map_err(CheckError::from)
        .and_then(|summary| {
            let mut ledger = CheckLedger::new();
            check_mpi_independence(&summary, &config.policy, &mut ledger)?;
            Ok(CheckReport::from_ledger(
                CHECK_NAME,
                &[summary.path.as_path()],
                ledger,
            ))
        });
    finish_check(CHECK_NAME, &[primary.as_path()], outcome)
}

pub fn check_mpi_independence(
    summary: &SummaryFile,
    policy: &AlgorithmPolicy,
    ledger: &mut CheckLedger,
) -> Result<(), CheckError> {
    for group in summary.contiguous_groups() {
        let Some((first, rest)) = group.rows.split_first() else {
            continue;
        };
        if !policy.is_deterministic(group.algorithm) {
            record_outcome(
                ledger,
                group.algorithm,
                Some(first.line_number),
                RowOutcome::SkippedNondeterministic,
                format!("{} rows not compared", group.rows.len()),
            );
            continue;
        }
        for row in rest {
            let outcome = compare_rows(summary, first, row)?;
            record_outcome(ledger, group.algorithm, Some(row.line_number), outcome, "");
        }
    }
    Ok(())
}

fn compare_rows(
    summary: &SummaryFile,
    first: &SummaryRow,
    row: &SummaryRow,
) -> Result<RowOutcome, CheckError> {
    if first.len() != row.len() {
        return Err(CheckError::StructuralMismatch(format!(
            "lines {} and {} of {} have different numbers of entries ({} and {})",
            first.line_number + 1,
            row.line_number + 1,
            summary.path.display(),
            first.len(),
            row.len()
        )));
    }
    if first.is_failed_at(FUNCTION_EVALUATIONS_FIELD)
        && row.is_failed_at(FUNCTION_EVALUATIONS_FIELD)
    {
        return Ok(RowOutcome::BothFailed);
    }

    let compared = [FUNCTION_EVALUATIONS_FIELD, BEST_EVALUATION_FIELD]
        .into_iter()
        .chain(FIRST_RESULT_FIELD..first.len());
    for index in compared {
        if first.field(index) != row.field(index) {
            return Err(CheckError::ValueMismatch(format!(
                "lines {} and {} of {} differ in field {index}: {:?} vs {:?}",
                first.line_number + 1,
                row.line_number + 1,
                summary.path.display(),
                first.field(index).unwrap_or(""),
                row.field(index).unwrap_or("")
            )));
        }
    }
    Ok(RowOutcome::Matched)
}

#[cfg(test)]
mod tests {
    use super::check_mpi_independence;
    use crate::CheckError;
    use mango_policy::{AlgorithmPolicy, CheckLedger, RowOutcome};
    use mango_summary::SummaryFile;
    use std::path::Path;

    const HEADER: &str = "Summary\nmpi\nN_parameters\n2\nalgorithm,N_procs,N_worker_groups,function_evaluations,time,best_function_evaluation,time,x(1),x(2),f\n";

    fn summary(body: &str) -> SummaryFile {
        let raw = format!("{HEADER}{body}");
        SummaryFile::from_lines(
            Path::new("short_summary_mpi.quadratic_c"),
            raw.lines().map(str::to_string).collect(),
        )
        .expect("header should parse")
    }

    fn check(body: &str) -> Result<CheckLedger, CheckError> {
        let mut ledger = CheckLedger::new();
        check_mpi_independence(&summary(body), &AlgorithmPolicy::default(), &mut ledger)?;
        Ok(ledger)
    }

    #[test]
    fn identical_results_across_layouts_pass() {
        let ledger = check(
            "nlopt_ld_mma,1,1,20,0.10,18,0.09,1.0,2.0,0.5\n\
             nlopt_ld_mma,4,2,20,0.04,18,0.03,1.0,2.0,0.5\n\
             nlopt_ld_mma,4,4,20,0.05,18,0.04,1.0,2.0,0.5\n\
             petsc_nm,1,1,40,0.3,33,0.2,1.0,1.0,0.0\n",
        )
        .expect("only timings and layout differ");
        assert_eq!(ledger.count(RowOutcome::Matched), 2);
    }

    #[test]
    fn best_evaluation_change_fails() {
        let err = check(
            "nlopt_ld_mma,1,1,20,0.10,18,0.09,1.0,2.0,0.5\n\
             nlopt_ld_mma,4,2,20,0.04,17,0.03,1.0,2.0,0.5\n",
        )
        .expect_err("field 5 differs");
        assert_eq!(err.reason_code(), "check_value_mismatch");
        let msg = err.to_string();
        assert!(msg.contains("lines 6 and 7"));
        assert!(msg.contains("field 5"));
    }

    #[test]
    fn textual_comparison_is_exact() {
        let err = check(
            "nlopt_ld_mma,1,1,20,0.10,18,0.09,1.0,2.0,0.5\n\
             nlopt_ld_mma,4,2,20,0.04,18,0.03,1.00,2.0,0.5\n",
        )
        .expect_err("1.0 and 1.00 are different text");
        assert!(err.to_string().contains("field 7"));
    }

    #[test]
    fn nondeterministic_groups_are_skipped() {
        let ledger = check(
            "nlopt_gn_crs2_lm,1,1,200,0.10,150,0.09,1.0,2.0,0.5\n\
             nlopt_gn_crs2_lm,4,2,230,0.04,190,0.03,1.1,2.1,0.6\n",
        )
        .expect("random algorithm ignored");
        assert_eq!(ledger.count(RowOutcome::SkippedNondeterministic), 1);
        assert_eq!(ledger.compared(), 0);
    }

    #[test]
    fn failures_in_every_layout_match() {
        let ledger = check(
            "nlopt_ld_mma,1,1,FAILED\n\
             nlopt_ld_mma,4,2,FAILED\n",
        )
        .expect("both failed");
        assert_eq!(ledger.count(RowOutcome::BothFailed), 1);
    }

    #[test]
    fn differing_entry_counts_are_structural() {
        let err = check(
            "nlopt_ld_mma,1,1,20,0.10,18,0.09,1.0,2.0,0.5\n\
             nlopt_ld_mma,4,2,FAILED\n",
        )
        .expect_err("10 vs 4 entries");
        assert_eq!(err.reason_code(), "check_structural_mismatch");
    }

    #[test]
    fn blank_line_separates_runs_of_one_algorithm() {
        let ledger = check(
            "nlopt_ld_mma,1,1,20,0.10,18,0.09,1.0,2.0,0.5\n\
             nlopt_ld_mma,2,1,20,0.06,18,0.05,1.0,2.0,0.5\n\
             \n\
             nlopt_ld_mma,1,1,21,0.10,19,0.09,1.0,2.0,0.5\n\
             nlopt_ld_mma,4,2,21,0.04,19,0.03,1.0,2.0,0.5\n",
        )
        .expect("each run is compared against its own first row");
        assert_eq!(ledger.count(RowOutcome::Matched), 2);
    }
}
