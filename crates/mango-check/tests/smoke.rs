use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use mango_check::consistency::verify_last_line;
use mango_check::cross_file::{AlgorithmFilter, PairingMode, compare_examples};
use mango_check::language_independence::{
    BASE_ALGORITHMS, DIRECT_ALGORITHMS, NONDIFFERENTIABLE_EXTRAS, verify_language_independence,
};
use mango_check::mpi_independence::verify_mpi_independence;
use mango_check::reference::run_regression_check;
use mango_check::{CheckConfig, CheckError};
use mango_policy::{AlgorithmPolicy, RowOutcome};

fn fixture_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures")
}

fn fixture_config() -> CheckConfig {
    CheckConfig::default_paths().with_output_dir(fixture_dir())
}

fn temp_output_dir(name: &str) -> PathBuf {
    let ts_nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_nanos());
    let dir = std::env::temp_dir().join(format!(
        "mango_{name}_{}_{}",
        std::process::id(),
        ts_nanos
    ));
    fs::create_dir_all(&dir).expect("temp output dir");
    dir
}

fn exclude_random() -> AlgorithmFilter {
    AlgorithmFilter::Exclude(vec!["nlopt_gn_crs2_lm".to_string()])
}

#[test]
fn c_and_fortran_summaries_agree_outside_random_algorithms() {
    let cfg = fixture_config();
    let report = compare_examples(
        &cfg,
        "quadratic_c",
        "quadratic_f",
        &exclude_random(),
        PairingMode::Grouped,
    )
    .expect("deterministic algorithms agree");
    assert_eq!(report.check, "cross_file");
    assert_eq!(report.compared_rows, 6);
    assert_eq!(
        report
            .events
            .iter()
            .filter(|event| event.outcome == RowOutcome::BothFailed)
            .count(),
        2
    );

    compare_examples(
        &cfg,
        "quadratic_c",
        "quadratic_f",
        &exclude_random(),
        PairingMode::LineForLine,
    )
    .expect("line-for-line agrees too");
}

#[test]
fn unfiltered_comparison_trips_on_random_algorithm() {
    let err = compare_examples(
        &fixture_config(),
        "quadratic_c",
        "quadratic_f",
        &AlgorithmFilter::All,
        PairingMode::Grouped,
    )
    .expect_err("crs2_lm takes a different number of evaluations");
    assert_eq!(err.reason_code(), "check_value_mismatch");
    assert!(err.to_string().contains("nlopt_gn_crs2_lm"));
}

#[test]
fn included_algorithm_missing_from_files() {
    let err = compare_examples(
        &fixture_config(),
        "quadratic_c",
        "quadratic_f",
        &AlgorithmFilter::Include(vec!["nlopt_ld_slsqp".to_string()]),
        PairingMode::Grouped,
    )
    .expect_err("slsqp was never run");
    match err {
        CheckError::MissingAlgorithm { algorithm, path } => {
            assert_eq!(algorithm, "nlopt_ld_slsqp");
            assert!(path.ends_with("short_summary_mpi.quadratic_c"));
        }
        other => panic!("unexpected error {other}"),
    }
}

#[test]
fn missing_summary_file_is_an_io_error() {
    let err = compare_examples(
        &fixture_config(),
        "quadratic_c",
        "does_not_exist",
        &AlgorithmFilter::All,
        PairingMode::Grouped,
    )
    .expect_err("no such file");
    assert_eq!(err.reason_code(), "summary_io_failed");
    assert!(err.to_string().contains("short_summary_mpi.does_not_exist"));
}

#[test]
fn regression_check_against_reference() {
    let policy = AlgorithmPolicy::default().with_available_packages(["nlopt", "petsc"]);
    let cfg = fixture_config().with_policy(policy);
    let report = run_regression_check(&cfg, "quadratic_c").expect("within tolerance");
    assert_eq!(report.check, "regression");
    assert_eq!(report.compared_rows, 4);
    assert_eq!(report.skipped_rows, 2);
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].contains("nlopt_ln_bobyqa"));
    assert!(report.inputs[1].ends_with("short_summary.quadratic_c.reference"));
}

#[test]
fn regression_check_requires_every_available_package() {
    let err = run_regression_check(&fixture_config(), "quadratic_c")
        .expect_err("hopspack is expected by default but was not run");
    assert!(matches!(
        err,
        CheckError::MissingAlgorithm { ref algorithm, .. } if algorithm == "hopspack"
    ));
}

#[test]
fn mpi_sweep_is_layout_independent() {
    let report =
        verify_mpi_independence(&fixture_config(), "rosenbrock_sweep").expect("sweep agrees");
    assert_eq!(report.compared_rows, 3);
    assert_eq!(report.skipped_rows, 1);
}

#[test]
fn mpi_sweep_with_changed_result_fails() {
    let dir = temp_output_dir("mpi_sweep");
    let raw = fs::read_to_string(fixture_dir().join("short_summary_mpi.rosenbrock_sweep"))
        .expect("fixture");
    let broken = raw.replacen(
        "nlopt_ln_neldermead,4,2,112,6.1e-03,108",
        "nlopt_ln_neldermead,4,2,112,6.1e-03,109",
        1,
    );
    assert_ne!(raw, broken);
    fs::write(dir.join("short_summary_mpi.rosenbrock_sweep"), broken).expect("write");

    let cfg = CheckConfig::default_paths().with_output_dir(&dir);
    let err = verify_mpi_independence(&cfg, "rosenbrock_sweep").expect_err("field 5 changed");
    assert_eq!(err.reason_code(), "check_value_mismatch");
    assert!(err.to_string().contains("field 5"));
    let _ = fs::remove_dir_all(dir);
}

#[test]
fn last_line_repeats_best_evaluation() {
    let path = fixture_dir().join("mango_out.quadratic_c");
    let report = verify_last_line(&path).expect("best evaluation repeated");
    assert_eq!(report.compared_rows, 1);
}

fn write_language_pair(dir: &Path, first: &str, second: &str, algorithms: &[&str]) {
    let mut body = String::from(
        "Summary\nlanguage\nN_parameters:\n2\nalgorithm,N_procs,N_worker_groups,function_evaluations,x(1),x(2),f\n",
    );
    for (idx, name) in algorithms.iter().enumerate() {
        body.push_str(&format!(
            "{name},1,1,{},1.0000000000000000e+00,2.0000000000000000e+00,{}e-20\n",
            idx + 10,
            idx + 1
        ));
    }
    fs::write(dir.join(format!("short_summary_mpi.{first}")), &body).expect("write first");
    fs::write(dir.join(format!("short_summary_mpi.{second}")), &body).expect("write second");
}

#[test]
fn language_independence_plan_runs_every_pair() {
    let dir = temp_output_dir("language");
    let quadratic: Vec<&str> = BASE_ALGORITHMS
        .iter()
        .chain(DIRECT_ALGORITHMS.iter())
        .copied()
        .collect();
    let nondifferentiable: Vec<&str> = BASE_ALGORITHMS
        .iter()
        .chain(NONDIFFERENTIABLE_EXTRAS.iter())
        .copied()
        .collect();
    write_language_pair(&dir, "quadratic_c", "quadratic_f", &quadratic);
    write_language_pair(&dir, "rosenbrock_c", "rosenbrock_f", &BASE_ALGORITHMS);
    write_language_pair(
        &dir,
        "nondifferentiable_c",
        "nondifferentiable_f",
        &nondifferentiable,
    );

    let cfg = CheckConfig::default_paths().with_output_dir(&dir);
    let reports = verify_language_independence(&cfg).expect("identical pairs");
    assert_eq!(reports.len(), 3);
    assert_eq!(reports[0].compared_rows, 20);
    assert_eq!(reports[1].compared_rows, 14);
    assert_eq!(reports[2].compared_rows, 17);

    // Rosenbrock Fortran build loses one algorithm.
    let partial: Vec<&str> = BASE_ALGORITHMS[1..].to_vec();
    write_language_pair(&dir, "rosenbrock_f", "rosenbrock_unused", &partial);
    let err = verify_language_independence(&cfg).expect_err("petsc_nm missing");
    assert!(matches!(
        err,
        CheckError::MissingAlgorithm { ref algorithm, ref path }
            if algorithm == "petsc_nm" && path.ends_with("short_summary_mpi.rosenbrock_f")
    ));
    let _ = fs::remove_dir_all(dir);
}
