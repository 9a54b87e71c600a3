#![forbid(unsafe_code)]

use mango_check::cli::{CliLayout, parse_env_args};
use mango_check::reference::run_regression_check;

const LAYOUT: CliLayout = CliLayout {
    bin: "run_regression_check",
    positionals: &["name"],
    output_dir: true,
    filters: false,
    packages: true,
};

fn main() {
    if let Err(err) = run() {
        LAYOUT.report_failure(&err);
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let options = parse_env_args(&LAYOUT)?;
    let cfg = options.config();
    let example = &options.positionals[0];
    println!(
        "Checking short_summary.{example} against its reference (packages: {})",
        cfg.policy.available_packages().join(",")
    );

    let report = run_regression_check(&cfg, example)
        .map_err(|err| format!("[{}] {err}", err.reason_code()))?;
    for warning in &report.warnings {
        println!("warning: {warning}");
    }
    println!(
        "compared {} algorithms, skipped {}; no significant differences",
        report.compared_rows, report.skipped_rows
    );
    options.write_reports(&[report])
}
