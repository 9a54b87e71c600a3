#![forbid(unsafe_code)]

use mango_check::cli::{CliLayout, parse_env_args};
use mango_check::mpi_independence::verify_mpi_independence;

const LAYOUT: CliLayout = CliLayout {
    bin: "verify_mpi_independence",
    positionals: &["name"],
    output_dir: true,
    filters: false,
    packages: false,
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

    let report = verify_mpi_independence(&cfg, example)
        .map_err(|err| format!("[{}] {err}", err.reason_code()))?;
    println!(
        "short_summary_mpi.{example}: {} rows agree across MPI layouts, {} groups skipped",
        report.compared_rows, report.skipped_rows
    );
    options.write_reports(&[report])
}
