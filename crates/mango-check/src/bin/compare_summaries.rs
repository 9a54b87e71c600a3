#![forbid(unsafe_code)]

use mango_check::cli::{CliLayout, parse_env_args};
use mango_check::cross_file::compare_examples;

const LAYOUT: CliLayout = CliLayout {
    bin: "compare_summaries",
    positionals: &["name1", "name2"],
    output_dir: true,
    filters: true,
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
    let (first, second) = (&options.positionals[0], &options.positionals[1]);
    println!("Comparing short_summary_mpi.{first} and short_summary_mpi.{second}");

    let report = compare_examples(&cfg, first, second, &options.filter, options.mode())
        .map_err(|err| format!("[{}] {err}", err.reason_code()))?;
    println!(
        "compared {} rows; files are consistent",
        report.compared_rows
    );
    options.write_reports(&[report])
}
