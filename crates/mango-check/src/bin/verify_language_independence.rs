#![forbid(unsafe_code)]

use mango_check::cli::{CliLayout, parse_env_args};
use mango_check::language_independence::{language_independence_plan, run_plan};

const LAYOUT: CliLayout = CliLayout {
    bin: "verify_language_independence",
    positionals: &[],
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
    let plan = language_independence_plan();
    for pair in &plan {
        println!(
            "{} vs {}: {} algorithms",
            pair.first,
            pair.second,
            pair.algorithms.len()
        );
    }

    let reports =
        run_plan(&cfg, &plan).map_err(|err| format!("[{}] {err}", err.reason_code()))?;
    println!(
        "{} example pairs consistent across languages",
        reports.len()
    );
    options.write_reports(&reports)
}
