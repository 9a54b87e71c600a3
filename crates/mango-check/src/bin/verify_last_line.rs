#![forbid(unsafe_code)]

use mango_check::cli::{CliLayout, parse_env_args};
use mango_check::consistency::verify_last_line;
use std::path::Path;

const LAYOUT: CliLayout = CliLayout {
    bin: "verify_last_line",
    positionals: &["file"],
    output_dir: false,
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
    let path = Path::new(&options.positionals[0]);

    let report =
        verify_last_line(path).map_err(|err| format!("[{}] {err}", err.reason_code()))?;
    println!("{}: last line matches the best evaluation", path.display());
    options.write_reports(&[report])
}
