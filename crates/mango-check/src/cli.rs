#![forbid(unsafe_code)]

//! Argument handling shared by the check binaries.

use crate::cross_file::{AlgorithmFilter, PairingMode};
use crate::{CheckConfig, CheckReport, set_check_log_path, write_check_report};
use mango_policy::AlgorithmPolicy;
use std::path::PathBuf;

/// Flags and positionals one binary accepts.
#[derive(Debug, Clone, Copy)]
pub struct CliLayout {
    pub bin: &'static str,
    pub positionals: &'static [&'static str],
    pub output_dir: bool,
    pub filters: bool,
    pub packages: bool,
}

impl CliLayout {
    #[must_use]
    pub fn usage(&self) -> String {
        let mut out = format!("Usage: cargo run -p mango-check --bin {} --", self.bin);
        for name in self.positionals {
            out.push_str(&format!(" <{name}>"));
        }
        if self.filters {
            out.push_str(" [--include a,b,..|--exclude a,b,..] [--line-for-line]");
        }
        if self.packages {
            out.push_str(" [--packages p1,p2,..]");
        }
        if self.output_dir {
            out.push_str(" [--output-dir <dir>]");
        }
        out.push_str(" [--log-path <path>] [--report <path>]");
        out
    }

    #[must_use]
    pub fn failure_line(&self, err: &str) -> String {
        format!("{} failed: {err}", self.bin)
    }

    /// Prints the failure on stdout, where the example harness reads diagnostics.
    pub fn report_failure(&self, err: &str) {
        println!("{}", self.failure_line(err));
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliOptions {
    pub positionals: Vec<String>,
    pub output_dir: Option<PathBuf>,
    pub log_path: Option<PathBuf>,
    pub report_path: Option<PathBuf>,
    pub filter: AlgorithmFilter,
    pub line_for_line: bool,
    pub packages: Option<Vec<String>>,
    pub help: bool,
}

impl CliOptions {
    /// `CheckConfig::default_paths()` with `--output-dir` and `--packages` applied.
    #[must_use]
    pub fn config(&self) -> CheckConfig {
        let mut cfg = CheckConfig::default_paths();
        if let Some(dir) = &self.output_dir {
            cfg = cfg.with_output_dir(dir.clone());
        }
        if let Some(packages) = &self.packages {
            let policy = AlgorithmPolicy::default().with_available_packages(packages.clone());
            cfg = cfg.with_policy(policy);
        }
        cfg
    }

    #[must_use]
    pub fn mode(&self) -> PairingMode {
        if self.line_for_line {
            PairingMode::LineForLine
        } else {
            PairingMode::Grouped
        }
    }

    /// Routes check log entries to `--log-path` when one was given.
    pub fn install_log_path(&self) {
        if let Some(path) = &self.log_path {
            set_check_log_path(Some(path.clone()));
        }
    }

    pub fn write_reports(&self, reports: &[CheckReport]) -> Result<(), String> {
        let Some(path) = &self.report_path else {
            return Ok(());
        };
        let result = match reports {
            [single] => write_check_report(path, single),
            many => crate::write_check_reports(path, many),
        };
        result.map_err(|err| err.to_string())?;
        println!("wrote {}", path.display());
        Ok(())
    }
}

fn split_list(flag: &str, value: &str) -> Result<Vec<String>, String> {
    let names: Vec<String> = value
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect();
    if names.is_empty() {
        return Err(format!("{flag} requires at least one name, got '{value}'"));
    }
    Ok(names)
}

pub fn parse_args<I>(layout: &CliLayout, args: I) -> Result<CliOptions, String>
where
    I: IntoIterator<Item = String>,
{
    let mut options = CliOptions::default();
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        let mut value_for = |flag: &str| {
            args.next()
                .ok_or_else(|| format!("{flag} requires a value"))
        };
        match arg.as_str() {
            "--output-dir" if layout.output_dir => {
                options.output_dir = Some(PathBuf::from(value_for("--output-dir")?));
            }
            "--log-path" => {
                options.log_path = Some(PathBuf::from(value_for("--log-path")?));
            }
            "--report" => {
                options.report_path = Some(PathBuf::from(value_for("--report")?));
            }
            "--include" | "--exclude" if layout.filters => {
                if options.filter != AlgorithmFilter::All {
                    return Err(
                        "--include and --exclude may be given only once, and not together"
                            .to_string(),
                    );
                }
                let names = split_list(&arg, &value_for(arg.as_str())?)?;
                options.filter = if arg == "--include" {
                    AlgorithmFilter::Include(names)
                } else {
                    AlgorithmFilter::Exclude(names)
                };
            }
            "--line-for-line" if layout.filters => options.line_for_line = true,
            "--packages" if layout.packages => {
                options.packages = Some(split_list("--packages", &value_for("--packages")?)?);
            }
            "--help" | "-h" => options.help = true,
            flag if flag.starts_with("--") => return Err(format!("unknown argument: {flag}")),
            _ => options.positionals.push(arg),
        }
    }

    if !options.help && options.positionals.len() != layout.positionals.len() {
        return Err(format!(
            "expected {} positional argument(s), got {}\n{}",
            layout.positionals.len(),
            options.positionals.len(),
            layout.usage()
        ));
    }
    Ok(options)
}

/// Parses `std::env::args`, printing usage and exiting 0 on `--help`.
pub fn parse_env_args(layout: &CliLayout) -> Result<CliOptions, String> {
    let options = parse_args(layout, std::env::args().skip(1))?;
    if options.help {
        println!("{}", layout.usage());
        std::process::exit(0);
    }
    options.install_log_path();
    Ok(options)
}
