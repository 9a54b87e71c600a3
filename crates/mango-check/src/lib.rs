#![forbid(unsafe_code)]

pub mod cli;
pub mod consistency;
pub mod cross_file;
pub mod language_independence;
pub mod mpi_independence;
pub mod reference;
pub mod tolerance;

use crate::tolerance::CrossFileTolerances;
use core::fmt;
use mango_policy::{AlgorithmPolicy, CheckEvent, CheckLedger, RowOutcome};
use mango_summary::SummaryError;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt::Write as _;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

pub const CHECK_REASON_CODES: [&str; 6] = [
    "check_structural_mismatch",
    "check_value_mismatch",
    "check_missing_algorithm",
    "check_row_malformed",
    "check_log_failed",
    "check_report_failed",
];

#[derive(Debug, Clone)]
pub struct CheckConfig {
    pub output_dir: PathBuf,
    pub policy: AlgorithmPolicy,
    pub tolerances: CrossFileTolerances,
}

impl CheckConfig {
    /// `output/` relative to the working directory, or `MANGO_OUTPUT_DIR`.
    #[must_use]
    pub fn default_paths() -> Self {
        let output_dir = std::env::var_os("MANGO_OUTPUT_DIR")
            .map(PathBuf::from)
            .filter(|path| !path.as_os_str().is_empty())
            .unwrap_or_else(|| PathBuf::from("output"));
        Self {
            output_dir,
            policy: AlgorithmPolicy::default(),
            tolerances: CrossFileTolerances::default(),
        }
    }

    #[must_use]
    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    #[must_use]
    pub fn with_policy(mut self, policy: AlgorithmPolicy) -> Self {
        self.policy = policy;
        self
    }
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self::default_paths()
    }
}

#[derive(Debug)]
pub enum CheckError {
    Summary(SummaryError),
    StructuralMismatch(String),
    ValueMismatch(String),
    MissingAlgorithm { algorithm: String, path: PathBuf },
    MalformedRow(String),
    Log(String),
    Report(String),
}

impl CheckError {
    #[must_use]
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::Summary(err) => err.reason_code(),
            Self::StructuralMismatch(_) => "check_structural_mismatch",
            Self::ValueMismatch(_) => "check_value_mismatch",
            Self::MissingAlgorithm { .. } => "check_missing_algorithm",
            Self::MalformedRow(_) => "check_row_malformed",
            Self::Log(_) => "check_log_failed",
            Self::Report(_) => "check_report_failed",
        }
    }
}

impl fmt::Display for CheckError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Summary(err) => write!(f, "{err}"),
            Self::StructuralMismatch(msg)
            | Self::ValueMismatch(msg)
            | Self::MalformedRow(msg)
            | Self::Log(msg)
            | Self::Report(msg) => write!(f, "{msg}"),
            Self::MissingAlgorithm { algorithm, path } => write!(
                f,
                "no results for algorithm {algorithm} in file {}",
                path.display()
            ),
        }
    }
}

impl std::error::Error for CheckError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Summary(err) => Some(err),
            _ => None,
        }
    }
}

impl From<SummaryError> for CheckError {
    fn from(err: SummaryError) -> Self {
        Self::Summary(err)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub check: &'static str,
    pub inputs: Vec<String>,
    pub compared_rows: usize,
    pub skipped_rows: usize,
    pub warnings: Vec<String>,
    pub events: Vec<CheckEvent>,
}

impl CheckReport {
    #[must_use]
    pub fn from_ledger(check: &'static str, inputs: &[&Path], ledger: CheckLedger) -> Self {
        let warnings = ledger
            .events()
            .iter()
            .filter(|event| event.outcome == RowOutcome::Drift)
            .map(|event| event.note.clone())
            .collect();
        Self {
            check,
            inputs: inputs
                .iter()
                .map(|path| path.display().to_string())
                .collect(),
            compared_rows: ledger.compared(),
            skipped_rows: ledger.skipped(),
            warnings,
            events: ledger.into_events(),
        }
    }
}

pub fn write_check_report(path: &Path, report: &CheckReport) -> Result<(), CheckError> {
    write_pretty_json(path, report)
}

/// Writes several reports as one JSON array.
pub fn write_check_reports(path: &Path, reports: &[CheckReport]) -> Result<(), CheckError> {
    write_pretty_json(path, reports)
}

fn write_pretty_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), CheckError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|err| {
            CheckError::Report(format!("failed creating {}: {err}", parent.display()))
        })?;
    }
    let raw = serde_json::to_string_pretty(value)
        .map_err(|err| CheckError::Report(format!("failed to serialize check report: {err}")))?;
    fs::write(path, raw)
        .map_err(|err| CheckError::Report(format!("failed writing {}: {err}", path.display())))
}

static CHECK_LOG_PATH: OnceLock<Mutex<Option<PathBuf>>> = OnceLock::new();

pub fn set_check_log_path(path: Option<PathBuf>) {
    let cell = CHECK_LOG_PATH.get_or_init(|| Mutex::new(None));
    if let Ok(mut slot) = cell.lock() {
        *slot = path;
    }
}

fn configured_log_path() -> Option<PathBuf> {
    let configured = CHECK_LOG_PATH
        .get()
        .and_then(|cell| cell.lock().ok())
        .and_then(|slot| slot.clone());
    let from_env = std::env::var_os("MANGO_CHECK_LOG_PATH").map(PathBuf::from);
    configured.or(from_env)
}

#[derive(Debug, Serialize)]
struct CheckLogEntry<'a> {
    ts_unix_ms: u128,
    check: &'a str,
    inputs: Vec<String>,
    input_digest: String,
    outcome: &'static str,
    reason_code: &'static str,
    compared_rows: usize,
    warnings: usize,
    detail: String,
}

fn now_unix_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis())
}

/// SHA-256 over the bytes of every readable input, in order.
fn digest_inputs(inputs: &[&Path]) -> String {
    let mut hasher = Sha256::new();
    for path in inputs {
        if let Ok(bytes) = fs::read(path) {
            hasher.update(&bytes);
        }
    }
    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(&mut out, "{byte:02x}");
    }
    out
}

fn maybe_append_check_log(entry: &CheckLogEntry<'_>) -> Result<(), CheckError> {
    let Some(path) = configured_log_path() else {
        return Ok(());
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|err| {
            CheckError::Log(format!("failed creating {}: {err}", parent.display()))
        })?;
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|err| CheckError::Log(format!("failed opening {}: {err}", path.display())))?;
    let line = serde_json::to_string(entry)
        .map_err(|err| CheckError::Log(format!("failed serializing check log entry: {err}")))?;
    let mut payload = line.into_bytes();
    payload.push(b'\n');
    file.write_all(&payload).map_err(|err| {
        CheckError::Log(format!("failed appending check log {}: {err}", path.display()))
    })
}

/// Appends one log line for a finished check and hands the outcome back.
///
/// A failed log write only surfaces when the check itself passed.
pub(crate) fn finish_check(
    check: &'static str,
    inputs: &[&Path],
    outcome: Result<CheckReport, CheckError>,
) -> Result<CheckReport, CheckError> {
    if configured_log_path().is_none() {
        return outcome;
    }
    let entry = match &outcome {
        Ok(report) => CheckLogEntry {
            ts_unix_ms: now_unix_ms(),
            check,
            inputs: report.inputs.clone(),
            input_digest: digest_inputs(inputs),
            outcome: "pass",
            reason_code: "check_passed",
            compared_rows: report.compared_rows,
            warnings: report.warnings.len(),
            detail: String::new(),
        },
        Err(err) => CheckLogEntry {
            ts_unix_ms: now_unix_ms(),
            check,
            inputs: inputs
                .iter()
                .map(|path| path.display().to_string())
                .collect(),
            input_digest: digest_inputs(inputs),
            outcome: "fail",
            reason_code: err.reason_code(),
            compared_rows: 0,
            warnings: 0,
            detail: err.to_string(),
        },
    };
    let logged = maybe_append_check_log(&entry);
    match (outcome, logged) {
        (Ok(_), Err(log_err)) => Err(log_err),
        (outcome, _) => outcome,
    }
}
