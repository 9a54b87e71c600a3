#![forbid(unsafe_code)]

//! A per-run output file repeats its best evaluation as the final line.
//! The first field of that line is the 1-based index of the best
//! evaluation, and the evaluations start after a 5-line header.

use crate::{CheckError, CheckReport, finish_check};
use mango_policy::{CheckLedger, RowOutcome, record_outcome};
use mango_summary::{FIELD_DELIMITER, read_lines};
use std::path::Path;

pub const CHECK_NAME: &str = "last_line";

pub const MIN_LINES: usize = 7;
pub const MIN_LAST_LINE_FIELDS: usize = 4;
/// Index of evaluation `k` is `k + EVALUATION_LINE_OFFSET`.
pub const EVALUATION_LINE_OFFSET: usize = 4;

pub fn verify_last_line(path: &Path) -> Result<CheckReport, CheckError> {
    let outcome = read_lines(path)
        .map_err(CheckError::from)
        .and_then(|lines| {
            let mut ledger = CheckLedger::new();
            check_last_line(path, &lines, &mut ledger)?;
            Ok(CheckReport::from_ledger(CHECK_NAME, &[path], ledger))
        });
    finish_check(CHECK_NAME, &[path], outcome)
}

pub fn check_last_line(
    path: &Path,
    lines: &[String],
    ledger: &mut CheckLedger,
) -> Result<(), CheckError> {
    if lines.len() < MIN_LINES {
        return Err(CheckError::StructuralMismatch(format!(
            "{} has only {} lines; at least {MIN_LINES} are required",
            path.display(),
            lines.len()
        )));
    }
    let last_index = lines.len() - 1;
    let last = lines[last_index].as_str();

    let fields: Vec<&str> = last.split(FIELD_DELIMITER).collect();
    if fields.len() < MIN_LAST_LINE_FIELDS {
        return Err(CheckError::StructuralMismatch(format!(
            "last line of {} has {} fields; at least {MIN_LAST_LINE_FIELDS} are required",
            path.display(),
            fields.len()
        )));
    }

    let best = fields[0].trim().parse::<usize>().map_err(|_| {
        CheckError::MalformedRow(format!(
            "last line of {}: best function evaluation {:?} is not a non-negative integer",
            path.display(),
            fields[0]
        ))
    })?;

    let target_index = best + EVALUATION_LINE_OFFSET;
    let Some(target) = lines.get(target_index) else {
        return Err(CheckError::StructuralMismatch(format!(
            "{}: best function evaluation {best} points past the end of the file ({} lines)",
            path.display(),
            lines.len()
        )));
    };

    if target != last {
        return Err(CheckError::ValueMismatch(format!(
            "{}: line {} does not match the last line\n  line {}: {target}\n  last:    {last}",
            path.display(),
            target_index + 1,
            target_index + 1
        )));
    }

    record_outcome(
        ledger,
        "",
        Some(target_index),
        RowOutcome::Matched,
        format!("evaluation {best} repeated on the last line"),
    );
    Ok(())
}
