#![forbid(unsafe_code)]

use core::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Number of fixed header lines preceding row data.
pub const HEADER_LINES: usize = 5;
/// 0-based line carrying the parameter count.
pub const N_PARAMETERS_LINE: usize = 3;
pub const FIELD_DELIMITER: char = ',';
pub const FAILED_MARKER: &str = "FAILED";

pub const SUMMARY_MPI_PREFIX: &str = "short_summary_mpi";
pub const SUMMARY_PREFIX: &str = "short_summary";
pub const REFERENCE_SUFFIX: &str = ".reference";

pub const SUMMARY_REASON_CODES: [&str; 2] = ["summary_io_failed", "summary_header_malformed"];

#[derive(Debug)]
pub enum SummaryError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    MalformedHeader {
        path: PathBuf,
        detail: String,
    },
}

impl SummaryError {
    #[must_use]
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::Io { .. } => "summary_io_failed",
            Self::MalformedHeader { .. } => "summary_header_malformed",
        }
    }
}

impl fmt::Display for SummaryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "unable to open summary file {}: {source}", path.display())
            }
            Self::MalformedHeader { path, detail } => write!(
                f,
                "unable to read N_parameters on line {} of {}: {detail}",
                N_PARAMETERS_LINE + 1,
                path.display()
            ),
        }
    }
}

impl std::error::Error for SummaryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::MalformedHeader { .. } => None,
        }
    }
}

/// Returns `primary` when it names an existing file, otherwise the same
/// relative path one directory up. Absolute paths are returned unchanged.
#[must_use]
pub fn resolve_summary_path(primary: &Path) -> PathBuf {
    if primary.is_file() || primary.is_absolute() {
        primary.to_path_buf()
    } else {
        Path::new("..").join(primary)
    }
}

/// `{output_dir}/short_summary_mpi.{example}`
#[must_use]
pub fn mpi_summary_path(output_dir: &Path, example: &str) -> PathBuf {
    output_dir.join(format!("{SUMMARY_MPI_PREFIX}.{example}"))
}

/// `{output_dir}/short_summary.{example}`
#[must_use]
pub fn summary_path(output_dir: &Path, example: &str) -> PathBuf {
    output_dir.join(format!("{SUMMARY_PREFIX}.{example}"))
}

#[must_use]
pub fn reference_path_for(live_path: &Path) -> PathBuf {
    let mut raw = live_path.as_os_str().to_os_string();
    raw.push(REFERENCE_SUFFIX);
    PathBuf::from(raw)
}

pub fn read_lines(path: &Path) -> Result<Vec<String>, SummaryError> {
    let text = fs::read_to_string(path).map_err(|source| SummaryError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(text.lines().map(str::to_string).collect())
}

#[must_use]
pub fn split_fields(line: &str) -> Vec<String> {
    line.split(FIELD_DELIMITER).map(str::to_string).collect()
}

#[must_use]
pub fn is_failed(field: &str) -> bool {
    field.trim() == FAILED_MARKER
}

/// One comma-split data line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryRow {
    /// 0-based line number within the file, header included.
    pub line_number: usize,
    pub fields: Vec<String>,
}

impl SummaryRow {
    #[must_use]
    pub fn parse(line_number: usize, line: &str) -> Self {
        Self {
            line_number,
            fields: split_fields(line),
        }
    }

    /// Untrimmed first field.
    #[must_use]
    pub fn algorithm(&self) -> &str {
        self.fields.first().map_or("", String::as_str)
    }

    #[must_use]
    pub fn field(&self, index: usize) -> Option<&str> {
        self.fields.get(index).map(String::as_str)
    }

    /// `from_end = 1` is the last field.
    #[must_use]
    pub fn field_from_end(&self, from_end: usize) -> Option<&str> {
        if from_end == 0 || from_end > self.fields.len() {
            return None;
        }
        self.field(self.fields.len() - from_end)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    #[must_use]
    pub fn is_failed_at(&self, index: usize) -> bool {
        self.field(index).is_some_and(is_failed)
    }
}

/// Rows of one algorithm, in file order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlgorithmGroup<'a> {
    pub algorithm: &'a str,
    pub rows: Vec<&'a SummaryRow>,
}

#[derive(Debug, Clone)]
pub struct SummaryFile {
    pub path: PathBuf,
    pub lines: Vec<String>,
    pub n_parameters: usize,
    rows: Vec<SummaryRow>,
}

impl SummaryFile {
    /// Reads `path` as given, without the `../` fallback.
    pub fn load(path: &Path) -> Result<Self, SummaryError> {
        let lines = read_lines(path)?;
        Self::from_lines(path, lines)
    }

    /// Reads the file at `primary`, retrying one directory up when it is missing.
    pub fn load_resolved(primary: &Path) -> Result<Self, SummaryError> {
        let resolved = resolve_summary_path(primary);
        let lines = read_lines(&resolved).map_err(|err| match err {
            SummaryError::Io { source, .. } => SummaryError::Io {
                path: primary.to_path_buf(),
                source,
            },
            other => other,
        })?;
        Self::from_lines(&resolved, lines)
    }

    pub fn from_lines(path: &Path, lines: Vec<String>) -> Result<Self, SummaryError> {
        let n_parameters = parse_n_parameters(path, &lines)?;
        let rows = lines
            .iter()
            .enumerate()
            .skip(HEADER_LINES)
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(idx, line)| SummaryRow::parse(idx, line))
            .collect();
        Ok(Self {
            path: path.to_path_buf(),
            lines,
            n_parameters,
            rows,
        })
    }

    #[must_use]
    pub fn rows(&self) -> &[SummaryRow] {
        &self.rows
    }

    /// Data lines including blanks, for positional comparisons.
    #[must_use]
    pub fn data_lines(&self) -> &[String] {
        self.lines.get(HEADER_LINES..).unwrap_or(&[])
    }

    #[must_use]
    pub fn rows_for(&self, algorithm: &str) -> Vec<&SummaryRow> {
        self.rows
            .iter()
            .filter(|row| row.algorithm() == algorithm)
            .collect()
    }

    /// Distinct algorithm names in order of first appearance.
    #[must_use]
    pub fn algorithm_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for row in &self.rows {
            let name = row.algorithm();
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    /// Runs of adjacent rows sharing an algorithm name. A blank line ends a run.
    #[must_use]
    pub fn contiguous_groups(&self) -> Vec<AlgorithmGroup<'_>> {
        let mut groups: Vec<AlgorithmGroup<'_>> = Vec::new();
        for row in &self.rows {
            match groups.last_mut() {
                Some(group)
                    if group.algorithm == row.algorithm()
                        && group
                            .rows
                            .last()
                            .is_some_and(|prev| prev.line_number + 1 == row.line_number) =>
                {
                    group.rows.push(row);
                }
                _ => groups.push(AlgorithmGroup {
                    algorithm: row.algorithm(),
                    rows: vec![row],
                }),
            }
        }
        groups
    }
}

fn parse_n_parameters(path: &Path, lines: &[String]) -> Result<usize, SummaryError> {
    let Some(line) = lines.get(N_PARAMETERS_LINE) else {
        return Err(SummaryError::MalformedHeader {
            path: path.to_path_buf(),
            detail: format!("file has only {} lines", lines.len()),
        });
    };
    line.trim()
        .parse::<usize>()
        .map_err(|err| SummaryError::MalformedHeader {
            path: path.to_path_buf(),
            detail: format!("'{}' is not an integer ({err})", line.trim()),
        })
}
