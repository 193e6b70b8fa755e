//! nqbench Report - Result Tables
//!
//! Serializes sweep results:
//! - CSV (the canonical result table)
//! - JSON (records plus run metadata)

mod atomic;
mod csv;
mod json;
mod record;

pub use atomic::atomic_write;
pub use csv::{parse_csv, to_csv_string};
pub use json::{ReportMeta, ResultReport, SweepInfo, SystemInfo, generate_json_report};
pub use record::{CSV_COLUMNS, ResultRecord, ResultTable};

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while writing or reading result tables
#[derive(Debug, Error)]
pub enum ReportError {
    /// Filesystem failure on the given path
    #[error("failed to access {}: {source}", .path.display())]
    Io {
        /// Path being read or written
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The first line is not the expected column header
    #[error("unexpected CSV header: {found:?}")]
    Header {
        /// Header line actually found
        found: String,
    },

    /// A data row could not be parsed
    #[error("invalid CSV row {row}: {message}")]
    Row {
        /// 1-based line number
        row: usize,
        /// What was wrong with it
        message: String,
    },

    /// JSON serialization failure
    #[error("failed to serialize JSON report: {0}")]
    Json(#[from] serde_json::Error),
}

/// Output format selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// CSV result table
    #[default]
    Csv,
    /// JSON with run metadata
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(OutputFormat::Csv),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown format: {}", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Csv => f.write_str("csv"),
            OutputFormat::Json => f.write_str("json"),
        }
    }
}

/// Atomically write the table as CSV.
pub fn write_csv(path: &Path, table: &ResultTable) -> Result<(), ReportError> {
    atomic_write(path, to_csv_string(table).as_bytes()).map_err(|source| ReportError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Read a CSV result table from disk.
pub fn read_csv(path: &Path) -> Result<ResultTable, ReportError> {
    let text = std::fs::read_to_string(path).map_err(|source| ReportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_csv(&text)
}

/// Atomically write the JSON report.
pub fn write_json(path: &Path, report: &ResultReport) -> Result<(), ReportError> {
    let json = generate_json_report(report)?;
    atomic_write(path, json.as_bytes()).map_err(|source| ReportError::Io {
        path: path.to_path_buf(),
        source,
    })
}
