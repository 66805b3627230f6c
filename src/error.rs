use std::path::PathBuf;

use thiserror::Error;

use crate::domain::{ReportType, Source};

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("invalid inbox filename '{filename}': {rule}")]
    InvalidFilename { filename: String, rule: String },

    #[error("missing required inbox report {source}:{report_type}:{year}")]
    MissingRequiredReport {
        source: Source,
        report_type: ReportType,
        year: i32,
    },

    #[error(
        "ambiguous selection for {source}:{report_type}:{year}: \
         '{left}' and '{right}' share the same report date and modified time"
    )]
    AmbiguousSelection {
        source: Source,
        report_type: ReportType,
        year: i32,
        left: String,
        right: String,
    },

    #[error("header mismatch in {file}: required columns missing [{}]", .missing.join("; "))]
    HeaderMismatch { file: String, missing: Vec<String> },

    #[error("invalid value in {file} row {row}, field '{field}': {reason}")]
    InvalidRowValue {
        file: String,
        row: usize,
        field: &'static str,
        reason: String,
    },

    #[error("path escapes inbox root: {} (root: {})", .path.display(), .root.display())]
    PathEscapesRoot { path: PathBuf, root: PathBuf },

    #[error("inbox file too large: {} is {actual} bytes; limit is {limit} bytes", .path.display())]
    FileTooLarge {
        path: PathBuf,
        limit: u64,
        actual: u64,
    },

    #[error(
        "reconciliation mismatch for {source} {year}: \
         total gross {total_gross:.2} vs itemized gross {itemized_gross:.2} (delta {delta:.2})"
    )]
    ReconciliationMismatch {
        source: Source,
        year: i32,
        total_gross: f64,
        itemized_gross: f64,
        delta: f64,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, IngestError>;
