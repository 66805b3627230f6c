//! Run manifest: the audit record of one ingestion run.
//!
//! A `RunContext` is created at run start, populated by each stage, and
//! serialized exactly once when the run reaches a terminal state. A run that
//! aborts with a hard error never leaves a manifest behind.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::config::RunPolicy;
use crate::domain::{ReportType, Source};
use crate::error::Result;
use crate::hashing;
use crate::pipeline::ingestion::scan::ScanRejection;
use crate::pipeline::processing::normalize::NormalizeOutcome;
use crate::pipeline::processing::reconcile::ReconciliationResult;

#[derive(Debug, Clone, Serialize)]
pub struct SelectedFileEntry {
    pub source: Source,
    pub report_type: ReportType,
    pub year: i32,
    pub report_date: NaiveDate,
    pub inbox_path: String,
    pub copied_path: Option<String>,
    pub size_bytes: u64,
    pub sha256: String,
    pub selection_reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RejectedFileEntry {
    pub entry: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileErrorEntry {
    pub file: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HeaderOutcomeEntry {
    pub file: String,
    pub schema: String,
    pub schema_version: String,
    /// canonical field -> header column as written in the file.
    pub resolved: Vec<(String, String)>,
    /// Optional fields falling back to their default.
    pub defaulted: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NormalizationEntry {
    pub file: String,
    pub rows_emitted: usize,
    pub rows_skipped_empty_date: usize,
    pub rows_out_of_year: usize,
}

/// The fixed-shape audit document written at the end of a run.
#[derive(Debug, Serialize)]
pub struct Manifest {
    pub run_id: String,
    /// The only field allowed to differ between identical re-runs.
    pub generated_at: DateTime<Utc>,
    pub years: Vec<i32>,
    pub policy: RunPolicy,
    pub selected_files: Vec<SelectedFileEntry>,
    pub rejected_files: Vec<RejectedFileEntry>,
    pub warnings: Vec<String>,
    pub file_errors: Vec<FileErrorEntry>,
    pub header_validation: Vec<HeaderOutcomeEntry>,
    pub normalization: Vec<NormalizationEntry>,
    pub reconciliation: Vec<ReconciliationResult>,
    pub outputs: Vec<String>,
}

/// Accumulating run state threaded through every stage.
#[derive(Debug, Default)]
pub struct RunContext {
    pub selected_files: Vec<SelectedFileEntry>,
    pub rejected_files: Vec<RejectedFileEntry>,
    pub warnings: Vec<String>,
    pub file_errors: Vec<FileErrorEntry>,
    pub header_validation: Vec<HeaderOutcomeEntry>,
    pub normalization: Vec<NormalizationEntry>,
    pub reconciliation: Vec<ReconciliationResult>,
    pub outputs: Vec<String>,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_rejections(&mut self, rejections: &[ScanRejection]) {
        for rejection in rejections {
            self.rejected_files.push(RejectedFileEntry {
                entry: rejection.entry.clone(),
                reason: rejection.reason.clone(),
            });
        }
    }

    pub fn record_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    pub fn record_file_error(&mut self, file: impl Into<String>, error: impl std::fmt::Display) {
        self.file_errors.push(FileErrorEntry {
            file: file.into(),
            error: error.to_string(),
        });
    }

    pub fn record_normalization(&mut self, file: impl Into<String>, outcome: NormalizeOutcome) {
        self.normalization.push(NormalizationEntry {
            file: file.into(),
            rows_emitted: outcome.rows_emitted,
            rows_skipped_empty_date: outcome.rows_skipped_empty_date,
            rows_out_of_year: outcome.rows_out_of_year,
        });
    }

    pub fn had_errors(&self) -> bool {
        !self.file_errors.is_empty()
    }

    pub fn into_manifest(self, run_id: String, years: Vec<i32>, policy: RunPolicy) -> Manifest {
        Manifest {
            run_id,
            generated_at: Utc::now(),
            years,
            policy,
            selected_files: self.selected_files,
            rejected_files: self.rejected_files,
            warnings: self.warnings,
            file_errors: self.file_errors,
            header_validation: self.header_validation,
            normalization: self.normalization,
            reconciliation: self.reconciliation,
            outputs: self.outputs,
        }
    }
}

/// Build the deterministic, content-derived run id.
///
/// The seed enumerates every selected file in sorted order together with its
/// content hash, so an unchanged inbox always lands in the same run
/// directory. With nothing selected (partial policy) the id falls back to a
/// digest of the requested years.
pub fn build_run_id(selected: &[SelectedFileEntry], years: &[i32]) -> String {
    if selected.is_empty() {
        let seed = years
            .iter()
            .map(|y| y.to_string())
            .collect::<Vec<_>>()
            .join("|");
        return format!("inbox_none_{}", &hashing::sha256_hex(seed.as_bytes())[..12]);
    }

    let mut ordered: Vec<&SelectedFileEntry> = selected.iter().collect();
    ordered.sort_by(|a, b| {
        (a.year, a.source, a.report_type, &a.inbox_path)
            .cmp(&(b.year, b.source, b.report_type, &b.inbox_path))
    });

    let max_date = ordered.iter().map(|s| s.report_date).max().unwrap();
    let seed_parts: Vec<String> = ordered
        .iter()
        .map(|s| {
            format!(
                "{}|{}|{}|{}|{}|{}",
                s.source,
                s.report_type,
                s.year,
                s.report_date.format("%Y-%m-%d"),
                s.inbox_path,
                s.sha256
            )
        })
        .collect();
    let digest = hashing::sha256_hex(seed_parts.join("\n").as_bytes());
    format!("inbox_{}_{}", max_date.format("%Y-%m-%d"), &digest[..12])
}

/// Serialize the manifest to `<run_root>/manifest.json`. Last step of a run.
pub fn write_manifest(manifest: &Manifest, run_root: &Path) -> Result<PathBuf> {
    fs::create_dir_all(run_root)?;
    let path = run_root.join("manifest.json");
    let mut body = serde_json::to_string_pretty(manifest)?;
    body.push('\n');
    fs::write(&path, body)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, sha256: &str, date: &str) -> SelectedFileEntry {
        SelectedFileEntry {
            source: Source::Electra,
            report_type: ReportType::SalesSummary,
            year: 2025,
            report_date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            inbox_path: format!("electra/{name}"),
            copied_path: None,
            size_bytes: 64,
            sha256: sha256.to_string(),
            selection_reason: "sole candidate".to_string(),
        }
    }

    #[test]
    fn test_run_id_is_deterministic_and_order_independent() {
        let a = entry("electra_sales_summary_2025-12-31.csv", "aa11", "2025-12-31");
        let b = entry("electra_sales_summary_2025-06-30.csv", "bb22", "2025-06-30");

        let first = build_run_id(&[a.clone(), b.clone()], &[2025]);
        let second = build_run_id(&[b, a], &[2025]);
        assert_eq!(first, second);
        assert!(first.starts_with("inbox_2025-12-31_"));
    }

    #[test]
    fn test_run_id_changes_with_content_hash() {
        let a = entry("electra_sales_summary_2025-12-31.csv", "aa11", "2025-12-31");
        let mut changed = a.clone();
        changed.sha256 = "cc33".to_string();

        assert_ne!(build_run_id(&[a], &[2025]), build_run_id(&[changed], &[2025]));
    }

    #[test]
    fn test_empty_selection_run_id_depends_on_years() {
        let none_2025 = build_run_id(&[], &[2025]);
        let none_2024 = build_run_id(&[], &[2024]);
        assert!(none_2025.starts_with("inbox_none_"));
        assert_ne!(none_2025, none_2024);
    }

    #[test]
    fn test_manifest_serializes_with_fixed_shape() {
        let mut ctx = RunContext::new();
        ctx.record_warning("missing required inbox report hotelrunner:daily_sales:2025");
        let manifest = ctx.into_manifest("inbox_none_abc".to_string(), vec![2025], RunPolicy::Partial);

        let json = serde_json::to_string_pretty(&manifest).unwrap();
        assert!(json.contains("\"run_id\": \"inbox_none_abc\""));
        assert!(json.contains("\"policy\": \"partial\""));
        assert!(json.contains("\"warnings\""));
        assert!(json.contains("\"reconciliation\""));
    }
}
