//! Inbox directory scan: build filename-validated candidates, record
//! everything else as a rejection instead of aborting the run.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{Datelike, NaiveDate};
use tracing::debug;

use crate::domain::{ReportType, Source};
use crate::error::Result;
use crate::pipeline::ingestion::filename;
use crate::safety;

/// One candidate export on disk, immutable once constructed.
#[derive(Debug, Clone)]
pub struct InboxFile {
    pub path: PathBuf,
    pub source: Source,
    pub report_type: ReportType,
    pub parsed_date: NaiveDate,
    pub file_size_bytes: u64,
    pub modified_time: SystemTime,
}

impl InboxFile {
    pub fn year(&self) -> i32 {
        self.parsed_date.year()
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// A file (or directory entry) the scan refused to consider.
#[derive(Debug, Clone)]
pub struct ScanRejection {
    pub entry: String,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub candidates: Vec<InboxFile>,
    pub rejections: Vec<ScanRejection>,
}

fn scan_source(
    source: Source,
    inbox_root: &Path,
    outcome: &mut ScanOutcome,
) -> Result<()> {
    let source_root = inbox_root.join(source.prefix());
    if !source_root.is_dir() {
        debug!(source = %source, "no inbox directory for source");
        return Ok(());
    }

    let mut entries: Vec<PathBuf> = fs::read_dir(&source_root)?
        .collect::<std::io::Result<Vec<_>>>()?
        .into_iter()
        .map(|e| e.path())
        .collect();
    entries.sort();

    for path in entries {
        let entry_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        if path.is_dir() {
            outcome.rejections.push(ScanRejection {
                entry: entry_name,
                reason: format!("unexpected directory inside inbox source '{source}'"),
            });
            continue;
        }

        // Containment first; a symlinked entry pointing outside the inbox
        // never reaches the filename parser.
        let resolved = match safety::contained_path(&path, inbox_root) {
            Ok(p) => p,
            Err(e) => {
                outcome.rejections.push(ScanRejection {
                    entry: entry_name,
                    reason: e.to_string(),
                });
                continue;
            }
        };

        let parsed = match filename::validate(source, &entry_name) {
            Ok(p) => p,
            Err(e) => {
                outcome.rejections.push(ScanRejection {
                    entry: entry_name,
                    reason: e.to_string(),
                });
                continue;
            }
        };

        let metadata = fs::metadata(&resolved)?;
        outcome.candidates.push(InboxFile {
            path: resolved,
            source,
            report_type: parsed.report_type,
            parsed_date: parsed.date,
            file_size_bytes: metadata.len(),
            modified_time: metadata.modified()?,
        });
    }

    Ok(())
}

/// Scan the inbox tree and return candidates plus recorded rejections.
///
/// Candidates come back in (source, report_type, date, name) order so later
/// stages see a stable sequence regardless of directory iteration order.
pub fn scan_inbox(inbox_root: &Path) -> Result<ScanOutcome> {
    let mut outcome = ScanOutcome::default();
    for source in Source::all() {
        scan_source(*source, inbox_root, &mut outcome)?;
    }
    outcome.candidates.sort_by(|a, b| {
        (a.source, a.report_type, a.parsed_date, a.file_name())
            .cmp(&(b.source, b.report_type, b.parsed_date, b.file_name()))
    });
    debug!(
        candidates = outcome.candidates.len(),
        rejections = outcome.rejections.len(),
        "inbox scan complete"
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;

    fn drop_file(root: &Path, source: &str, name: &str) {
        let dir = root.join(source);
        fs::create_dir_all(&dir).unwrap();
        File::create(dir.join(name))
            .unwrap()
            .write_all(b"date,gross_sales\n")
            .unwrap();
    }

    #[test]
    fn test_scan_collects_candidates_per_source() {
        let dir = tempfile::tempdir().unwrap();
        drop_file(dir.path(), "electra", "electra_sales_summary_2025-12-31.csv");
        drop_file(dir.path(), "electra", "electra_sales_by_agency_2025-12-31.csv");
        drop_file(dir.path(), "hotelrunner", "hotelrunner_daily_sales_2025-12-31.csv");

        let outcome = scan_inbox(dir.path()).unwrap();
        assert_eq!(outcome.candidates.len(), 3);
        assert!(outcome.rejections.is_empty());
        assert_eq!(outcome.candidates[0].report_type, ReportType::SalesSummary);
        assert_eq!(outcome.candidates[2].source, Source::HotelRunner);
    }

    #[test]
    fn test_scan_records_bad_filenames_as_rejections() {
        let dir = tempfile::tempdir().unwrap();
        drop_file(dir.path(), "electra", "electra_sales_summary_2025-12-31.csv");
        drop_file(dir.path(), "electra", "electra_sales_summary_2025_12_31.csv");
        drop_file(dir.path(), "electra", "notes.txt");

        let outcome = scan_inbox(dir.path()).unwrap();
        assert_eq!(outcome.candidates.len(), 1);
        assert_eq!(outcome.rejections.len(), 2);
        assert!(outcome
            .rejections
            .iter()
            .any(|r| r.entry == "electra_sales_summary_2025_12_31.csv"));
    }

    #[test]
    fn test_scan_rejects_directories_inside_source() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("electra").join("archive")).unwrap();

        let outcome = scan_inbox(dir.path()).unwrap();
        assert!(outcome.candidates.is_empty());
        assert_eq!(outcome.rejections.len(), 1);
        assert!(outcome.rejections[0].reason.contains("unexpected directory"));
    }

    #[test]
    fn test_scan_missing_source_dir_is_empty_not_error() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = scan_inbox(dir.path()).unwrap();
        assert!(outcome.candidates.is_empty());
        assert!(outcome.rejections.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_scan_rejects_symlink_escaping_root() {
        let dir = tempfile::tempdir().unwrap();
        let inbox = dir.path().join("inbox");
        fs::create_dir_all(inbox.join("electra")).unwrap();
        let outside = dir.path().join("outside.csv");
        File::create(&outside).unwrap().write_all(b"x\n").unwrap();
        std::os::unix::fs::symlink(
            &outside,
            inbox.join("electra").join("electra_sales_summary_2025-01-01.csv"),
        )
        .unwrap();

        let outcome = scan_inbox(&inbox).unwrap();
        assert!(outcome.candidates.is_empty());
        assert_eq!(outcome.rejections.len(), 1);
        assert!(outcome.rejections[0].reason.contains("escapes"));
    }
}
