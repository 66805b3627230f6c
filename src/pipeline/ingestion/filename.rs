//! Strict inbox filename conventions, one pattern per source:
//!
//! - `electra_(sales_summary|sales_by_agency)_<YYYY-MM-DD>.csv`
//! - `hotelrunner_daily_sales_<YYYY-MM-DD>.csv`
//!
//! Parsing is a pure string-to-value operation; any deviation is rejected
//! with the specific rule that was violated.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::{ReportType, Source};
use crate::error::{IngestError, Result};

// Loose on the extension so a wrong extension gets its own rule message
// instead of a generic pattern failure.
static ELECTRA_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^electra_(sales_summary|sales_by_agency)_(\d{4}-\d{2}-\d{2})\.([A-Za-z0-9]+)$")
        .unwrap()
});
static HOTELRUNNER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^hotelrunner_(daily_sales)_(\d{4}-\d{2}-\d{2})\.([A-Za-z0-9]+)$").unwrap()
});

/// The (source, report_type, date) triple extracted from a valid filename.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedFilename {
    pub source: Source,
    pub report_type: ReportType,
    pub date: NaiveDate,
}

impl ParsedFilename {
    /// Re-render the canonical filename this parse came from.
    pub fn render(&self) -> String {
        format!(
            "{}_{}_{}.csv",
            self.source,
            self.report_type,
            self.date.format("%Y-%m-%d")
        )
    }
}

fn invalid(filename: &str, rule: impl Into<String>) -> IngestError {
    IngestError::InvalidFilename {
        filename: filename.to_string(),
        rule: rule.into(),
    }
}

fn pattern_rule(source: Source) -> String {
    match source {
        Source::Electra => {
            "expected electra_<sales_summary|sales_by_agency>_<YYYY-MM-DD>.csv".to_string()
        }
        Source::HotelRunner => "expected hotelrunner_daily_sales_<YYYY-MM-DD>.csv".to_string(),
    }
}

fn report_type_from_match(source: Source, raw: &str) -> ReportType {
    match (source, raw) {
        (Source::Electra, "sales_summary") => ReportType::SalesSummary,
        (Source::Electra, "sales_by_agency") => ReportType::SalesByAgency,
        (Source::HotelRunner, _) => ReportType::DailySales,
        // The regex alternation only admits the arms above.
        _ => unreachable!("report type '{raw}' not admitted by {source} pattern"),
    }
}

/// Validate a bare filename against the convention of `source`.
///
/// No directory component is trusted; callers pass `file_name()` only.
pub fn validate(source: Source, filename: &str) -> Result<ParsedFilename> {
    let re = match source {
        Source::Electra => &ELECTRA_RE,
        Source::HotelRunner => &HOTELRUNNER_RE,
    };
    let captures = re
        .captures(filename)
        .ok_or_else(|| invalid(filename, pattern_rule(source)))?;

    let extension = captures.get(3).map(|m| m.as_str()).unwrap_or_default();
    if extension != "csv" {
        return Err(invalid(
            filename,
            format!("unsupported extension '.{extension}': only .csv inbox files are accepted"),
        ));
    }

    let raw_date = captures.get(2).map(|m| m.as_str()).unwrap_or_default();
    let date = NaiveDate::parse_from_str(raw_date, "%Y-%m-%d").map_err(|_| {
        invalid(
            filename,
            format!("invalid calendar date '{raw_date}': expected a real YYYY-MM-DD date"),
        )
    })?;

    let report_type = report_type_from_match(source, captures.get(1).map(|m| m.as_str()).unwrap());
    Ok(ParsedFilename {
        source,
        report_type,
        date,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_filenames_round_trip() {
        let cases = [
            (Source::Electra, "electra_sales_summary_2025-12-31.csv"),
            (Source::Electra, "electra_sales_by_agency_2024-01-05.csv"),
            (Source::HotelRunner, "hotelrunner_daily_sales_2025-06-15.csv"),
        ];
        for (source, name) in cases {
            let parsed = validate(source, name).unwrap();
            assert_eq!(parsed.render(), name);
        }
    }

    #[test]
    fn test_extracts_report_type_and_date() {
        let parsed = validate(Source::Electra, "electra_sales_by_agency_2025-03-09.csv").unwrap();
        assert_eq!(parsed.report_type, ReportType::SalesByAgency);
        assert_eq!(
            parsed.date,
            NaiveDate::from_ymd_opt(2025, 3, 9).unwrap()
        );
    }

    #[test]
    fn test_rejects_wrong_separator_in_date() {
        let err = validate(Source::Electra, "electra_sales_summary_2025_12_31.csv").unwrap_err();
        match err {
            IngestError::InvalidFilename { rule, .. } => {
                assert!(rule.contains("YYYY-MM-DD"), "rule was: {rule}");
            }
            other => panic!("expected InvalidFilename, got {other:?}"),
        }
    }

    #[test]
    fn test_rejects_impossible_calendar_date() {
        let err = validate(Source::Electra, "electra_sales_summary_2025-13-01.csv").unwrap_err();
        match err {
            IngestError::InvalidFilename { rule, .. } => {
                assert!(rule.contains("invalid calendar date '2025-13-01'"));
            }
            other => panic!("expected InvalidFilename, got {other:?}"),
        }
    }

    #[test]
    fn test_rejects_non_csv_extension() {
        let err = validate(Source::Electra, "electra_sales_summary_2025-12-31.xlsx").unwrap_err();
        match err {
            IngestError::InvalidFilename { rule, .. } => {
                assert!(rule.contains("only .csv"), "rule was: {rule}");
            }
            other => panic!("expected InvalidFilename, got {other:?}"),
        }
    }

    #[test]
    fn test_rejects_foreign_prefix_for_source() {
        // A hotelrunner export dropped into the electra directory fails the
        // electra pattern outright.
        assert!(validate(Source::Electra, "hotelrunner_daily_sales_2025-06-15.csv").is_err());
        assert!(validate(Source::HotelRunner, "electra_sales_summary_2025-06-15.csv").is_err());
    }

    #[test]
    fn test_rejects_unknown_report_type() {
        assert!(validate(Source::Electra, "electra_sales_daily_2025-12-31.csv").is_err());
        assert!(validate(Source::HotelRunner, "hotelrunner_sales_summary_2025-12-31.csv").is_err());
    }
}
