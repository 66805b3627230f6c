//! Reconciliation: aggregate (TOTAL) vs itemized gross sums per yearly table.

use serde::Serialize;

use crate::domain::{NormalizedYearTable, Source};

/// Outcome of reconciling one (source, year) table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileStatus {
    Pass,
    Mismatch,
    SkippedOneSided,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationResult {
    pub source: Source,
    pub year: i32,
    pub status: ReconcileStatus,
    /// Sums rounded to cents for reporting; the tolerance check runs on the
    /// raw sums.
    pub total_gross: f64,
    pub itemized_gross: f64,
    pub delta: f64,
    pub detail: String,
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Partition a table into TOTAL and itemized rows and compare gross sums
/// within `tolerance` (absolute). One-sided tables skip the check.
pub fn check_table(table: &NormalizedYearTable, tolerance: f64) -> ReconciliationResult {
    let mut total_gross = 0.0;
    let mut itemized_gross = 0.0;
    let mut total_rows = 0usize;
    let mut itemized_rows = 0usize;

    for row in &table.rows {
        if row.is_total() {
            total_gross += row.gross_sales;
            total_rows += 1;
        } else {
            itemized_gross += row.gross_sales;
            itemized_rows += 1;
        }
    }

    if total_rows == 0 || itemized_rows == 0 {
        let present = if total_rows > 0 {
            "aggregate rows only"
        } else {
            "itemized rows only"
        };
        return ReconciliationResult {
            source: table.source,
            year: table.year,
            status: ReconcileStatus::SkippedOneSided,
            total_gross: round_cents(total_gross),
            itemized_gross: round_cents(itemized_gross),
            delta: 0.0,
            detail: format!("skipped: one-sided ({present})"),
        };
    }

    let delta = total_gross - itemized_gross;
    if delta.abs() <= tolerance {
        ReconciliationResult {
            source: table.source,
            year: table.year,
            status: ReconcileStatus::Pass,
            total_gross: round_cents(total_gross),
            itemized_gross: round_cents(itemized_gross),
            delta: round_cents(delta),
            detail: format!(
                "pass: {total_rows} aggregate vs {itemized_rows} itemized rows agree"
            ),
        }
    } else {
        ReconciliationResult {
            source: table.source,
            year: table.year,
            status: ReconcileStatus::Mismatch,
            total_gross: round_cents(total_gross),
            itemized_gross: round_cents(itemized_gross),
            delta: round_cents(delta),
            detail: format!(
                "mismatch: aggregate {:.2} vs itemized {:.2}",
                round_cents(total_gross),
                round_cents(itemized_gross)
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CanonicalRow, TOTAL_AGENCY_ID, TOTAL_AGENCY_NAME};
    use chrono::NaiveDate;

    fn table(total_values: &[f64], itemized_values: &[f64]) -> NormalizedYearTable {
        let date = NaiveDate::from_ymd_opt(2025, 1, 2).unwrap();
        let mut table = NormalizedYearTable::new(Source::Electra, 2025);
        for v in total_values {
            table.rows.push(CanonicalRow {
                date,
                year: 2025,
                agency_id: TOTAL_AGENCY_ID.to_string(),
                agency_name: TOTAL_AGENCY_NAME.to_string(),
                gross_sales: *v,
                net_sales: 0.0,
                currency: "USD".to_string(),
            });
        }
        for (i, v) in itemized_values.iter().enumerate() {
            table.rows.push(CanonicalRow {
                date,
                year: 2025,
                agency_id: format!("AG{:03}", i + 1),
                agency_name: format!("Agency {}", i + 1),
                gross_sales: *v,
                net_sales: 0.0,
                currency: "USD".to_string(),
            });
        }
        table
    }

    #[test]
    fn test_sums_within_tolerance_pass() {
        let result = check_table(&table(&[1000.0], &[499.998, 500.006]), 0.01);
        assert_eq!(result.status, ReconcileStatus::Pass);
        assert_eq!(result.total_gross, 1000.0);
    }

    #[test]
    fn test_sums_beyond_tolerance_mismatch_with_delta() {
        let result = check_table(&table(&[1005.0], &[400.0, 600.0]), 0.01);
        assert_eq!(result.status, ReconcileStatus::Mismatch);
        assert_eq!(result.delta, 5.0);
        assert_eq!(result.total_gross, 1005.0);
        assert_eq!(result.itemized_gross, 1000.0);
    }

    #[test]
    fn test_one_sided_table_is_skipped_not_ignored() {
        let result = check_table(&table(&[], &[400.0, 600.0]), 0.01);
        assert_eq!(result.status, ReconcileStatus::SkippedOneSided);
        assert!(result.detail.contains("skipped: one-sided"));
        assert!(result.detail.contains("itemized rows only"));

        let result = check_table(&table(&[1000.0], &[]), 0.01);
        assert_eq!(result.status, ReconcileStatus::SkippedOneSided);
        assert!(result.detail.contains("aggregate rows only"));
    }

    #[test]
    fn test_multiple_total_rows_sum_before_compare() {
        // Daily TOTAL rows across the year sum against all itemized rows.
        let result = check_table(&table(&[600.0, 400.0], &[500.0, 500.0]), 0.01);
        assert_eq!(result.status, ReconcileStatus::Pass);
    }
}
