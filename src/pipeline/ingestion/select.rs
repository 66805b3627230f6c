//! Report selection: one winner per (source, report_type, year).
//!
//! Freshness rule: latest report date from the filename wins; among equal
//! dates the latest modified time wins; an exact tie on both is an
//! `AmbiguousSelection` error, never a silent pick.

use std::collections::BTreeMap;

use tracing::debug;

use crate::config::RunPolicy;
use crate::domain::{ReportType, Source};
use crate::error::{IngestError, Result};
use crate::pipeline::ingestion::scan::InboxFile;

/// The report set every requested year must resolve.
pub const REQUIRED_REPORTS: [(Source, ReportType); 3] = [
    (Source::Electra, ReportType::SalesSummary),
    (Source::Electra, ReportType::SalesByAgency),
    (Source::HotelRunner, ReportType::DailySales),
];

/// Candidates sharing (source, report_type, year) and the chosen winner.
#[derive(Debug, Clone)]
pub struct SelectionGroup {
    pub source: Source,
    pub report_type: ReportType,
    pub year: i32,
    pub winner: Option<InboxFile>,
    pub candidate_count: usize,
    /// Human-readable reasoning recorded in the manifest.
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct Selection {
    /// One group per (requested year × required report), winners first by
    /// (year, source, report_type).
    pub groups: Vec<SelectionGroup>,
    /// Missing-group warnings recorded under the partial policy.
    pub warnings: Vec<String>,
}

fn pick_winner(
    source: Source,
    report_type: ReportType,
    year: i32,
    mut candidates: Vec<InboxFile>,
) -> Result<SelectionGroup> {
    let candidate_count = candidates.len();
    candidates.sort_by(|a, b| {
        b.parsed_date
            .cmp(&a.parsed_date)
            .then_with(|| b.modified_time.cmp(&a.modified_time))
    });

    if candidate_count > 1 {
        let (first, second) = (&candidates[0], &candidates[1]);
        if first.parsed_date == second.parsed_date && first.modified_time == second.modified_time {
            return Err(IngestError::AmbiguousSelection {
                source,
                report_type,
                year,
                left: first.file_name(),
                right: second.file_name(),
            });
        }
    }

    let winner = candidates.swap_remove(0);
    let reason = if candidate_count == 1 {
        "sole candidate".to_string()
    } else if candidates
        .iter()
        .all(|c| c.parsed_date < winner.parsed_date)
    {
        format!(
            "latest report date {} of {} candidates",
            winner.parsed_date.format("%Y-%m-%d"),
            candidate_count
        )
    } else {
        format!(
            "latest modified time among {} candidates sharing report date {}",
            candidate_count,
            winner.parsed_date.format("%Y-%m-%d")
        )
    };
    debug!(%source, %report_type, year, winner = %winner.file_name(), "selected winner");

    Ok(SelectionGroup {
        source,
        report_type,
        year,
        winner: Some(winner),
        candidate_count,
        reason,
    })
}

/// Group candidates by (source, report_type, year) for the requested years
/// and select each group's winner, then check required-set membership.
pub fn select_for_years(
    candidates: &[InboxFile],
    years: &[i32],
    policy: RunPolicy,
) -> Result<Selection> {
    let mut grouped: BTreeMap<(i32, Source, ReportType), Vec<InboxFile>> = BTreeMap::new();
    for candidate in candidates {
        if !years.contains(&candidate.year()) {
            continue;
        }
        grouped
            .entry((candidate.year(), candidate.source, candidate.report_type))
            .or_default()
            .push(candidate.clone());
    }

    let mut selection = Selection::default();
    for year in years {
        for (source, report_type) in REQUIRED_REPORTS {
            match grouped.remove(&(*year, source, report_type)) {
                Some(group_candidates) => {
                    selection
                        .groups
                        .push(pick_winner(source, report_type, *year, group_candidates)?);
                }
                None => {
                    if policy == RunPolicy::Strict {
                        return Err(IngestError::MissingRequiredReport {
                            source,
                            report_type,
                            year: *year,
                        });
                    }
                    selection.warnings.push(format!(
                        "missing required inbox report {source}:{report_type}:{year}"
                    ));
                    selection.groups.push(SelectionGroup {
                        source,
                        report_type,
                        year: *year,
                        winner: None,
                        candidate_count: 0,
                        reason: "no candidate".to_string(),
                    });
                }
            }
        }
    }

    Ok(selection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::path::PathBuf;
    use std::time::{Duration, SystemTime};

    fn candidate(name: &str, source: Source, report_type: ReportType, date: &str, mtime_offset_secs: u64) -> InboxFile {
        InboxFile {
            path: PathBuf::from("/inbox").join(source.prefix()).join(name),
            source,
            report_type,
            parsed_date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            file_size_bytes: 64,
            modified_time: SystemTime::UNIX_EPOCH + Duration::from_secs(mtime_offset_secs),
        }
    }

    fn full_set(year: i32) -> Vec<InboxFile> {
        let date = format!("{year}-12-31");
        vec![
            candidate(
                &format!("electra_sales_summary_{date}.csv"),
                Source::Electra,
                ReportType::SalesSummary,
                &date,
                100,
            ),
            candidate(
                &format!("electra_sales_by_agency_{date}.csv"),
                Source::Electra,
                ReportType::SalesByAgency,
                &date,
                100,
            ),
            candidate(
                &format!("hotelrunner_daily_sales_{date}.csv"),
                Source::HotelRunner,
                ReportType::DailySales,
                &date,
                100,
            ),
        ]
    }

    #[test]
    fn test_latest_parsed_date_wins_over_mtime() {
        let mut candidates = full_set(2025);
        // Older report date but fresher mtime must lose.
        candidates.push(candidate(
            "electra_sales_summary_2025-11-30.csv",
            Source::Electra,
            ReportType::SalesSummary,
            "2025-11-30",
            9_999,
        ));

        let selection = select_for_years(&candidates, &[2025], RunPolicy::Strict).unwrap();
        let group = selection
            .groups
            .iter()
            .find(|g| g.report_type == ReportType::SalesSummary)
            .unwrap();
        assert_eq!(
            group.winner.as_ref().unwrap().file_name(),
            "electra_sales_summary_2025-12-31.csv"
        );
        assert!(group.reason.contains("latest report date 2025-12-31"));
    }

    #[test]
    fn test_mtime_breaks_equal_dates() {
        let mut candidates = full_set(2025);
        candidates.push(candidate(
            "electra_sales_summary_2025-12-31.csv",
            Source::Electra,
            ReportType::SalesSummary,
            "2025-12-31",
            200,
        ));

        let selection = select_for_years(&candidates, &[2025], RunPolicy::Strict).unwrap();
        let group = selection
            .groups
            .iter()
            .find(|g| g.report_type == ReportType::SalesSummary)
            .unwrap();
        let winner = group.winner.as_ref().unwrap();
        assert_eq!(
            winner.modified_time,
            SystemTime::UNIX_EPOCH + Duration::from_secs(200)
        );
        assert!(group.reason.contains("latest modified time"));
    }

    #[test]
    fn test_selection_is_order_independent() {
        let mut candidates = full_set(2025);
        candidates.push(candidate(
            "electra_sales_summary_2025-10-01.csv",
            Source::Electra,
            ReportType::SalesSummary,
            "2025-10-01",
            50,
        ));
        candidates.push(candidate(
            "electra_sales_summary_2025-12-31.csv",
            Source::Electra,
            ReportType::SalesSummary,
            "2025-12-31",
            300,
        ));

        let reference: Vec<String> = {
            let selection = select_for_years(&candidates, &[2025], RunPolicy::Strict).unwrap();
            selection
                .groups
                .iter()
                .filter_map(|g| g.winner.as_ref().map(|w| w.file_name()))
                .collect()
        };

        // Rotate through every starting position to vary input order.
        for shift in 1..candidates.len() {
            let mut rotated = candidates.clone();
            rotated.rotate_left(shift);
            let selection = select_for_years(&rotated, &[2025], RunPolicy::Strict).unwrap();
            let winners: Vec<String> = selection
                .groups
                .iter()
                .filter_map(|g| g.winner.as_ref().map(|w| w.file_name()))
                .collect();
            assert_eq!(winners, reference);
        }
    }

    #[test]
    fn test_exact_tie_is_ambiguous() {
        let mut candidates = full_set(2025);
        // Same report date, same mtime as the existing summary candidate.
        candidates.push(candidate(
            "electra_sales_summary_2025-12-31.csv",
            Source::Electra,
            ReportType::SalesSummary,
            "2025-12-31",
            100,
        ));

        match select_for_years(&candidates, &[2025], RunPolicy::Strict) {
            Err(IngestError::AmbiguousSelection {
                source,
                report_type,
                year,
                ..
            }) => {
                assert_eq!(source, Source::Electra);
                assert_eq!(report_type, ReportType::SalesSummary);
                assert_eq!(year, 2025);
            }
            other => panic!("expected AmbiguousSelection, got {other:?}"),
        }
    }

    #[test]
    fn test_strict_policy_missing_report_fails() {
        let candidates: Vec<InboxFile> = full_set(2025)
            .into_iter()
            .filter(|c| c.report_type != ReportType::DailySales)
            .collect();

        match select_for_years(&candidates, &[2025], RunPolicy::Strict) {
            Err(IngestError::MissingRequiredReport {
                source,
                report_type,
                year,
            }) => {
                assert_eq!(source, Source::HotelRunner);
                assert_eq!(report_type, ReportType::DailySales);
                assert_eq!(year, 2025);
            }
            other => panic!("expected MissingRequiredReport, got {other:?}"),
        }
    }

    #[test]
    fn test_partial_policy_records_warning_and_proceeds() {
        let candidates: Vec<InboxFile> = full_set(2025)
            .into_iter()
            .filter(|c| c.report_type != ReportType::DailySales)
            .collect();

        let selection = select_for_years(&candidates, &[2025], RunPolicy::Partial).unwrap();
        assert_eq!(selection.groups.len(), 3);
        assert_eq!(selection.warnings.len(), 1);
        assert!(selection.warnings[0].contains("hotelrunner:daily_sales:2025"));
        let missing = selection
            .groups
            .iter()
            .find(|g| g.report_type == ReportType::DailySales)
            .unwrap();
        assert!(missing.winner.is_none());
    }

    #[test]
    fn test_candidates_outside_requested_years_are_ignored() {
        let mut candidates = full_set(2025);
        candidates.extend(full_set(2024));

        let selection = select_for_years(&candidates, &[2025], RunPolicy::Strict).unwrap();
        assert_eq!(selection.groups.len(), 3);
        assert!(selection.groups.iter().all(|g| g.year == 2025));
    }
}
