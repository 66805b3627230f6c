use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Agency sentinel for aggregate daily figures coming from summary reports.
pub const TOTAL_AGENCY_ID: &str = "TOTAL";
pub const TOTAL_AGENCY_NAME: &str = "Overall Total";

/// Agency sentinel for bookings made without an intermediary.
pub const DIRECT_AGENCY_ID: &str = "DIRECT";
pub const DIRECT_AGENCY_NAME: &str = "Direct Channel";

/// Column order of a normalized yearly table.
pub const NORMALIZED_COLUMNS: [&str; 7] = [
    "date",
    "year",
    "agency_id",
    "agency_name",
    "gross_sales",
    "net_sales",
    "currency",
];

/// An export-producing system feeding the inbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Electra,
    #[serde(rename = "hotelrunner")]
    HotelRunner,
}

impl Source {
    /// Filename prefix and inbox subdirectory name for this source.
    pub fn prefix(&self) -> &'static str {
        match self {
            Source::Electra => "electra",
            Source::HotelRunner => "hotelrunner",
        }
    }

    /// The report types this source is known to export.
    pub fn report_types(&self) -> &'static [ReportType] {
        match self {
            Source::Electra => &[ReportType::SalesSummary, ReportType::SalesByAgency],
            Source::HotelRunner => &[ReportType::DailySales],
        }
    }

    pub fn all() -> &'static [Source] {
        &[Source::Electra, Source::HotelRunner]
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

impl std::error::Error for Source {}

/// A report flavor within a source's export set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportType {
    SalesSummary,
    SalesByAgency,
    DailySales,
}

impl ReportType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportType::SalesSummary => "sales_summary",
            ReportType::SalesByAgency => "sales_by_agency",
            ReportType::DailySales => "daily_sales",
        }
    }
}

impl fmt::Display for ReportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One normalized record in a yearly table.
///
/// `gross_sales` is always finite and non-negative; rows violating that are
/// rejected during normalization, never clamped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRow {
    pub date: NaiveDate,
    pub year: i32,
    pub agency_id: String,
    pub agency_name: String,
    pub gross_sales: f64,
    pub net_sales: f64,
    pub currency: String,
}

impl CanonicalRow {
    /// Whether this row carries an aggregate daily figure rather than a
    /// per-agency breakdown.
    pub fn is_total(&self) -> bool {
        self.agency_id == TOTAL_AGENCY_ID
    }
}

/// All normalized rows of one (source, year), ordered deterministically.
#[derive(Debug, Clone)]
pub struct NormalizedYearTable {
    pub source: Source,
    pub year: i32,
    pub rows: Vec<CanonicalRow>,
}

impl NormalizedYearTable {
    pub fn new(source: Source, year: i32) -> Self {
        Self {
            source,
            year,
            rows: Vec::new(),
        }
    }

    /// Output file name, e.g. `electra_sales_2025.csv`.
    pub fn file_name(&self) -> String {
        format!("{}_sales_{}.csv", self.source, self.year)
    }

    /// Sort into the canonical total order and drop exact duplicates.
    ///
    /// The order is (date, agency_id) first, then the remaining fields, so
    /// output bytes do not depend on input ordering.
    pub fn finalize(&mut self) {
        self.rows.sort_by(|a, b| {
            a.date
                .cmp(&b.date)
                .then_with(|| a.agency_id.cmp(&b.agency_id))
                .then_with(|| a.agency_name.cmp(&b.agency_name))
                .then_with(|| a.gross_sales.total_cmp(&b.gross_sales))
                .then_with(|| a.net_sales.total_cmp(&b.net_sales))
                .then_with(|| a.currency.cmp(&b.currency))
        });
        self.rows.dedup();
    }
}
