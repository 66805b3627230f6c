//! Normalization: re-emit source rows under canonical field names, then
//! merge per-(source, year) tables and write them deterministically.
//!
//! Summary rows become TOTAL rows; by-agency and daily-sales rows become
//! per-agency rows. HotelRunner rows without explicit agency columns resolve
//! their agency identity through a fixed channel mapping.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDate};
use csv::StringRecord;
use tracing::debug;

use crate::domain::{
    CanonicalRow, NormalizedYearTable, ReportType, Source, DIRECT_AGENCY_ID, DIRECT_AGENCY_NAME,
    NORMALIZED_COLUMNS, TOTAL_AGENCY_ID, TOTAL_AGENCY_NAME,
};
use crate::error::{IngestError, Result};
use crate::pipeline::processing::schema::{
    CanonicalSchema, ColumnMap, FIELD_AGENCY_ID, FIELD_AGENCY_NAME, FIELD_CHANNEL, FIELD_CURRENCY,
    FIELD_DATE, FIELD_GROSS_SALES, FIELD_NET_SALES,
};

/// Known sales channels and the agency identity they map to.
const CHANNEL_TO_AGENCY: &[(&str, &str, &str)] = &[
    ("direct", DIRECT_AGENCY_ID, DIRECT_AGENCY_NAME),
    ("booking.com", "AG001", "Atlas Partners"),
    ("expedia", "AG002", "Beacon Agency"),
    ("agoda", "AG003", "Cedar Travel"),
    ("hotelbeds", "AG004", "Drift Voyages"),
    ("wholesaler", "AG005", "Elm Holidays"),
    ("wholesalerx", "AG005", "Elm Holidays"),
];

/// Per-file counters recorded in the manifest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormalizeOutcome {
    pub rows_emitted: usize,
    pub rows_skipped_empty_date: usize,
    pub rows_out_of_year: usize,
}

fn cell<'r>(record: &'r StringRecord, map: &ColumnMap, field: &str) -> &'r str {
    map.index_of(field)
        .and_then(|idx| record.get(idx))
        .unwrap_or("")
        .trim()
}

fn invalid_row(
    file: &str,
    row: usize,
    field: &'static str,
    reason: impl Into<String>,
) -> IngestError {
    IngestError::InvalidRowValue {
        file: file.to_string(),
        row,
        field,
        reason: reason.into(),
    }
}

fn parse_amount(
    raw: &str,
    file: &str,
    row: usize,
    field: &'static str,
    allow_negative: bool,
) -> Result<f64> {
    let value: f64 = raw
        .parse()
        .map_err(|_| invalid_row(file, row, field, format!("'{raw}' is not numeric")))?;
    if !value.is_finite() {
        return Err(invalid_row(file, row, field, format!("'{raw}' is not finite")));
    }
    if !allow_negative && value < 0.0 {
        return Err(invalid_row(
            file,
            row,
            field,
            format!("negative value '{raw}' is not allowed"),
        ));
    }
    Ok(value)
}

/// Uppercase a raw channel label into an agency-id shaped slug.
fn slug_agency_id(raw: &str) -> String {
    let mut out = String::new();
    for ch in raw.to_uppercase().chars() {
        if ch.is_alphanumeric() {
            out.push(ch);
        } else if matches!(ch, ' ' | '-' | '.' | '/' | '&') {
            out.push('_');
        }
    }
    let mut cleaned = out.trim_matches('_').to_string();
    while cleaned.contains("__") {
        cleaned = cleaned.replace("__", "_");
    }
    if cleaned.is_empty() {
        "UNKNOWN".to_string()
    } else {
        cleaned
    }
}

/// Resolve agency identity for a HotelRunner row: explicit agency columns
/// win; otherwise the channel value maps through the fixed table.
fn resolve_agency(explicit_id: &str, explicit_name: &str, channel: &str) -> (String, String) {
    if !explicit_id.is_empty() && !explicit_name.is_empty() {
        return (explicit_id.to_string(), explicit_name.to_string());
    }

    let mapped = CHANNEL_TO_AGENCY
        .iter()
        .find(|(key, _, _)| key.eq_ignore_ascii_case(channel.trim()));
    let (default_id, default_name) = match mapped {
        Some((_, id, name)) => (id.to_string(), name.to_string()),
        None => {
            let name = if channel.is_empty() {
                "Unknown Agency".to_string()
            } else {
                channel.to_string()
            };
            (slug_agency_id(channel), name)
        }
    };

    let agency_id = if explicit_id.is_empty() {
        default_id
    } else {
        explicit_id.to_string()
    };
    let agency_name = if explicit_name.is_empty() {
        default_name
    } else {
        explicit_name.to_string()
    };
    (agency_id, agency_name)
}

/// Stream one winner file through its column map into canonical rows.
///
/// Row indices in errors are 1-based over data rows (the header is row 0).
pub fn normalize_file(
    path: &Path,
    map: &ColumnMap,
    schema: &CanonicalSchema,
    years: &[i32],
) -> Result<(Vec<CanonicalRow>, NormalizeOutcome)> {
    let file = map.file.as_str();
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)?;

    let mut rows = Vec::new();
    let mut outcome = NormalizeOutcome::default();

    for (i, record) in reader.records().enumerate() {
        let record = record?;
        let row_index = i + 1;

        let raw_date = cell(&record, map, FIELD_DATE);
        if raw_date.is_empty() {
            outcome.rows_skipped_empty_date += 1;
            continue;
        }
        let date = NaiveDate::parse_from_str(raw_date, "%Y-%m-%d").map_err(|_| {
            invalid_row(
                file,
                row_index,
                FIELD_DATE,
                format!("'{raw_date}' is not a YYYY-MM-DD date"),
            )
        })?;
        let year = date.year();
        if !years.contains(&year) {
            outcome.rows_out_of_year += 1;
            continue;
        }

        let gross_sales = parse_amount(
            cell(&record, map, FIELD_GROSS_SALES),
            file,
            row_index,
            FIELD_GROSS_SALES,
            false,
        )?;

        let raw_net = cell(&record, map, FIELD_NET_SALES);
        let net_sales = if raw_net.is_empty() {
            let default = schema
                .field(FIELD_NET_SALES)
                .and_then(|f| f.default)
                .unwrap_or("0");
            parse_amount(default, file, row_index, FIELD_NET_SALES, true)?
        } else {
            parse_amount(raw_net, file, row_index, FIELD_NET_SALES, true)?
        };

        let raw_currency = cell(&record, map, FIELD_CURRENCY);
        let currency = if raw_currency.is_empty() {
            schema
                .field(FIELD_CURRENCY)
                .and_then(|f| f.default)
                .unwrap_or("USD")
                .to_string()
        } else {
            raw_currency.to_string()
        };

        let (agency_id, agency_name) = match schema.report_type {
            ReportType::SalesSummary => {
                (TOTAL_AGENCY_ID.to_string(), TOTAL_AGENCY_NAME.to_string())
            }
            ReportType::SalesByAgency => (
                cell(&record, map, FIELD_AGENCY_ID).to_string(),
                cell(&record, map, FIELD_AGENCY_NAME).to_string(),
            ),
            ReportType::DailySales => resolve_agency(
                cell(&record, map, FIELD_AGENCY_ID),
                cell(&record, map, FIELD_AGENCY_NAME),
                cell(&record, map, FIELD_CHANNEL),
            ),
        };

        rows.push(CanonicalRow {
            date,
            year,
            agency_id,
            agency_name,
            gross_sales,
            net_sales,
            currency,
        });
        outcome.rows_emitted += 1;
    }

    debug!(
        file,
        emitted = outcome.rows_emitted,
        skipped_empty_date = outcome.rows_skipped_empty_date,
        out_of_year = outcome.rows_out_of_year,
        "normalized file"
    );
    Ok((rows, outcome))
}

/// Accumulates canonical rows into one table per (source, year).
///
/// Rows from different report types of the same source append into the same
/// table; nothing is overwritten.
#[derive(Debug, Default)]
pub struct YearTableSet {
    tables: BTreeMap<(Source, i32), NormalizedYearTable>,
}

impl YearTableSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, source: Source, rows: Vec<CanonicalRow>) {
        for row in rows {
            self.tables
                .entry((source, row.year))
                .or_insert_with(|| NormalizedYearTable::new(source, row.year))
                .rows
                .push(row);
        }
    }

    /// Finish all tables: deterministic order, exact duplicates dropped.
    pub fn finalize(self) -> Vec<NormalizedYearTable> {
        let mut tables: Vec<NormalizedYearTable> = self.tables.into_values().collect();
        for table in &mut tables {
            table.finalize();
        }
        tables
    }
}

/// Write each table as CSV under `output_dir`, returning the paths written.
///
/// Amounts are rendered with two decimals so repeated runs are
/// byte-identical.
pub fn write_tables(tables: &[NormalizedYearTable], output_dir: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(output_dir)?;
    let mut paths = Vec::with_capacity(tables.len());

    for table in tables {
        let path = output_dir.join(table.file_name());
        let mut writer = csv::Writer::from_path(&path)?;
        writer.write_record(NORMALIZED_COLUMNS)?;
        for row in &table.rows {
            writer.write_record([
                row.date.format("%Y-%m-%d").to_string(),
                row.year.to_string(),
                row.agency_id.clone(),
                row.agency_name.clone(),
                format!("{:.2}", row.gross_sales),
                format!("{:.2}", row.net_sales),
                row.currency.clone(),
            ])?;
        }
        writer.flush()?;
        paths.push(path);
    }

    Ok(paths)
}
