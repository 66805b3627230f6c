//! Canonical header schemas and alias resolution.
//!
//! Every (source, report_type) pair has a fixed, enumerated schema: canonical
//! field names, required flags, defaults for optional fields, and an ordered
//! alias list per field. Header columns are matched against aliases by
//! trimmed, case-insensitive exact comparison — no fuzzy scoring — so a
//! `HeaderMismatch` can quote the accepted aliases verbatim and operators can
//! fix their export from the message alone.

use std::collections::HashMap;

use csv::StringRecord;

use crate::domain::{ReportType, Source};
use crate::error::{IngestError, Result};

pub const FIELD_DATE: &str = "date";
pub const FIELD_AGENCY_ID: &str = "agency_id";
pub const FIELD_AGENCY_NAME: &str = "agency_name";
pub const FIELD_GROSS_SALES: &str = "gross_sales";
pub const FIELD_NET_SALES: &str = "net_sales";
pub const FIELD_CURRENCY: &str = "currency";
pub const FIELD_BOOKING_ID: &str = "booking_id";
pub const FIELD_CHANNEL: &str = "channel";

const DATE_ALIASES: &[&str] = &["date", "report_date", "transaction_date", "date_value"];
const GROSS_ALIASES: &[&str] = &[
    "gross_sales",
    "gross",
    "gross_revenue",
    "grossrevenue",
    "gross_amount",
    "grossamount",
];
const NET_ALIASES: &[&str] = &[
    "net_sales",
    "net",
    "net_revenue",
    "netrevenue",
    "net_amount",
    "netamount",
];
const CURRENCY_ALIASES: &[&str] = &["currency", "currency_code", "currencycode", "curr", "ccy"];
const ELECTRA_AGENCY_ID_ALIASES: &[&str] = &[
    "agency_id",
    "agencyid",
    "agent_id",
    "agentid",
    "partner_id",
    "partnerid",
];
const ELECTRA_AGENCY_NAME_ALIASES: &[&str] = &[
    "agency_name",
    "agency",
    "agencyname",
    "agent_name",
    "agentname",
    "partner_name",
];
const BOOKING_ID_ALIASES: &[&str] = &[
    "booking_id",
    "bookingid",
    "reservation_id",
    "reservationid",
    "invoice_id",
    "invoiceid",
];
const CHANNEL_ALIASES: &[&str] = &["channel", "agency", "source", "sales_channel", "saleschannel"];
// HotelRunner exports use "agency" for the channel column, so the agency
// dimension aliases must not claim it.
const HR_AGENCY_ID_ALIASES: &[&str] = &[
    "agency_id",
    "agencyid",
    "agent_id",
    "agentid",
    "agency_code",
    "agencycode",
];
const HR_AGENCY_NAME_ALIASES: &[&str] = &[
    "agency_name",
    "agencyname",
    "agent_name",
    "agentname",
    "agency_label",
    "agencylabel",
];

/// One canonical field: required or optional-with-default, plus the ordered
/// alias list accepted for it.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub canonical: &'static str,
    pub required: bool,
    pub default: Option<&'static str>,
    pub aliases: &'static [&'static str],
}

/// A structural constraint satisfied when any one option has all of its
/// fields resolved (e.g. channel, or both agency id and agency name).
#[derive(Debug, Clone, Copy)]
pub struct DimensionConstraint {
    pub label: &'static str,
    pub options: &'static [&'static [&'static str]],
}

/// The fixed target schema for one (source, report_type) pair.
#[derive(Debug, Clone, Copy)]
pub struct CanonicalSchema {
    pub name: &'static str,
    pub version: &'static str,
    pub source: Source,
    pub report_type: ReportType,
    pub fields: &'static [FieldSpec],
    pub constraints: &'static [DimensionConstraint],
}

const ELECTRA_SALES_SUMMARY: CanonicalSchema = CanonicalSchema {
    name: "electra_sales_summary",
    version: "v1",
    source: Source::Electra,
    report_type: ReportType::SalesSummary,
    fields: &[
        FieldSpec {
            canonical: FIELD_DATE,
            required: true,
            default: None,
            aliases: DATE_ALIASES,
        },
        FieldSpec {
            canonical: FIELD_GROSS_SALES,
            required: true,
            default: None,
            aliases: GROSS_ALIASES,
        },
        FieldSpec {
            canonical: FIELD_NET_SALES,
            required: false,
            default: Some("0"),
            aliases: NET_ALIASES,
        },
        FieldSpec {
            canonical: FIELD_CURRENCY,
            required: false,
            default: Some("USD"),
            aliases: CURRENCY_ALIASES,
        },
    ],
    constraints: &[],
};

const ELECTRA_SALES_BY_AGENCY: CanonicalSchema = CanonicalSchema {
    name: "electra_sales_by_agency",
    version: "v1",
    source: Source::Electra,
    report_type: ReportType::SalesByAgency,
    fields: &[
        FieldSpec {
            canonical: FIELD_DATE,
            required: true,
            default: None,
            aliases: DATE_ALIASES,
        },
        FieldSpec {
            canonical: FIELD_AGENCY_ID,
            required: true,
            default: None,
            aliases: ELECTRA_AGENCY_ID_ALIASES,
        },
        FieldSpec {
            canonical: FIELD_AGENCY_NAME,
            required: true,
            default: None,
            aliases: ELECTRA_AGENCY_NAME_ALIASES,
        },
        FieldSpec {
            canonical: FIELD_GROSS_SALES,
            required: true,
            default: None,
            aliases: GROSS_ALIASES,
        },
        FieldSpec {
            canonical: FIELD_NET_SALES,
            required: false,
            default: Some("0"),
            aliases: NET_ALIASES,
        },
        FieldSpec {
            canonical: FIELD_CURRENCY,
            required: false,
            default: Some("USD"),
            aliases: CURRENCY_ALIASES,
        },
    ],
    constraints: &[],
};

const HOTELRUNNER_DAILY_SALES: CanonicalSchema = CanonicalSchema {
    name: "hotelrunner_daily_sales",
    version: "v1",
    source: Source::HotelRunner,
    report_type: ReportType::DailySales,
    fields: &[
        FieldSpec {
            canonical: FIELD_DATE,
            required: true,
            default: None,
            aliases: DATE_ALIASES,
        },
        FieldSpec {
            canonical: FIELD_BOOKING_ID,
            required: true,
            default: None,
            aliases: BOOKING_ID_ALIASES,
        },
        FieldSpec {
            canonical: FIELD_CHANNEL,
            required: false,
            default: None,
            aliases: CHANNEL_ALIASES,
        },
        FieldSpec {
            canonical: FIELD_AGENCY_ID,
            required: false,
            default: None,
            aliases: HR_AGENCY_ID_ALIASES,
        },
        FieldSpec {
            canonical: FIELD_AGENCY_NAME,
            required: false,
            default: None,
            aliases: HR_AGENCY_NAME_ALIASES,
        },
        FieldSpec {
            canonical: FIELD_GROSS_SALES,
            required: true,
            default: None,
            aliases: GROSS_ALIASES,
        },
        FieldSpec {
            canonical: FIELD_NET_SALES,
            required: false,
            default: Some("0"),
            aliases: NET_ALIASES,
        },
        FieldSpec {
            canonical: FIELD_CURRENCY,
            required: false,
            default: Some("USD"),
            aliases: CURRENCY_ALIASES,
        },
    ],
    constraints: &[DimensionConstraint {
        label: "channel (or both agency_id + agency_name)",
        options: &[&[FIELD_CHANNEL], &[FIELD_AGENCY_ID, FIELD_AGENCY_NAME]],
    }],
};

/// Look up the static schema for a (source, report_type) pair.
pub fn schema_for(source: Source, report_type: ReportType) -> &'static CanonicalSchema {
    match (source, report_type) {
        (Source::Electra, ReportType::SalesSummary) => &ELECTRA_SALES_SUMMARY,
        (Source::Electra, ReportType::SalesByAgency) => &ELECTRA_SALES_BY_AGENCY,
        (Source::HotelRunner, ReportType::DailySales) => &HOTELRUNNER_DAILY_SALES,
        // Scan/selection only produce per-source report types, so the
        // remaining combinations cannot reach this point.
        (source, report_type) => {
            unreachable!("no schema for {source}:{report_type}")
        }
    }
}

impl CanonicalSchema {
    pub fn field(&self, canonical: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.canonical == canonical)
    }
}

/// Resolution of canonical fields to column positions in one file's header.
#[derive(Debug, Clone)]
pub struct ColumnMap {
    pub file: String,
    /// canonical field -> (column index, header cell as written).
    resolved: HashMap<&'static str, (usize, String)>,
    /// Optional fields that did not resolve and will use their default.
    pub defaulted: Vec<&'static str>,
}

impl ColumnMap {
    pub fn index_of(&self, canonical: &str) -> Option<usize> {
        self.resolved.get(canonical).map(|(idx, _)| *idx)
    }

    pub fn is_resolved(&self, canonical: &str) -> bool {
        self.resolved.contains_key(canonical)
    }

    /// (canonical field, header column) pairs, sorted for the manifest.
    pub fn resolved_pairs(&self) -> Vec<(String, String)> {
        let mut pairs: Vec<(String, String)> = self
            .resolved
            .iter()
            .map(|(field, (_, header))| (field.to_string(), header.clone()))
            .collect();
        pairs.sort();
        pairs
    }
}

fn alias_list(field: &FieldSpec) -> String {
    format!("{} (aliases: {})", field.canonical, field.aliases.join(", "))
}

fn constraint_message(schema: &CanonicalSchema, constraint: &DimensionConstraint) -> String {
    let options: Vec<String> = constraint
        .options
        .iter()
        .map(|fields| {
            fields
                .iter()
                .filter_map(|name| schema.field(name))
                .map(alias_list)
                .collect::<Vec<_>>()
                .join(" + ")
        })
        .collect();
    format!("{}: {}", constraint.label, options.join(" or "))
}

/// Resolve each canonical field of `schema` against a header record.
///
/// Required fields that resolve to no column, and unsatisfied dimension
/// constraints, produce a single `HeaderMismatch` naming everything that is
/// missing. Unknown extra columns are ignored.
pub fn validate_headers(
    file: &str,
    header: &StringRecord,
    schema: &CanonicalSchema,
) -> Result<ColumnMap> {
    // First occurrence wins when a header repeats a name.
    let mut lookup: HashMap<String, (usize, String)> = HashMap::new();
    for (idx, cell) in header.iter().enumerate() {
        let key = cell.trim().to_ascii_lowercase();
        if key.is_empty() {
            continue;
        }
        lookup.entry(key).or_insert((idx, cell.trim().to_string()));
    }

    let mut resolved: HashMap<&'static str, (usize, String)> = HashMap::new();
    let mut defaulted: Vec<&'static str> = Vec::new();
    let mut missing: Vec<String> = Vec::new();

    for field in schema.fields {
        let hit = field
            .aliases
            .iter()
            .find_map(|alias| lookup.get(&alias.to_ascii_lowercase()));
        match hit {
            Some((idx, original)) => {
                resolved.insert(field.canonical, (*idx, original.clone()));
            }
            None if field.required => missing.push(alias_list(field)),
            None => {
                if field.default.is_some() {
                    defaulted.push(field.canonical);
                }
            }
        }
    }

    for constraint in schema.constraints {
        let satisfied = constraint
            .options
            .iter()
            .any(|fields| fields.iter().all(|name| resolved.contains_key(*name)));
        if !satisfied {
            missing.push(constraint_message(schema, constraint));
        }
    }

    if !missing.is_empty() {
        return Err(IngestError::HeaderMismatch {
            file: file.to_string(),
            missing,
        });
    }

    Ok(ColumnMap {
        file: file.to_string(),
        resolved,
        defaulted,
    })
}
