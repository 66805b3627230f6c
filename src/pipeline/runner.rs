//! End-to-end run orchestration.
//!
//! One invocation processes one inbox root for one set of requested years,
//! synchronously: scan -> select -> guard/hash -> copy raw -> validate
//! headers -> normalize -> merge -> write tables -> reconcile -> manifest.
//! A single `RunContext` is threaded through and serialized exactly once at
//! the end; hard errors abort before any manifest is written.

use std::fs;
use std::path::{Path, PathBuf};

use metrics::{counter, histogram};
use tracing::{debug, info, warn};

use crate::config::{Config, RunPolicy};
use crate::domain::{ReportType, Source};
use crate::error::{IngestError, Result};
use crate::hashing;
use crate::manifest::{self, HeaderOutcomeEntry, RunContext, SelectedFileEntry};
use crate::pipeline::ingestion::{scan, select};
use crate::pipeline::processing::reconcile::ReconcileStatus;
use crate::pipeline::processing::{normalize, reconcile, schema};
use crate::safety;

/// What the caller gets back from a terminal run.
#[derive(Debug)]
pub struct RunSummary {
    pub run_id: String,
    pub run_root: PathBuf,
    pub manifest_path: PathBuf,
    pub selected_files: usize,
    pub output_files: Vec<PathBuf>,
    pub warnings: usize,
    pub file_errors: usize,
    pub reconciliation_mismatches: usize,
}

impl RunSummary {
    /// True when the run completed without recorded warnings or errors.
    pub fn is_clean(&self) -> bool {
        self.warnings == 0 && self.file_errors == 0 && self.reconciliation_mismatches == 0
    }
}

/// A winner that passed the safety guard and was hashed, awaiting ingestion.
#[derive(Debug)]
struct PreparedWinner {
    source: Source,
    report_type: ReportType,
    year: i32,
    path: PathBuf,
    file_name: String,
    entry_index: usize,
}

fn normalize_years(years: &[i32]) -> Result<Vec<i32>> {
    let mut years: Vec<i32> = years.to_vec();
    years.sort_unstable();
    years.dedup();
    if years.is_empty() {
        return Err(IngestError::Config(
            "at least one year is required".to_string(),
        ));
    }
    Ok(years)
}

fn raw_copy_destination(run_root: &Path, winner: &PreparedWinner) -> PathBuf {
    run_root
        .join("raw")
        .join(winner.source.prefix())
        .join(winner.report_type.as_str())
        .join(winner.year.to_string())
        .join(&winner.file_name)
}

/// Run the full pipeline and return a summary of the terminal state.
pub fn run(config: &Config, years: &[i32]) -> Result<RunSummary> {
    let started = std::time::Instant::now();
    let years = normalize_years(years)?;
    let policy = config.run.policy;
    info!(
        inbox_root = %config.inbox.root.display(),
        ?years,
        %policy,
        "starting inbox ingestion run"
    );
    counter!("inbox_runs_total").increment(1);

    let mut ctx = RunContext::new();

    // Stage 1+2: scan candidates, record rejections.
    let scan_outcome = scan::scan_inbox(&config.inbox.root)?;
    ctx.record_rejections(&scan_outcome.rejections);
    for rejection in &scan_outcome.rejections {
        warn!(entry = %rejection.entry, reason = %rejection.reason, "rejected inbox entry");
    }

    // Stage 3: select one winner per required (source, report_type, year).
    let selection = select::select_for_years(&scan_outcome.candidates, &years, policy)?;
    for warning in &selection.warnings {
        warn!("{warning}");
        ctx.record_warning(warning.clone());
    }

    // Stage 4: safety guard + content hash for every winner. Read-only, so
    // the run directory is not created until the winner set is known.
    let mut prepared: Vec<PreparedWinner> = Vec::new();
    for group in &selection.groups {
        let Some(winner) = &group.winner else {
            continue;
        };
        let file_name = winner.file_name();
        let resolved = match safety::guard(
            &winner.path,
            &config.inbox.root,
            config.inbox.max_file_size_bytes,
        ) {
            Ok(path) => path,
            Err(e) => {
                if policy == RunPolicy::Strict {
                    return Err(e);
                }
                warn!(file = %file_name, error = %e, "winner failed safety guard");
                ctx.record_file_error(&file_name, &e);
                continue;
            }
        };

        let sha256 = hashing::sha256_file(&resolved)?;
        ctx.selected_files.push(SelectedFileEntry {
            source: group.source,
            report_type: group.report_type,
            year: group.year,
            report_date: winner.parsed_date,
            inbox_path: format!("{}/{}", group.source.prefix(), file_name),
            copied_path: None,
            size_bytes: winner.file_size_bytes,
            sha256,
            selection_reason: group.reason.clone(),
        });
        prepared.push(PreparedWinner {
            source: group.source,
            report_type: group.report_type,
            year: group.year,
            path: resolved,
            file_name,
            entry_index: ctx.selected_files.len() - 1,
        });
    }
    counter!("inbox_files_selected_total").increment(prepared.len() as u64);

    // The run directory is content-addressed: an unchanged inbox re-runs
    // into the same place.
    let run_id = manifest::build_run_id(&ctx.selected_files, &years);
    let run_root = config.run.output_root.join(&run_id);
    fs::create_dir_all(&run_root)?;
    debug!(%run_id, run_root = %run_root.display(), "run directory ready");

    // Stage 5+6: copy raw, validate headers, normalize.
    let mut table_set = normalize::YearTableSet::new();
    for winner in &prepared {
        let destination = raw_copy_destination(&run_root, winner);
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(&winner.path, &destination)?;
        ctx.selected_files[winner.entry_index].copied_path = Some(format!(
            "raw/{}/{}/{}/{}",
            winner.source.prefix(),
            winner.report_type.as_str(),
            winner.year,
            winner.file_name
        ));

        let file_schema = schema::schema_for(winner.source, winner.report_type);
        let mut reader = csv::Reader::from_path(&winner.path)?;
        let header = reader.headers()?.clone();
        let column_map = match schema::validate_headers(&winner.file_name, &header, file_schema) {
            Ok(map) => map,
            Err(e) => {
                if policy == RunPolicy::Strict {
                    return Err(e);
                }
                warn!(file = %winner.file_name, error = %e, "header validation failed");
                ctx.record_file_error(&winner.file_name, &e);
                continue;
            }
        };
        ctx.header_validation.push(HeaderOutcomeEntry {
            file: winner.file_name.clone(),
            schema: file_schema.name.to_string(),
            schema_version: file_schema.version.to_string(),
            resolved: column_map.resolved_pairs(),
            defaulted: column_map.defaulted.iter().map(|f| f.to_string()).collect(),
        });

        match normalize::normalize_file(&winner.path, &column_map, file_schema, &years) {
            Ok((rows, outcome)) => {
                ctx.record_normalization(&winner.file_name, outcome);
                table_set.append(winner.source, rows);
            }
            Err(e) => {
                if policy == RunPolicy::Strict {
                    return Err(e);
                }
                warn!(file = %winner.file_name, error = %e, "row normalization failed");
                ctx.record_file_error(&winner.file_name, &e);
            }
        }
    }

    // Stage 7: merge is complete; write deterministic yearly tables.
    let tables = table_set.finalize();
    let normalized_dir = run_root.join("normalized");
    let output_files = normalize::write_tables(&tables, &normalized_dir)?;
    for path in &output_files {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        ctx.outputs.push(format!("normalized/{file_name}"));
    }

    // Stage 8: reconcile each table; mismatches are warnings unless the
    // stricter mode escalates them.
    let mut mismatches = 0usize;
    for table in &tables {
        let result = reconcile::check_table(table, config.reconcile.tolerance);
        if result.status == ReconcileStatus::Mismatch {
            mismatches += 1;
            warn!(
                source = %result.source,
                year = result.year,
                delta = result.delta,
                "reconciliation mismatch"
            );
            if config.reconcile.strict {
                return Err(IngestError::ReconciliationMismatch {
                    source: result.source,
                    year: result.year,
                    total_gross: result.total_gross,
                    itemized_gross: result.itemized_gross,
                    delta: result.delta,
                });
            }
        }
        ctx.reconciliation.push(result);
    }
    counter!("inbox_reconciliation_mismatches_total").increment(mismatches as u64);

    // Stage 9: the manifest is the last write of the run.
    let warnings = ctx.warnings.len();
    let file_errors = ctx.file_errors.len();
    let selected_files = ctx.selected_files.len();
    let manifest = ctx.into_manifest(run_id.clone(), years, policy);
    let manifest_path = manifest::write_manifest(&manifest, &run_root)?;

    let elapsed = started.elapsed().as_secs_f64();
    histogram!("inbox_run_duration_seconds").record(elapsed);
    info!(
        %run_id,
        selected_files,
        outputs = output_files.len(),
        warnings,
        file_errors,
        mismatches,
        "inbox ingestion run complete"
    );

    Ok(RunSummary {
        run_id,
        run_root,
        manifest_path,
        selected_files,
        output_files,
        warnings,
        file_errors,
        reconciliation_mismatches: mismatches,
    })
}
