use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::error;

use sales_inbox::config::Config;
use sales_inbox::pipeline::ingestion::{scan, select};
use sales_inbox::pipeline::runner;
use sales_inbox::{logging, RunPolicy};

#[derive(Parser)]
#[command(name = "sales_inbox")]
#[command(about = "Hotel sales export inbox ingestion pipeline")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full ingestion pipeline for the requested years
    Ingest {
        /// Years to ingest (comma-separated), e.g. 2024,2025
        #[arg(long, value_delimiter = ',', required = true)]
        years: Vec<i32>,
        /// Path to a TOML config file (defaults to ingest.toml when present)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Override the configured inbox root
        #[arg(long)]
        inbox_root: Option<PathBuf>,
        /// Override the configured output root
        #[arg(long)]
        output_root: Option<PathBuf>,
        /// Selection policy: strict or partial
        #[arg(long)]
        policy: Option<RunPolicy>,
        /// Override the per-file size ceiling in bytes
        #[arg(long)]
        max_file_size: Option<u64>,
        /// Escalate reconciliation mismatches to a run failure
        #[arg(long)]
        strict_reconciliation: bool,
    },
    /// Scan the inbox and list candidates and winners without reading bodies
    Scan {
        /// Years to group by (comma-separated); defaults to all candidates
        #[arg(long, value_delimiter = ',')]
        years: Vec<i32>,
        #[arg(long)]
        config: Option<PathBuf>,
        /// Override the configured inbox root
        #[arg(long)]
        inbox_root: Option<PathBuf>,
    },
}

fn run_ingest(config: Config, years: &[i32]) -> ExitCode {
    match runner::run(&config, years) {
        Ok(summary) => {
            println!("\n📊 Ingestion run {}", summary.run_id);
            println!("   Selected files: {}", summary.selected_files);
            println!("   Output tables: {}", summary.output_files.len());
            for path in &summary.output_files {
                println!("   - {}", path.display());
            }
            println!("   Manifest: {}", summary.manifest_path.display());
            if summary.is_clean() {
                println!("✅ Run completed cleanly");
                ExitCode::SUCCESS
            } else {
                println!(
                    "⚠️  Run completed with {} warning(s), {} file error(s), {} reconciliation mismatch(es)",
                    summary.warnings, summary.file_errors, summary.reconciliation_mismatches
                );
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            error!("ingestion run failed: {e}");
            println!("❌ Ingestion run failed: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run_scan(config: Config, years: &[i32]) -> ExitCode {
    let outcome = match scan::scan_inbox(&config.inbox.root) {
        Ok(outcome) => outcome,
        Err(e) => {
            println!("❌ Inbox scan failed: {e}");
            return ExitCode::FAILURE;
        }
    };

    println!("📥 {} candidate file(s)", outcome.candidates.len());
    for candidate in &outcome.candidates {
        println!(
            "   {} {}:{} {} ({} bytes)",
            candidate.parsed_date,
            candidate.source,
            candidate.report_type,
            candidate.file_name(),
            candidate.file_size_bytes
        );
    }
    if !outcome.rejections.is_empty() {
        println!("⚠️  {} rejected entr(ies)", outcome.rejections.len());
        for rejection in &outcome.rejections {
            println!("   - {}: {}", rejection.entry, rejection.reason);
        }
    }

    let years: Vec<i32> = if years.is_empty() {
        let mut all: Vec<i32> = outcome.candidates.iter().map(|c| c.year()).collect();
        all.sort_unstable();
        all.dedup();
        all
    } else {
        years.to_vec()
    };
    if years.is_empty() {
        println!("No candidate years to group");
        return ExitCode::SUCCESS;
    }

    match select::select_for_years(&outcome.candidates, &years, RunPolicy::Partial) {
        Ok(selection) => {
            println!("🏆 Winners:");
            for group in &selection.groups {
                match &group.winner {
                    Some(winner) => println!(
                        "   {}:{}:{} -> {} ({})",
                        group.source,
                        group.report_type,
                        group.year,
                        winner.file_name(),
                        group.reason
                    ),
                    None => println!(
                        "   {}:{}:{} -> missing",
                        group.source, group.report_type, group.year
                    ),
                }
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            println!("❌ Selection failed: {e}");
            ExitCode::FAILURE
        }
    }
}

fn main() -> ExitCode {
    logging::init_logging();

    let cli = Cli::parse();
    match cli.command {
        Commands::Ingest {
            years,
            config,
            inbox_root,
            output_root,
            policy,
            max_file_size,
            strict_reconciliation,
        } => {
            let mut config = match Config::load_or_default(config.as_deref()) {
                Ok(config) => config,
                Err(e) => {
                    println!("❌ {e}");
                    return ExitCode::FAILURE;
                }
            };
            if let Some(root) = inbox_root {
                config.inbox.root = root;
            }
            if let Some(root) = output_root {
                config.run.output_root = root;
            }
            if let Some(policy) = policy {
                config.run.policy = policy;
            }
            if let Some(ceiling) = max_file_size {
                config.inbox.max_file_size_bytes = ceiling;
            }
            if strict_reconciliation {
                config.reconcile.strict = true;
            }
            run_ingest(config, &years)
        }
        Commands::Scan {
            years,
            config,
            inbox_root,
        } => {
            let mut config = match Config::load_or_default(config.as_deref()) {
                Ok(config) => config,
                Err(e) => {
                    println!("❌ {e}");
                    return ExitCode::FAILURE;
                }
            };
            if let Some(root) = inbox_root {
                config.inbox.root = root;
            }
            run_scan(config, &years)
        }
    }
}
