//! `portfolio-ingest` command line interface.
//!
//! Dispatches the ingestion pipeline around the extraction engine: read a
//! statement PDF, reconstruct holdings and cash, archive the source file,
//! persist a canonical snapshot, and leave a structured run log. All
//! user-visible reporting happens here; the engine only returns data.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, ensure, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use portfolio_ingest::config::Config;
use portfolio_ingest::extract;
use portfolio_ingest::pdf;
use portfolio_ingest::runlog::RunLogger;
use portfolio_ingest::snapshot;

#[derive(Parser)]
#[command(
    name = "portfolio-ingest",
    version,
    about = "Broker statement ingestion and portfolio snapshot reconstruction"
)]
struct Cli {
    /// Repository root holding config.json, portfolio/ and logs/
    #[arg(long, default_value = ".")]
    root: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest a broker statement PDF into a canonical snapshot
    Ingest {
        /// Path to the statement PDF
        pdf: PathBuf,
        /// Account label used in ids and file names
        #[arg(long, default_value = "unknown")]
        account: String,
        /// Skip the holdings CSV export
        #[arg(long)]
        no_csv: bool,
    },
    /// Show the repository's ingestion status
    Status,
    /// Structurally validate a snapshot JSON file
    Validate {
        /// Snapshot JSON file, absolute or relative to the root
        file: PathBuf,
    },
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::Ingest { .. } => "ingest",
            Command::Status => "status",
            Command::Validate { .. } => "validate",
        }
    }

    fn log_args(&self) -> Vec<String> {
        match self {
            Command::Ingest { pdf, account, .. } => {
                vec![pdf.display().to_string(), account.clone()]
            }
            Command::Status => vec![],
            Command::Validate { file } => vec![file.display().to_string()],
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = match Config::load(&cli.root) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    let mut logger = RunLogger::new(cli.command.name(), &cli.command.log_args());

    let outcome = match &cli.command {
        Command::Ingest {
            pdf,
            account,
            no_csv,
        } => cmd_ingest(&cli.root, &config, &mut logger, pdf, account, !*no_csv),
        Command::Status => cmd_status(&cli.root, &config, &mut logger),
        Command::Validate { file } => cmd_validate(&cli.root, file, &mut logger),
    };

    let code = match outcome {
        Ok(()) => {
            logger.success();
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e:#}");
            logger.failure(format!("{e:#}"));
            ExitCode::FAILURE
        }
    };

    if let Err(e) = logger.write(&config.logs_dir(&cli.root)) {
        eprintln!("warning: could not write run log: {e:#}");
    }
    code
}

fn cmd_ingest(
    root: &Path,
    config: &Config,
    logger: &mut RunLogger,
    pdf_path: &Path,
    account: &str,
    export_csv: bool,
) -> Result<()> {
    ensure!(pdf_path.exists(), "PDF not found: {}", pdf_path.display());
    ensure!(
        pdf_path
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("pdf")),
        "file is not a PDF: {}",
        pdf_path.display()
    );

    info!("extracting text from {}", pdf_path.display());
    let text = pdf::extract_text(pdf_path)?;
    let extraction = extract::extract_portfolio(&text, &config.extractor_config())
        .with_context(|| format!("extracting {}", pdf_path.display()))?;
    info!(
        "extracted {} holdings, cash {}",
        extraction.holdings.len(),
        if extraction.cash.is_some() { "found" } else { "missing" }
    );
    for w in &extraction.warnings {
        warn!(code = %w.code, line = ?w.line_index, "{}", w.message);
        logger.add_warning(&w.message);
    }

    let now = Utc::now();

    // Archive the source PDF under a reproducible name.
    let raw_dir = config.raw_dir(root);
    fs::create_dir_all(&raw_dir).with_context(|| format!("creating {}", raw_dir.display()))?;
    let broker_slug = config.broker.to_lowercase().replace(' ', "_");
    let archived_name = format!(
        "{broker_slug}_{account}_{}_portfolio.pdf",
        now.format("%Y-%m-%d-%H%M%S")
    );
    let archived = raw_dir.join(&archived_name);
    fs::copy(pdf_path, &archived)
        .with_context(|| format!("archiving PDF to {}", archived.display()))?;
    logger.add_path(&archived);

    let snap = snapshot::build_snapshot(
        &extraction,
        &archived_name,
        account,
        &config.broker,
        &config.base_currency,
        now,
    );

    let snapshots_dir = config.snapshots_dir(root);
    let snapshot_path = snapshot::write_snapshot(&snap, &snapshots_dir)?;
    logger.add_path(&snapshot_path);

    let portfolio_dir = snapshots_dir
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| root.to_path_buf());
    let latest_path = snapshot::write_latest(&snap, &portfolio_dir)?;
    logger.add_path(&latest_path);

    if export_csv {
        let csv_path = snapshot::write_csv_export(&snap, &config.exports_dir(root))?;
        logger.add_path(&csv_path);
    }

    logger.set_info("snapshot_id", snap.snapshot_id.clone());
    logger.set_info("holdings_count", snap.holdings.len());
    logger.set_info("has_cash", !snap.cash.is_empty());

    println!("Snapshot {} written to {}", snap.snapshot_id, snapshot_path.display());
    println!("  holdings: {}", snap.holdings.len());
    match snap.cash.first().and_then(|c| c.amount) {
        Some(amount) => println!("  cash: {:.2} {}", amount, snap.cash[0].currency),
        None => println!("  cash: none found"),
    }
    for note in &snap.metadata.validation_notes {
        println!("  note: {note}");
    }
    Ok(())
}

fn cmd_status(root: &Path, config: &Config, logger: &mut RunLogger) -> Result<()> {
    let snapshots_dir = config.snapshots_dir(root);
    match latest_file(&snapshots_dir, "json") {
        Some(path) => {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            println!("Latest snapshot: {name}");
            logger.add_path(&path);
            logger.set_info("latest_snapshot", name);
        }
        None => {
            println!("No portfolio snapshots found");
            logger.add_warning("no portfolio snapshots found");
        }
    }

    let pdf_count = count_files(&config.raw_dir(root), "pdf");
    println!("Raw PDFs in {}: {}", config.portfolio_raw_dir, pdf_count);
    logger.set_info("raw_pdf_count", pdf_count);

    match latest_run_log(&config.logs_dir(root)) {
        Some(path) => println!("Last run log: {}", path.display()),
        None => println!("No run logs found"),
    }
    Ok(())
}

fn cmd_validate(root: &Path, file: &Path, logger: &mut RunLogger) -> Result<()> {
    let path = if file.is_absolute() {
        file.to_path_buf()
    } else {
        root.join(file)
    };
    logger.add_path(&path);

    let report = snapshot::validate_snapshot_file(&path)?;
    if report.valid {
        println!("{}: OK", path.display());
        return Ok(());
    }
    for error in &report.errors {
        println!("  {error}");
    }
    bail!(
        "{} failed structural validation ({} errors)",
        path.display(),
        report.errors.len()
    );
}

/// Lexicographically last file with the given extension; snapshot ids sort
/// by time, so this is the most recent one.
fn latest_file(dir: &Path, ext: &str) -> Option<PathBuf> {
    let entries = fs::read_dir(dir).ok()?;
    entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|x| x.eq_ignore_ascii_case(ext)))
        .max()
}

fn count_files(dir: &Path, ext: &str) -> usize {
    fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .filter(|e| {
                    e.path()
                        .extension()
                        .is_some_and(|x| x.eq_ignore_ascii_case(ext))
                })
                .count()
        })
        .unwrap_or(0)
}

/// Most recent run log across the dated subdirectories.
fn latest_run_log(logs_dir: &Path) -> Option<PathBuf> {
    let latest_day = latest_dir(logs_dir)?;
    latest_file(&latest_day, "json")
}

fn latest_dir(dir: &Path) -> Option<PathBuf> {
    let entries = fs::read_dir(dir).ok()?;
    entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .max()
}
