//! paperdex - bibliographic ingestion and search indexing
//!
//! Pulls paper metadata from arXiv, PubMed, Semantic Scholar and OpenAlex,
//! normalizes it into one record shape and bulk-writes it into a search
//! index, with an optional DuckDB mirror for citation enrichment.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

mod cmd;
mod config;

use config::Config;
use paperdex_core::{FORCED_EXIT_CODE, ProgressContext, SharedProgress, ShutdownFlag};

#[derive(Parser)]
#[command(name = "paperdex")]
#[command(about = "Bibliographic ingestion and search indexing")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Config file path (default: ./paperdex.toml or ~/.config/paperdex/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Read timeout in seconds for stall detection
    #[arg(long, global = true)]
    read_timeout: Option<u64>,

    /// Maximum attempts for transient failures
    #[arg(long, global = true)]
    max_retries: Option<u32>,
}

#[derive(Subcommand)]
enum Command {
    /// Search a source and print one page of results
    Search(cmd::search::SearchArgs),
    /// Fetch one record by id
    Fetch(cmd::fetch::FetchArgs),
    /// Ingest a source into the search index
    Import(cmd::import::ImportArgs),
    /// Manage the search index
    Index(cmd::index::IndexArgs),
    /// Fill citation counts in the DuckDB store
    Enrich(cmd::enrich::EnrichArgs),
    /// Show current configuration
    Config,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Progress context (TTY auto-detect)
    let progress: SharedProgress = Arc::new(ProgressContext::new());

    // TTY: warn unless --debug, progress bars show activity.
    // Non-TTY: info unless --quiet, logs are the only progress indicator.
    let is_tty = progress.is_tty();
    let multi = if is_tty { Some(progress.multi()) } else { None };
    let quiet = cli.quiet || (is_tty && !cli.debug && is_long_running(&cli.command));
    paperdex_core::init_logging(quiet, cli.debug, multi);

    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load()?,
    };
    if let Some(secs) = cli.read_timeout {
        config.http.read_timeout = secs;
    }
    if cli.max_retries.is_some() {
        config.retry.max_attempts = cli.max_retries;
    }
    paperdex_core::set_http_config(config.http_config());

    let shutdown = ShutdownFlag::new();
    shutdown
        .install_signal_handlers()
        .context("Failed to install signal handlers")?;

    match cli.command {
        Command::Search(args) => cmd::search::run(args, &config)?,
        Command::Fetch(args) => cmd::fetch::run(args, &config)?,
        Command::Import(args) => cmd::import::run(args, &config, &progress, &shutdown)?,
        Command::Index(args) => cmd::index::run(args, &config)?,
        Command::Enrich(args) => cmd::enrich::run(args, &config, &shutdown)?,
        Command::Config => print_config(&config),
    }

    if shutdown.is_requested() {
        log::warn!("Interrupted; progress up to the last completed batch is kept");
        return Ok(ExitCode::from(FORCED_EXIT_CODE as u8));
    }
    Ok(ExitCode::SUCCESS)
}

/// Commands that draw progress bars
fn is_long_running(command: &Command) -> bool {
    matches!(command, Command::Import(_) | Command::Enrich(_))
}

fn print_config(config: &Config) {
    let configured = |v: &Option<String>| {
        if v.is_some() {
            "configured".to_string()
        } else {
            "not set".to_string()
        }
    };
    let rows = [
        ("Index URL", config.index.url.clone()),
        ("Index name", config.index.name.clone()),
        ("Index API key", configured(&config.index.api_key)),
        ("Bulk size", config.index.bulk_size.to_string()),
        ("arXiv URL", config.arxiv.base_url.clone()),
        ("arXiv delay", format!("{}ms", config.arxiv.delay_ms)),
        ("PubMed URL", config.pubmed.base_url.clone()),
        ("PubMed API key", configured(&config.pubmed.api_key)),
        ("S2 graph URL", config.s2.graph_url.clone()),
        ("S2 datasets URL", config.s2.datasets_url.clone()),
        ("S2 API key", configured(&config.s2.api_key)),
        ("OA base URL", config.openalex.base_url.clone()),
        (
            "OA filter",
            config.openalex.filter.clone().unwrap_or_else(|| "none".into()),
        ),
        (
            "OA mailto",
            config.openalex.mailto.clone().unwrap_or_else(|| "not set".into()),
        ),
        ("Enrich store", config.enrich.db_path.display().to_string()),
        ("Enrich batch", config.enrich.batch_size.to_string()),
        ("Request timeout", format!("{}s", config.http.request_timeout)),
        ("Read timeout", format!("{}s", config.http.read_timeout)),
        (
            "Max attempts",
            config
                .retry
                .max_attempts
                .map_or_else(|| "per source".to_string(), |n| n.to_string()),
        ),
    ];
    cmd::print_summary("Setting", &rows);
}
