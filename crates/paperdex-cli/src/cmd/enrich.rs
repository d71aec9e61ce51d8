//! Enrich subcommand - fill citation counts in the DuckDB store

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use paperdex_core::{ShutdownFlag, fmt_duration, fmt_num};
use paperdex_enrich::{
    DuckDbStore, EnrichStatus, EnrichSummary, EnrichmentJob, S2CitationLookup,
};
use paperdex_semantic_scholar::CitationClient;

use super::print_summary;
use crate::config::Config;

#[derive(Args, Debug)]
pub struct EnrichArgs {
    /// DuckDB store written by `import --store`
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// Rows looked up per request
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Stop after this many batches
    #[arg(long)]
    pub max_batches: Option<u64>,
}

pub fn run(args: EnrichArgs, config: &Config, shutdown: &ShutdownFlag) -> Result<()> {
    let path = args.db.unwrap_or_else(|| config.enrich.db_path.clone());
    if !path.exists() {
        anyhow::bail!("No store at {}; import with --store first", path.display());
    }
    let mut store = DuckDbStore::open(&path)?;

    let mut enrich_config = config.enrich_config();
    if let Some(n) = args.batch_size {
        enrich_config.batch_size = n;
    }
    enrich_config.max_batches = args.max_batches;

    let lookup = S2CitationLookup::new(CitationClient::new(config.s2_config()));
    let summary = EnrichmentJob::new(enrich_config, shutdown.clone())
        .run(&mut store, &lookup)
        .with_context(|| format!("Enrichment of {} failed", path.display()))?;
    summary.log();

    print_summary("Enrich", &summary_rows(&summary));

    match summary.status {
        EnrichStatus::Aborted { error } => anyhow::bail!("Enrichment aborted: {error}"),
        _ => Ok(()),
    }
}

/// Unfinished runs resume from the rows still at 0
fn status_text(status: &EnrichStatus) -> String {
    match status {
        EnrichStatus::Completed => "completed".to_string(),
        EnrichStatus::Cancelled => "cancelled, rerun to resume".to_string(),
        EnrichStatus::BatchLimit => "batch limit reached, rerun to resume".to_string(),
        EnrichStatus::Aborted { error } => format!("aborted ({error}), rerun to resume"),
    }
}

fn summary_rows(summary: &EnrichSummary) -> Vec<(&'static str, String)> {
    vec![
        ("Status", status_text(&summary.status)),
        ("Pending at start", fmt_num(summary.pending_at_start as usize)),
        ("Checked", fmt_num(summary.checked as usize)),
        ("Updated", fmt_num(summary.updated as usize)),
        ("Not found", fmt_num(summary.not_found as usize)),
        ("Failed lookups", summary.failed_lookups.to_string()),
        ("Time", fmt_duration(summary.elapsed)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn summary(status: EnrichStatus) -> EnrichSummary {
        EnrichSummary {
            status,
            pending_at_start: 1200,
            batches: 3,
            checked: 1000,
            updated: 900,
            not_found: 100,
            failed_lookups: 5,
            reset: 0,
            elapsed: Duration::from_secs(42),
        }
    }

    #[test]
    fn aborted_run_tells_user_to_rerun() {
        let rows = summary_rows(&summary(EnrichStatus::Aborted {
            error: "5 consecutive lookup failures".into(),
        }));
        assert_eq!(rows[0].0, "Status");
        assert_eq!(
            rows[0].1,
            "aborted (5 consecutive lookup failures), rerun to resume"
        );
    }

    #[test]
    fn completed_run_has_no_resume_hint() {
        let rows = summary_rows(&summary(EnrichStatus::Completed));
        assert_eq!(rows[0].1, "completed");
        assert!(status_text(&EnrichStatus::Cancelled).ends_with("rerun to resume"));
        assert!(status_text(&EnrichStatus::BatchLimit).ends_with("rerun to resume"));
    }
}
