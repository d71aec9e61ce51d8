//! Search subcommand - one page of results from a query-style source

use anyhow::{Context, Result};
use clap::Args;
use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};

use paperdex_core::{Paper, fmt_num};

use super::{SortArg, SourceArg, source_client, truncate};
use crate::config::Config;

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Source to query
    #[arg(value_enum)]
    pub source: SourceArg,

    /// Free-text query
    pub query: String,

    /// Results per page
    #[arg(short, long, default_value_t = 10)]
    pub limit: usize,

    /// Results to skip
    #[arg(short, long, default_value_t = 0)]
    pub offset: usize,

    /// Result ordering (s2 only)
    #[arg(short, long, value_enum, default_value_t = SortArg::Relevance)]
    pub sort: SortArg,

    /// Print records as JSON lines instead of a table
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: SearchArgs, config: &Config) -> Result<()> {
    if args.query.trim().is_empty() {
        anyhow::bail!("Empty query");
    }
    if args.sort != SortArg::Relevance && args.source != SourceArg::S2 {
        log::warn!("--sort is only supported for s2, using relevance");
    }

    let client = source_client(args.source, args.sort, config);
    let results = client
        .search(&args.query, args.limit, args.offset)
        .with_context(|| format!("{} search failed", client.name()))?;

    if args.json {
        for paper in &results.papers {
            println!("{}", serde_json::to_string(paper)?);
        }
    } else {
        println!("{}", results_table(&results.papers, args.offset));
    }
    log::info!(
        "{}: showing {} of {} results",
        client.name(),
        results.papers.len(),
        fmt_num(results.total as usize)
    );
    Ok(())
}

fn results_table(papers: &[Paper], offset: usize) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(
            ["#", "Id", "Year", "Title", "Citations"]
                .into_iter()
                .map(|h| Cell::new(h).fg(Color::Cyan)),
        );
    for (i, p) in papers.iter().enumerate() {
        table.add_row(vec![
            (offset + i + 1).to_string(),
            p.external_id.clone(),
            p.year.map(|y| y.to_string()).unwrap_or_default(),
            truncate(&p.title, 80),
            p.citation_count.to_string(),
        ]);
    }
    table
}
