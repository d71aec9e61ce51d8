//! Import subcommand - ingest a source into the search index

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use indicatif::ProgressBar;

use paperdex_core::{
    PaperSink, PaperSource, ProgressContext, RunStatus, START_CURSOR, ShutdownFlag, Tee,
    fmt_duration, fmt_num,
};
use paperdex_enrich::DuckDbStore;
use paperdex_index::{BulkIndexer, ElasticIndex, IndexStats};
use paperdex_semantic_scholar::{BulkImporter, DatasetsClient, ImportConfig, open_local};

use super::{SortArg, SourceArg, print_summary, source_client};
use crate::config::Config;

#[derive(Args, Debug)]
pub struct ImportArgs {
    #[command(subcommand)]
    pub source: ImportSource,

    #[command(flatten)]
    pub sink: SinkArgs,
}

#[derive(Args, Debug)]
pub struct SinkArgs {
    /// Also upsert every batch into this DuckDB file (for enrichment)
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,

    /// Documents per bulk request
    #[arg(long, global = true)]
    pub bulk_size: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum ImportSource {
    /// Semantic Scholar bulk dataset (gzip JSON lines)
    S2(S2Args),
    /// OpenAlex works via cursor pagination
    Openalex(OpenAlexArgs),
    /// arXiv search results
    Arxiv(QueryArgs),
    /// PubMed search results
    Pubmed(QueryArgs),
}

#[derive(Args, Debug)]
pub struct S2Args {
    /// Release id or "latest"
    #[arg(long, default_value = "latest")]
    pub release: String,

    /// Dataset name
    #[arg(long, default_value = "papers")]
    pub dataset: String,

    /// Index of the first file to import (resume point)
    #[arg(long, default_value_t = 0)]
    pub start_file: usize,

    /// Stop after this many files
    #[arg(long)]
    pub max_files: Option<usize>,

    /// Keep papers without an arXiv id
    #[arg(long)]
    pub all_papers: bool,

    /// Import local .gz files instead of the release manifest
    #[arg(long, num_args = 1..)]
    pub local: Vec<PathBuf>,
}

#[derive(Args, Debug)]
pub struct OpenAlexArgs {
    /// Resume cursor printed by an earlier run
    #[arg(long, default_value = START_CURSOR)]
    pub cursor: String,

    /// Works filter expression; empty for no filter
    #[arg(long)]
    pub filter: Option<String>,

    /// Keep works without an arXiv id under their OpenAlex id
    #[arg(long)]
    pub all_works: bool,

    /// Stop after this many pages
    #[arg(long)]
    pub max_pages: Option<u64>,
}

#[derive(Args, Debug)]
pub struct QueryArgs {
    /// Free-text query
    pub query: String,

    /// Most results to import
    #[arg(short, long, default_value_t = 100)]
    pub limit: usize,

    /// Results requested per call
    #[arg(long, default_value_t = 50)]
    pub page_size: usize,
}

pub fn run(
    args: ImportArgs,
    config: &Config,
    progress: &ProgressContext,
    shutdown: &ShutdownFlag,
) -> Result<()> {
    // Credentials are checked before the index is touched
    let local = matches!(&args.source, ImportSource::S2(s2) if !s2.local.is_empty());
    if matches!(args.source, ImportSource::S2(_)) && !local {
        config.require_s2_key()?;
    }

    let bulk_size = args.sink.bulk_size.unwrap_or(config.index.bulk_size);
    let mut indexer =
        BulkIndexer::new(ElasticIndex::new(config.elastic_config())).with_bulk_size(bulk_size);
    if indexer
        .ensure_index()
        .context("Failed to prepare the search index")?
    {
        log::info!("Created index '{}'", config.index.name);
    }

    let store = args.sink.store.as_deref();
    let result = match args.source {
        ImportSource::S2(s2) => with_sink(&mut indexer, store, |sink| {
            import_s2(s2, config, progress, shutdown, sink)
        }),
        ImportSource::Openalex(oa) => {
            with_sink(&mut indexer, store, |sink| import_openalex(oa, config, shutdown, sink))
        }
        ImportSource::Arxiv(q) => with_sink(&mut indexer, store, |sink| {
            import_query(SourceArg::Arxiv, q, config, progress, shutdown, sink)
        }),
        ImportSource::Pubmed(q) => with_sink(&mut indexer, store, |sink| {
            import_query(SourceArg::Pubmed, q, config, progress, shutdown, sink)
        }),
    };

    log_index_stats(&indexer.stats());
    result
}

/// Run `f` against the indexer, mirrored into a DuckDB store when one is given
fn with_sink<F>(
    indexer: &mut BulkIndexer<ElasticIndex>,
    store: Option<&Path>,
    f: F,
) -> Result<()>
where
    F: FnOnce(&mut dyn PaperSink) -> Result<()>,
{
    match store {
        Some(path) => {
            let mut db = DuckDbStore::open(path)?;
            log::info!("Mirroring batches into {}", path.display());
            let result = f(&mut Tee::new(&mut *indexer, &mut db));
            match db.len() {
                Ok(n) => log::info!("Store holds {} papers", fmt_num(n as usize)),
                Err(e) => log::warn!("Failed to count stored papers: {e:#}"),
            }
            result
        }
        None => f(indexer),
    }
}

fn log_index_stats(stats: &IndexStats) {
    log::info!(
        "index: {} submitted, {} accepted, {} rejected, {} dropped, {} requests",
        fmt_num(stats.submitted as usize),
        fmt_num(stats.accepted as usize),
        fmt_num(stats.errors as usize),
        fmt_num(stats.dropped as usize),
        stats.requests
    );
}

fn import_s2(
    args: S2Args,
    config: &Config,
    progress: &ProgressContext,
    shutdown: &ShutdownFlag,
    sink: &mut dyn PaperSink,
) -> Result<()> {
    let import_config = ImportConfig {
        release: args.release,
        dataset: args.dataset,
        start_file: args.start_file,
        max_files: args.max_files,
        arxiv_only: !args.all_papers,
        ..ImportConfig::default()
    };

    let summary = if args.local.is_empty() {
        let client = DatasetsClient::new(config.s2_config());
        let release = client.resolve_release(&import_config.release)?;
        let files = client
            .dataset_files(&release, &import_config.dataset)
            .with_context(|| format!("Failed to list {} files", import_config.dataset))?;
        log::info!("Release {release}: {} files", files.len());
        BulkImporter::new(import_config, shutdown.clone()).run(&files, sink, progress)
    } else {
        let files: Vec<String> = args
            .local
            .iter()
            .map(|p| p.display().to_string())
            .collect();
        BulkImporter::new(import_config, shutdown.clone()).run_with(
            &files,
            sink,
            progress,
            |path| {
                let (reader, counter, len) = open_local(Path::new(path))?;
                Ok((Box::new(reader) as Box<dyn Read>, counter, Some(len)))
            },
        )
    };
    summary.log();

    let t = &summary.totals;
    print_summary(
        "Semantic Scholar",
        &[
            (
                "Files",
                format!(
                    "{}/{} ({} failed)",
                    summary.files_done,
                    summary.files_selected,
                    summary.failed_files.len()
                ),
            ),
            (
                "Lines",
                format!(
                    "{} ({} malformed)",
                    fmt_num(t.decode.lines_scanned),
                    fmt_num(t.decode.malformed)
                ),
            ),
            ("Converted", fmt_num(t.converted)),
            ("Indexed", fmt_num(t.accepted)),
            ("Time", fmt_duration(summary.elapsed)),
        ],
    );

    if !summary.failed_files.is_empty() {
        anyhow::bail!("Files failed: {:?}", summary.failed_files);
    }
    Ok(())
}

fn import_openalex(
    args: OpenAlexArgs,
    config: &Config,
    shutdown: &ShutdownFlag,
    sink: &mut dyn PaperSink,
) -> Result<()> {
    let mut oa = config.openalex_config();
    if let Some(filter) = args.filter {
        oa.filter = Some(filter);
    }
    oa.all_works = args.all_works;
    oa.max_pages = args.max_pages;

    let outcome = paperdex_openalex::run(&oa, &args.cursor, sink, shutdown.clone());
    let p = &outcome.progress;
    print_summary(
        "OpenAlex",
        &[
            ("Pages", fmt_num(p.pages as usize)),
            ("Converted", fmt_num(p.converted)),
            ("Skipped", fmt_num(p.skipped)),
            ("Indexed", format!("{} ({} errors)", fmt_num(p.indexed), p.errors)),
            ("Time", fmt_duration(p.elapsed())),
        ],
    );

    let resume = outcome.resume_cursor.as_deref().unwrap_or(START_CURSOR);
    match outcome.status {
        RunStatus::Completed => Ok(()),
        RunStatus::Cancelled | RunStatus::PageLimit => {
            log::warn!("OpenAlex import stopped early, resume with --cursor '{resume}'");
            Ok(())
        }
        RunStatus::Aborted { error } => {
            anyhow::bail!("OpenAlex import aborted: {error}; resume with --cursor '{resume}'")
        }
    }
}

/// Totals for a query import
#[derive(Debug, Default, PartialEq, Eq)]
struct QueryImport {
    calls: usize,
    fetched: usize,
    accepted: usize,
}

/// Page through `source` results, writing each page to `sink`.
fn import_results<S, K>(
    source: &S,
    query: &str,
    limit: usize,
    page_size: usize,
    sink: &mut K,
    shutdown: &ShutdownFlag,
    pb: &ProgressBar,
) -> Result<QueryImport>
where
    S: PaperSource + ?Sized,
    K: PaperSink + ?Sized,
{
    let page_size = page_size.max(1);
    let mut totals = QueryImport::default();
    let mut offset = 0;
    while offset < limit && !shutdown.is_requested() {
        let want = page_size.min(limit - offset);
        pb.set_message(format!("offset {offset}, {} indexed", totals.accepted));
        let results = source
            .search(query, want, offset)
            .with_context(|| format!("{} search at offset {offset} failed", source.name()))?;
        totals.calls += 1;
        totals.fetched += results.papers.len();
        offset += want;

        let last_page = offset as u64 >= results.total;
        if !results.papers.is_empty() {
            totals.accepted += sink.write_batch(results.papers)?;
        }
        if last_page {
            break;
        }
    }
    totals.accepted += sink.flush()?;
    Ok(totals)
}

fn import_query(
    source: SourceArg,
    args: QueryArgs,
    config: &Config,
    progress: &ProgressContext,
    shutdown: &ShutdownFlag,
    sink: &mut dyn PaperSink,
) -> Result<()> {
    let client = source_client(source, SortArg::Relevance, config);
    let pb = progress.stage_line(client.name());
    let result = import_results(
        client.as_ref(),
        &args.query,
        args.limit,
        args.page_size,
        sink,
        shutdown,
        &pb,
    );
    pb.finish_and_clear();
    let totals = result?;
    print_summary(
        client.name(),
        &[
            ("Requests", totals.calls.to_string()),
            ("Fetched", fmt_num(totals.fetched)),
            ("Indexed", fmt_num(totals.accepted)),
        ],
    );
    Ok(())
}
