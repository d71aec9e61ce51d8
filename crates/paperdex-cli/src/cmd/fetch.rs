//! Fetch subcommand - a single record by source id

use anyhow::{Context, Result};
use clap::Args;

use super::{SortArg, SourceArg, source_client};
use crate::config::Config;

#[derive(Args, Debug)]
pub struct FetchArgs {
    /// Source to ask
    #[arg(value_enum)]
    pub source: SourceArg,

    /// arXiv id or URL, PMID, or S2 paper id (`ARXIV:`, `DOI:` prefixes work)
    pub id: String,
}

pub fn run(args: FetchArgs, config: &Config) -> Result<()> {
    let client = source_client(args.source, SortArg::Relevance, config);
    let paper = client
        .fetch_by_id(&args.id)
        .with_context(|| format!("{} lookup of '{}' failed", client.name(), args.id))?;

    match paper {
        Some(paper) => {
            println!("{}", serde_json::to_string_pretty(&paper)?);
            Ok(())
        }
        None => anyhow::bail!("{}: no record for '{}'", client.name(), args.id),
    }
}
