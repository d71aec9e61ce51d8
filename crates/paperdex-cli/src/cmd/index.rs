//! Index subcommand - manage the search index

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use paperdex_index::{BulkIndexer, ElasticIndex, SearchIndex};

use crate::config::Config;

#[derive(Args, Debug)]
pub struct IndexArgs {
    #[command(subcommand)]
    pub action: IndexAction,
}

#[derive(Subcommand, Debug)]
pub enum IndexAction {
    /// Create the index with the paper mapping unless it exists
    Create,
    /// Delete the index and all its documents
    Delete,
    /// Number of indexed documents
    Count,
    /// Delete and create again with the current mapping
    Recreate,
}

pub fn run(args: IndexArgs, config: &Config) -> Result<()> {
    let mut index = ElasticIndex::new(config.elastic_config());
    let name = index.name().to_string();

    match args.action {
        IndexAction::Create => {
            let created = index
                .create_index_if_absent()
                .with_context(|| format!("Failed to create index '{name}'"))?;
            if created {
                log::info!("Created index '{name}'");
            } else {
                log::info!("Index '{name}' already exists");
            }
        }
        IndexAction::Delete => {
            let deleted = index
                .delete_index()
                .with_context(|| format!("Failed to delete index '{name}'"))?;
            if deleted {
                log::info!("Deleted index '{name}'");
            } else {
                log::info!("Index '{name}' does not exist");
            }
        }
        IndexAction::Count => {
            let count = index
                .document_count()
                .with_context(|| format!("Failed to count documents in '{name}'"))?;
            println!("{count}");
        }
        IndexAction::Recreate => {
            BulkIndexer::new(index)
                .recreate()
                .with_context(|| format!("Failed to recreate index '{name}'"))?;
            log::info!("Recreated index '{name}'");
        }
    }
    Ok(())
}
