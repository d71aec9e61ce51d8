//! Paperdex Semantic Scholar - Graph API search and bulk dataset import
//!
//! The Graph API backs query-style search, single-paper lookup and the
//! batch citation lookup used by enrichment. The Datasets API supplies a
//! release manifest whose gzip JSONL files are streamed through the core
//! batch decoder.

pub mod api;
pub mod config;
pub mod lookup;
pub mod runner;
pub mod search;
pub mod transform;

// Re-exports
pub use api::DatasetsClient;
pub use config::S2Config;
pub use lookup::{CitationClient, CitationCounts, MAX_BATCH_IDS, s2_lookup_id};
pub use runner::{
    BulkImporter, FileCounts, ImportConfig, ImportSummary, import_reader, open_local,
};
pub use search::{S2Client, SortMode};
pub use transform::{ExternalIdValue, ExternalIds, GraphPaper, PaperRow};
