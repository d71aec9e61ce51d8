//! Paperdex Index - bulk writes of canonical papers into a search index
//!
//! [`BulkIndexer`] is a [`paperdex_core::PaperSink`], so every ingestion
//! driver can feed it directly. Backends implement [`SearchIndex`]:
//! an Elasticsearch-compatible HTTP cluster, or an in-process map.

pub mod backend;
pub mod elastic;
pub mod error;
pub mod indexer;
pub mod memory;

// Re-exports
pub use backend::SearchIndex;
pub use elastic::{ElasticConfig, ElasticIndex, index_mapping};
pub use error::IndexError;
pub use indexer::{BatchFailure, BatchOutcome, BulkIndexer, DEFAULT_BULK_SIZE, IndexStats};
pub use memory::MemoryIndex;
