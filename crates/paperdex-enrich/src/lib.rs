//! Paperdex Enrich - citation counts for stored papers
//!
//! Papers mirrored into the DuckDB store during ingestion start with a
//! citation count of 0. The enrichment job looks them up in batches and
//! writes real counts, using a negative sentinel for "checked, none found"
//! while the run is in progress.

pub mod job;
pub mod lookup;
pub mod store;

// Re-exports
pub use job::{EnrichConfig, EnrichStatus, EnrichSummary, EnrichmentJob, citation_value};
pub use lookup::{CitationLookup, S2CitationLookup};
pub use store::{CitationStore, DuckDbStore, RecordKey, SENTINEL};
