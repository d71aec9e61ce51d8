//! Citation lookup capability and its Semantic Scholar implementation

use paperdex_core::ApiError;
use paperdex_semantic_scholar::{CitationClient, MAX_BATCH_IDS, s2_lookup_id};

use crate::store::RecordKey;

/// Batch citation-count lookup.
pub trait CitationLookup {
    /// Largest key count one `lookup` call accepts
    fn max_batch(&self) -> usize;

    /// Counts aligned with `keys`; `None` when the paper is unknown upstream.
    fn lookup(&self, keys: &[RecordKey]) -> Result<Vec<Option<u32>>, ApiError>;
}

pub struct S2CitationLookup {
    client: CitationClient,
}

impl S2CitationLookup {
    pub fn new(client: CitationClient) -> Self {
        Self { client }
    }
}

impl CitationLookup for S2CitationLookup {
    fn max_batch(&self) -> usize {
        MAX_BATCH_IDS
    }

    fn lookup(&self, keys: &[RecordKey]) -> Result<Vec<Option<u32>>, ApiError> {
        let ids: Vec<String> = keys
            .iter()
            .map(|k| s2_lookup_id(k.source, &k.external_id))
            .collect();
        let results = self.client.batch(&ids)?;
        Ok(results
            .into_iter()
            .map(|r| r.and_then(|c| c.citation_count))
            .collect())
    }
}
