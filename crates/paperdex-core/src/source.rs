//! Query-style source adapters

use crate::error::ApiError;
use crate::record::Paper;

/// One page of search results plus the upstream's total hit count.
#[derive(Debug, Clone, Default)]
pub struct SearchResults {
    pub papers: Vec<Paper>,
    pub total: u64,
}

/// Capability shared by the feed, registry and relevance-API adapters.
///
/// Entries the adapter cannot resolve to an external id are left out of
/// `papers` rather than failing the call.
pub trait PaperSource {
    /// Short name used in logs and CLI output
    fn name(&self) -> &'static str;

    fn search(&self, query: &str, limit: usize, offset: usize) -> Result<SearchResults, ApiError>;

    /// `Ok(None)` when the upstream has no such record.
    fn fetch_by_id(&self, id: &str) -> Result<Option<Paper>, ApiError>;
}

impl<S: PaperSource + ?Sized> PaperSource for Box<S> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn search(&self, query: &str, limit: usize, offset: usize) -> Result<SearchResults, ApiError> {
        (**self).search(query, limit, offset)
    }

    fn fetch_by_id(&self, id: &str) -> Result<Option<Paper>, ApiError> {
        (**self).fetch_by_id(id)
    }
}
