//! Search index capability

use paperdex_core::Paper;

use crate::error::IndexError;

/// Document store behind the bulk indexer.
///
/// Documents are keyed by [`Paper::document_id`], so writing the same paper
/// twice overwrites instead of duplicating.
pub trait SearchIndex {
    /// Index name, for logs
    fn name(&self) -> &str;

    /// Create the index unless it exists; `true` when it was created now.
    fn create_index_if_absent(&mut self) -> Result<bool, IndexError>;

    /// Delete the index; an already absent index is success (`false`).
    fn delete_index(&mut self) -> Result<bool, IndexError>;

    /// Documents currently in the index; 0 when the index is absent.
    fn document_count(&self) -> Result<u64, IndexError>;

    /// Write documents, returning how many the index accepted.
    ///
    /// Per-document rejections lower the count; they are not errors.
    fn bulk_index(&mut self, papers: &[Paper]) -> Result<usize, IndexError>;
}

impl<I: SearchIndex + ?Sized> SearchIndex for Box<I> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn create_index_if_absent(&mut self) -> Result<bool, IndexError> {
        (**self).create_index_if_absent()
    }

    fn delete_index(&mut self) -> Result<bool, IndexError> {
        (**self).delete_index()
    }

    fn document_count(&self) -> Result<u64, IndexError> {
        (**self).document_count()
    }

    fn bulk_index(&mut self, papers: &[Paper]) -> Result<usize, IndexError> {
        (**self).bulk_index(papers)
    }
}
