//! Bulk indexer: chunked writes of canonical papers into a [`SearchIndex`]

use paperdex_core::{Paper, PaperSink, PartialWrite};

use crate::backend::SearchIndex;
use crate::error::IndexError;

pub const DEFAULT_BULK_SIZE: usize = 500;

/// Result of one `index_batch` call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Indexable papers sent to the backend
    pub submitted: usize,
    pub accepted: usize,
    /// Papers without a title or id, never sent
    pub dropped: usize,
}

impl BatchOutcome {
    pub fn errors(&self) -> usize {
        self.submitted - self.accepted
    }
}

/// A failed `index_batch` call, with what the earlier chunks wrote
#[derive(Debug)]
pub struct BatchFailure {
    pub outcome: BatchOutcome,
    pub error: IndexError,
}

impl std::fmt::Display for BatchFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} after {} of {} documents accepted",
            self.error, self.outcome.accepted, self.outcome.submitted
        )
    }
}

impl std::error::Error for BatchFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Running totals across the life of an indexer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexStats {
    pub submitted: u64,
    pub accepted: u64,
    pub errors: u64,
    pub dropped: u64,
    /// Backend bulk requests issued
    pub requests: u64,
}

impl IndexStats {
    fn record(&mut self, outcome: &BatchOutcome) {
        self.submitted += outcome.submitted as u64;
        self.accepted += outcome.accepted as u64;
        self.errors += outcome.errors() as u64;
        self.dropped += outcome.dropped as u64;
    }
}

/// Writes papers to an index in chunks of `bulk_size`.
///
/// Writes happen as soon as a batch arrives; nothing is held back between
/// calls, so the count returned from `write_batch` is final.
pub struct BulkIndexer<I> {
    index: I,
    bulk_size: usize,
    stats: IndexStats,
}

impl<I: SearchIndex> BulkIndexer<I> {
    pub fn new(index: I) -> Self {
        Self {
            index,
            bulk_size: DEFAULT_BULK_SIZE,
            stats: IndexStats::default(),
        }
    }

    pub fn with_bulk_size(mut self, bulk_size: usize) -> Self {
        self.bulk_size = bulk_size.max(1);
        self
    }

    pub fn index(&self) -> &I {
        &self.index
    }

    pub fn stats(&self) -> IndexStats {
        self.stats
    }

    pub fn into_inner(self) -> I {
        self.index
    }

    /// Create the index if needed; `true` when it was created now.
    pub fn ensure_index(&mut self) -> Result<bool, IndexError> {
        self.index.create_index_if_absent()
    }

    /// Drop and create the index.
    pub fn recreate(&mut self) -> Result<(), IndexError> {
        if self.index.delete_index()? {
            log::info!("dropped index {}", self.index.name());
        }
        self.index.create_index_if_absent()?;
        Ok(())
    }

    /// Index one batch.
    ///
    /// Non-indexable papers are dropped before submission. A failed chunk
    /// aborts the call; chunks already written stay written and are counted
    /// in the [`BatchFailure`] outcome.
    pub fn index_batch(&mut self, papers: &[Paper]) -> Result<BatchOutcome, BatchFailure> {
        let mut outcome = BatchOutcome::default();
        let indexable: Vec<Paper> = papers
            .iter()
            .filter(|p| {
                let keep = p.is_indexable();
                if !keep {
                    outcome.dropped += 1;
                }
                keep
            })
            .cloned()
            .collect();

        let mut failure = None;
        for chunk in indexable.chunks(self.bulk_size) {
            self.stats.requests += 1;
            match self.index.bulk_index(chunk) {
                Ok(accepted) => {
                    outcome.submitted += chunk.len();
                    outcome.accepted += accepted.min(chunk.len());
                }
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }
        self.stats.record(&outcome);

        if outcome.errors() > 0 {
            log::warn!(
                "{}: {} of {} documents rejected",
                self.index.name(),
                outcome.errors(),
                outcome.submitted
            );
        }
        match failure {
            None => Ok(outcome),
            Some(error) => Err(BatchFailure { outcome, error }),
        }
    }
}

impl<I: SearchIndex> PaperSink for BulkIndexer<I> {
    fn write_batch(&mut self, papers: Vec<Paper>) -> anyhow::Result<usize> {
        match self.index_batch(&papers) {
            Ok(outcome) => Ok(outcome.accepted),
            Err(BatchFailure { outcome, error }) => Err(PartialWrite {
                accepted: outcome.accepted,
                error: error.into(),
            }
            .into()),
        }
    }
}
