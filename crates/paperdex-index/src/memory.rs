//! In-process index backend

use paperdex_core::Paper;
use rustc_hash::FxHashMap;

use crate::backend::SearchIndex;
use crate::error::IndexError;

type RejectFn = Box<dyn Fn(&Paper) -> bool + Send>;

/// Map-backed index keyed by document id.
///
/// Used for dry runs and tests. An optional rejection predicate simulates
/// per-document mapping failures; `failing_after` simulates an outage.
pub struct MemoryIndex {
    name: String,
    exists: bool,
    docs: FxHashMap<String, Paper>,
    reject: Option<RejectFn>,
    /// Bulk requests served before every later one fails
    healthy_requests: Option<usize>,
    requests: usize,
}

impl MemoryIndex {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            exists: false,
            docs: FxHashMap::default(),
            reject: None,
            healthy_requests: None,
            requests: 0,
        }
    }

    /// Reject every document the predicate matches.
    pub fn with_rejection(mut self, reject: impl Fn(&Paper) -> bool + Send + 'static) -> Self {
        self.reject = Some(Box::new(reject));
        self
    }

    /// Fail every bulk request after the first `n`.
    pub fn failing_after(mut self, n: usize) -> Self {
        self.healthy_requests = Some(n);
        self
    }

    pub fn get(&self, document_id: &str) -> Option<&Paper> {
        self.docs.get(document_id)
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn papers(&self) -> impl Iterator<Item = &Paper> {
        self.docs.values()
    }

    /// External ids in sorted order
    pub fn external_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.docs.values().map(|p| p.external_id.clone()).collect();
        ids.sort();
        ids
    }
}

impl SearchIndex for MemoryIndex {
    fn name(&self) -> &str {
        &self.name
    }

    fn create_index_if_absent(&mut self) -> Result<bool, IndexError> {
        let created = !self.exists;
        self.exists = true;
        Ok(created)
    }

    fn delete_index(&mut self) -> Result<bool, IndexError> {
        let existed = self.exists;
        self.exists = false;
        self.docs.clear();
        Ok(existed)
    }

    fn document_count(&self) -> Result<u64, IndexError> {
        Ok(self.docs.len() as u64)
    }

    fn bulk_index(&mut self, papers: &[Paper]) -> Result<usize, IndexError> {
        if !self.exists {
            return Err(IndexError::MissingIndex(self.name.clone()));
        }
        self.requests += 1;
        if self.healthy_requests.is_some_and(|n| self.requests > n) {
            return Err(IndexError::Response("bulk request refused".into()));
        }
        let mut accepted = 0;
        for paper in papers {
            if self.reject.as_ref().is_some_and(|reject| reject(paper)) {
                continue;
            }
            self.docs.insert(paper.document_id(), paper.clone());
            accepted += 1;
        }
        Ok(accepted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use paperdex_core::Source;

    #[test]
    fn create_is_idempotent() {
        let mut index = MemoryIndex::new("papers");
        assert!(index.create_index_if_absent().unwrap());
        assert!(!index.create_index_if_absent().unwrap());
    }

    #[test]
    fn delete_absent_is_success() {
        let mut index = MemoryIndex::new("papers");
        assert!(!index.delete_index().unwrap());
        index.create_index_if_absent().unwrap();
        assert!(index.delete_index().unwrap());
        assert_eq!(index.document_count().unwrap(), 0);
    }

    #[test]
    fn write_requires_index() {
        let mut index = MemoryIndex::new("papers");
        let err = index
            .bulk_index(&[Paper::new(Source::Arxiv, "1706.03762", "t")])
            .unwrap_err();
        assert!(matches!(err, IndexError::MissingIndex(_)));
    }

    #[test]
    fn same_paper_overwrites() {
        let mut index = MemoryIndex::new("papers");
        index.create_index_if_absent().unwrap();
        let paper = Paper::new(Source::Arxiv, "1706.03762", "t");
        index.bulk_index(&[paper.clone()]).unwrap();
        index.bulk_index(&[paper]).unwrap();
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn rejection_lowers_accepted() {
        let mut index =
            MemoryIndex::new("papers").with_rejection(|p| p.external_id.ends_with('2'));
        index.create_index_if_absent().unwrap();
        let papers: Vec<Paper> = (0..4)
            .map(|i| Paper::new(Source::Arxiv, format!("2401.0000{i}"), "t"))
            .collect();
        assert_eq!(index.bulk_index(&papers).unwrap(), 3);
        assert_eq!(
            index.external_ids(),
            vec!["2401.00000", "2401.00001", "2401.00003"]
        );
    }
}
