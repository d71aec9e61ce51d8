//! Enrichment job against an on-disk DuckDB store

use std::cell::RefCell;
use std::time::Duration;

use paperdex_core::{ApiError, Paper, PaperSink, ShutdownFlag, Source};
use paperdex_enrich::{
    CitationLookup, CitationStore, DuckDbStore, EnrichConfig, EnrichmentJob, RecordKey, SENTINEL,
};

/// Finds only the papers listed; records every id it was asked about.
struct Known {
    found: Vec<(&'static str, u32)>,
    asked: RefCell<Vec<String>>,
}

impl CitationLookup for Known {
    fn max_batch(&self) -> usize {
        2
    }

    fn lookup(&self, keys: &[RecordKey]) -> Result<Vec<Option<u32>>, ApiError> {
        self.asked
            .borrow_mut()
            .extend(keys.iter().map(|k| k.external_id.clone()));
        Ok(keys
            .iter()
            .map(|k| {
                self.found
                    .iter()
                    .find(|(id, _)| *id == k.external_id)
                    .map(|(_, n)| *n)
            })
            .collect())
    }
}

fn config() -> EnrichConfig {
    EnrichConfig {
        delay: Duration::ZERO,
        cooldown: Duration::ZERO,
        ..EnrichConfig::default()
    }
}

fn seed(store: &mut DuckDbStore) {
    store
        .write_batch(vec![
            Paper::new(Source::Arxiv, "1706.03762", "Attention"),
            Paper::new(Source::Arxiv, "0000.00001", "Unknown"),
            Paper::new(Source::Pubmed, "31452104", "Deep learning"),
            Paper {
                citation_count: 40,
                ..Paper::new(Source::Arxiv, "1810.04805", "BERT")
            },
        ])
        .unwrap();
}

#[test]
fn full_run_enriches_and_resets() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("papers.duckdb");
    let mut store = DuckDbStore::open(&path).unwrap();
    seed(&mut store);

    let lookup = Known {
        found: vec![("1706.03762", 90000), ("31452104", 0)],
        asked: RefCell::new(Vec::new()),
    };
    let summary = EnrichmentJob::new(config(), ShutdownFlag::new())
        .run(&mut store, &lookup)
        .unwrap();

    assert!(summary.is_complete());
    assert_eq!(summary.checked, 3);
    assert_eq!(summary.updated, 1);
    assert_eq!(summary.reset, 2);
    assert_eq!(lookup.asked.borrow().len(), 3);

    let count = |source, id| {
        store
            .citation_count(&RecordKey::new(source, id))
            .unwrap()
            .unwrap()
    };
    assert_eq!(count(Source::Arxiv, "1706.03762"), 90000);
    assert_eq!(count(Source::Arxiv, "0000.00001"), 0);
    assert_eq!(count(Source::Pubmed, "31452104"), 0);
    assert_eq!(count(Source::Arxiv, "1810.04805"), 40);
}

#[test]
fn interrupted_run_resumes_without_requerying() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("papers.duckdb");
    {
        let mut store = DuckDbStore::open(&path).unwrap();
        seed(&mut store);
        let lookup = Known {
            found: vec![],
            asked: RefCell::new(Vec::new()),
        };
        let job = EnrichmentJob::new(
            EnrichConfig {
                max_batches: Some(1),
                ..config()
            },
            ShutdownFlag::new(),
        );
        let summary = job.run(&mut store, &lookup).unwrap();
        assert!(!summary.is_complete());
        assert_eq!(summary.reset, 0);
    }

    // Reopen: the first batch is still marked and is not selected again
    let mut store = DuckDbStore::open(&path).unwrap();
    assert_eq!(store.count_unenriched().unwrap(), 1);
    let marked = store
        .select_unenriched(10)
        .unwrap()
        .into_iter()
        .map(|k| store.citation_count(&k).unwrap())
        .collect::<Vec<_>>();
    assert_eq!(marked, [Some(0)]);

    let lookup = Known {
        found: vec![],
        asked: RefCell::new(Vec::new()),
    };
    let summary = EnrichmentJob::new(config(), ShutdownFlag::new())
        .run(&mut store, &lookup)
        .unwrap();
    assert!(summary.is_complete());
    assert_eq!(lookup.asked.borrow().len(), 1);
    assert_eq!(summary.reset, 3);
    assert_eq!(store.count_unenriched().unwrap(), 3);
    assert_ne!(
        store
            .citation_count(&RecordKey::new(Source::Arxiv, "0000.00001"))
            .unwrap(),
        Some(SENTINEL)
    );
}
