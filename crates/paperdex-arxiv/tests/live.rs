//! Live tests against the arXiv export API
//!
//! These tests require network access and are marked #[ignore] by default.
//! Run with: cargo test -p paperdex-arxiv --test live -- --ignored

use paperdex_arxiv::{ArxivClient, ArxivConfig};
use paperdex_core::{PaperSource, Source};

#[test]
#[ignore]
fn search_returns_arxiv_papers() {
    let client = ArxivClient::new(ArxivConfig::default());
    let results = client.search("attention is all you need", 5, 0).unwrap();

    assert!(results.total > 0, "expected hits, got total 0");
    assert!(!results.papers.is_empty());
    for paper in &results.papers {
        assert_eq!(paper.source, Source::Arxiv);
        assert!(paper.is_indexable());
        assert!(paper.pdf_url.is_some());
    }
}

#[test]
#[ignore]
fn fetch_by_id_strips_version() {
    let client = ArxivClient::new(ArxivConfig::default());
    let paper = client
        .fetch_by_id("1706.03762v5")
        .unwrap()
        .expect("paper should exist");

    assert_eq!(paper.external_id, "1706.03762");
    assert!(paper.title.contains("Attention"));
    assert_eq!(paper.year, Some(2017));
}
