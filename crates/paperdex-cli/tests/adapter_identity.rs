//! One arXiv paper seen through every adapter collapses to one document

use paperdex_core::{Paper, PaperSink, Source};
use paperdex_index::{BulkIndexer, MemoryIndex};
use paperdex_openalex::{WorkRow, work_to_paper};
use paperdex_pubmed::{PubmedArticle, article_to_paper};
use paperdex_semantic_scholar::{GraphPaper, PaperRow};
use serde_json::json;

fn feed_paper(versioned_id: &str) -> Paper {
    let xml = format!(
        r#"<feed xmlns="http://www.w3.org/2005/Atom" xmlns:opensearch="http://a9.com/-/spec/opensearch/1.1/">
<opensearch:totalResults>1</opensearch:totalResults>
<entry>
  <id>http://arxiv.org/abs/{versioned_id}</id>
  <published>2017-06-12T17:57:34Z</published>
  <title>From the feed</title>
  <summary>s</summary>
</entry>
</feed>"#
    );
    let feed = paperdex_arxiv::parse_feed(&xml).unwrap();
    feed.entries.into_iter().next().unwrap().into_paper().unwrap()
}

fn dataset_paper(arxiv_id: &str) -> Paper {
    let row: PaperRow = serde_json::from_value(json!({
        "corpusid": 13756489,
        "externalids": {"ArXiv": arxiv_id, "CorpusId": "13756489"},
        "title": "From the dataset",
        "url": "https://www.semanticscholar.org/paper/204e3073870fae3d05bcbc2f6a8e263d9b72e776",
    }))
    .unwrap();
    row.into_paper().unwrap()
}

fn graph_paper(arxiv_id: &str) -> Paper {
    let paper: GraphPaper = serde_json::from_value(json!({
        "paperId": "204e3073870fae3d05bcbc2f6a8e263d9b72e776",
        "externalIds": {"ArXiv": arxiv_id, "DOI": "10.5555/3295222.3295349"},
        "title": "From the graph API",
    }))
    .unwrap();
    paper.into_paper().unwrap()
}

/// Work whose only arXiv signal is a location URL
fn work_by_location(versioned_id: &str) -> Paper {
    let row: WorkRow = serde_json::from_value(json!({
        "id": "https://openalex.org/W2963403868",
        "title": "From an OpenAlex location",
        "primary_location": {"landing_page_url": format!("https://arxiv.org/abs/{versioned_id}")},
    }))
    .unwrap();
    work_to_paper(row, false).unwrap()
}

/// Work whose only arXiv signal is the DataCite DOI
fn work_by_doi(arxiv_id: &str) -> Paper {
    let row: WorkRow = serde_json::from_value(json!({
        "id": "https://openalex.org/W4385245566",
        "doi": format!("https://doi.org/10.48550/arxiv.{arxiv_id}"),
        "title": "From an OpenAlex DOI",
    }))
    .unwrap();
    work_to_paper(row, false).unwrap()
}

fn pubmed_paper(arxiv_id: &str) -> Paper {
    let article = PubmedArticle {
        pmid: "30000001".into(),
        doi: Some(format!("10.48550/arXiv.{arxiv_id}")),
        title: Some("From PubMed".into()),
        ..Default::default()
    };
    article_to_paper(article).unwrap()
}

fn all_adapters(arxiv_id: &str, versioned_id: &str) -> Vec<Paper> {
    vec![
        feed_paper(versioned_id),
        dataset_paper(arxiv_id),
        graph_paper(arxiv_id),
        work_by_location(versioned_id),
        work_by_doi(arxiv_id),
        pubmed_paper(arxiv_id),
    ]
}

fn assert_single_document(arxiv_id: &str, versioned_id: &str) {
    let papers = all_adapters(arxiv_id, versioned_id);
    let expected = paperdex_core::document_id(Source::Arxiv, arxiv_id);
    for paper in &papers {
        assert_eq!(paper.source, Source::Arxiv, "{}", paper.title);
        assert_eq!(paper.external_id, arxiv_id, "{}", paper.title);
        assert_eq!(paper.document_id(), expected, "{}", paper.title);
    }

    let mut indexer = BulkIndexer::new(MemoryIndex::new("papers"));
    indexer.ensure_index().unwrap();
    for paper in papers {
        assert_eq!(indexer.write_batch(vec![paper]).unwrap(), 1);
    }
    assert_eq!(indexer.index().len(), 1);
    assert_eq!(indexer.index().external_ids(), [arxiv_id]);
    // Last write wins
    assert_eq!(
        indexer.index().get(&expected).map(|p| p.title.as_str()),
        Some("From PubMed")
    );
}

#[test]
fn new_style_id_collapses_across_adapters() {
    assert_single_document("1706.03762", "1706.03762v7");
}

#[test]
fn old_style_id_collapses_across_adapters() {
    assert_single_document("hep-ph/9901234", "hep-ph/9901234v2");
}

#[test]
fn non_arxiv_records_keep_native_sources() {
    let row: WorkRow = serde_json::from_value(json!({
        "id": "https://openalex.org/W2100837269",
        "doi": "https://doi.org/10.1038/nature14539",
        "title": "Deep learning",
    }))
    .unwrap();
    let work = work_to_paper(row, true).unwrap();
    assert_eq!((work.source, work.external_id.as_str()), (Source::OpenAlex, "W2100837269"));

    let article = PubmedArticle {
        pmid: "26017442".into(),
        doi: Some("10.1038/nature14539".into()),
        title: Some("Deep learning".into()),
        ..Default::default()
    };
    let pubmed = article_to_paper(article).unwrap();
    assert_eq!((pubmed.source, pubmed.external_id.as_str()), (Source::Pubmed, "26017442"));

    assert_ne!(work.document_id(), pubmed.document_id());
}
