//! Canonical paper record shared by every source adapter

use chrono::NaiveDate;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

/// Length of the hex document id derived from `(source, external_id)`
const DOCUMENT_ID_LEN: usize = 32;

/// Where a record's identity comes from.
///
/// Any record with a resolved arXiv id is tagged `Arxiv`, whichever adapter
/// produced it, so the same paper collides on one document id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Arxiv,
    #[serde(rename = "semanticscholar")]
    SemanticScholar,
    Pubmed,
    #[serde(rename = "openalex")]
    OpenAlex,
}

impl Source {
    /// Stable lowercase tag (index field value and CLI name)
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Arxiv => "arxiv",
            Self::SemanticScholar => "semanticscholar",
            Self::Pubmed => "pubmed",
            Self::OpenAlex => "openalex",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        match s {
            "arxiv" => Some(Self::Arxiv),
            "semanticscholar" | "s2" => Some(Self::SemanticScholar),
            "pubmed" => Some(Self::Pubmed),
            "openalex" => Some(Self::OpenAlex),
            _ => None,
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affiliation: Option<String>,
}

impl Author {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            affiliation: None,
        }
    }

    pub fn with_affiliation(mut self, affiliation: Option<String>) -> Self {
        self.affiliation = affiliation.filter(|a| !a.trim().is_empty());
        self
    }
}

/// Unified paper representation moved through the whole pipeline.
///
/// Built once per source fetch and never mutated afterwards; citation
/// enrichment is a separate update keyed by `(source, external_id)`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Paper {
    pub external_id: String,
    pub source: Source,
    pub title: String,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub authors: Vec<Author>,
    pub published_date: Option<NaiveDate>,
    pub year: Option<i32>,
    pub pdf_url: Option<String>,
    pub primary_category: Option<String>,
    pub categories: Vec<String>,
    pub doi: Option<String>,
    pub journal: Option<String>,
    pub citation_count: u32,
    pub reference_count: u32,
    pub influential_citation_count: u32,
    pub is_open_access: bool,
    pub publication_types: Vec<String>,
    pub url: String,
}

impl Paper {
    /// Empty record for `(source, external_id)`; adapters fill the rest
    /// with struct update syntax.
    pub fn new(source: Source, external_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            external_id: external_id.into(),
            source,
            title: title.into(),
            abstract_text: String::new(),
            authors: Vec::new(),
            published_date: None,
            year: None,
            pdf_url: None,
            primary_category: None,
            categories: Vec::new(),
            doi: None,
            journal: None,
            citation_count: 0,
            reference_count: 0,
            influential_citation_count: 0,
            is_open_access: false,
            publication_types: Vec::new(),
            url: String::new(),
        }
    }

    /// Deterministic index document id.
    ///
    /// Repeated imports of the same paper overwrite instead of duplicating.
    pub fn document_id(&self) -> String {
        document_id(self.source, &self.external_id)
    }

    /// Records without a title or an external id never reach the index.
    pub fn is_indexable(&self) -> bool {
        !self.title.trim().is_empty() && !self.external_id.trim().is_empty()
    }
}

/// Document id for `(source, external_id)`: truncated blake3 hex digest.
pub fn document_id(source: Source, external_id: &str) -> String {
    let key = format!("{}:{}", source.as_str(), external_id);
    blake3::hash(key.as_bytes()).to_hex()[..DOCUMENT_ID_LEN].to_string()
}

/// Deduplicate while preserving first-seen order, dropping blank entries.
pub fn dedup_ordered<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut seen = FxHashSet::default();
    let mut out = Vec::new();
    for item in items {
        let item: String = item.into();
        let trimmed = item.trim();
        if trimmed.is_empty() || seen.contains(trimmed) {
            continue;
        }
        seen.insert(trimmed.to_string());
        out.push(trimmed.to_string());
    }
    out
}

/// Parse an ISO `YYYY-MM-DD` prefix (timestamps are truncated to the date).
pub fn parse_iso_date(s: &str) -> Option<NaiveDate> {
    let date = s.trim().get(..10)?;
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}
