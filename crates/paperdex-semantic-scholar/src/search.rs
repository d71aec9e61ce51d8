//! Graph API search adapter

use paperdex_core::stream::{http_client, send};
use paperdex_core::{ApiError, Paper, PaperSource, SearchResults, Throttle, normalize_arxiv_id};
use serde::Deserialize;

use crate::config::S2Config;
use crate::transform::{GRAPH_FIELDS, GraphPaper};

/// Ordering for `search`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortMode {
    #[default]
    Relevance,
    CitationCount,
    PublicationDate,
}

impl SortMode {
    pub fn from_name(s: &str) -> Option<Self> {
        match s {
            "relevance" => Some(Self::Relevance),
            "citations" | "citationCount" => Some(Self::CitationCount),
            "date" | "publicationDate" => Some(Self::PublicationDate),
            _ => None,
        }
    }

    /// `sort` parameter of the bulk search endpoint
    fn bulk_sort(self) -> Option<&'static str> {
        match self {
            Self::Relevance => None,
            Self::CitationCount => Some("citationCount:desc"),
            Self::PublicationDate => Some("publicationDate:desc"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    total: u64,
    #[serde(default)]
    data: Vec<GraphPaper>,
}

/// Relevance / sorted search and single-paper lookup.
pub struct S2Client {
    config: S2Config,
    sort: SortMode,
    throttle: Throttle,
}

impl S2Client {
    pub fn new(config: S2Config) -> Self {
        Self {
            throttle: Throttle::new(config.delay),
            config,
            sort: SortMode::Relevance,
        }
    }

    pub fn with_sort(mut self, sort: SortMode) -> Self {
        self.sort = sort;
        self
    }

    fn get(&self, url: &str, params: &[(&str, String)]) -> Result<Option<String>, ApiError> {
        self.config
            .retry
            .run("semanticscholar", |_| {
                self.throttle.wait();
                let response =
                    send(self.config.authorize(http_client().get(url).query(params)))?;
                if response.status == 404 {
                    return Ok(None);
                }
                response.into_success().map(Some)
            })
            .map_err(|e| e.last)
    }

    fn request(
        &self,
        query: &str,
        limit: usize,
        offset: usize,
    ) -> (String, Vec<(&'static str, String)>) {
        let mut params = vec![
            ("query", query.trim().to_string()),
            ("fields", GRAPH_FIELDS.to_string()),
        ];
        match self.sort.bulk_sort() {
            None => {
                params.push(("offset", offset.to_string()));
                params.push(("limit", limit.to_string()));
                (self.config.graph("paper/search"), params)
            }
            Some(sort) => {
                params.push(("sort", sort.to_string()));
                (self.config.graph("paper/search/bulk"), params)
            }
        }
    }
}

/// `ARXIV:` prefix for bare arXiv ids; other S2 id forms pass through
fn lookup_id(raw: &str) -> String {
    let raw = raw.trim();
    if raw.contains(':') && !raw.to_ascii_lowercase().starts_with("arxiv:") {
        return raw.to_string();
    }
    match normalize_arxiv_id(raw) {
        Some(id) => format!("ARXIV:{id}"),
        None => raw.to_string(),
    }
}

fn parse_search(body: &str, limit: usize) -> Result<SearchResults, ApiError> {
    let response: SearchResponse = serde_json::from_str(body).map_err(ApiError::decode)?;
    let papers = response
        .data
        .into_iter()
        .take(limit)
        .filter_map(GraphPaper::into_paper)
        .collect();
    Ok(SearchResults {
        papers,
        total: response.total,
    })
}

impl PaperSource for S2Client {
    fn name(&self) -> &'static str {
        "semanticscholar"
    }

    /// Sorted modes return the first page only; `offset` is ignored there.
    fn search(&self, query: &str, limit: usize, offset: usize) -> Result<SearchResults, ApiError> {
        if self.sort != SortMode::Relevance && offset > 0 {
            log::warn!("semanticscholar: offset is ignored for {:?} sort", self.sort);
        }
        let (url, params) = self.request(query, limit, offset);
        let body = self.get(&url, &params)?.unwrap_or_default();
        if body.is_empty() {
            return Ok(SearchResults::default());
        }
        let results = parse_search(&body, limit)?;
        log::debug!(
            "semanticscholar: '{query}' -> {} of {}",
            results.papers.len(),
            results.total
        );
        Ok(results)
    }

    fn fetch_by_id(&self, id: &str) -> Result<Option<Paper>, ApiError> {
        let url = self.config.graph(&format!("paper/{}", lookup_id(id)));
        let Some(body) = self.get(&url, &[("fields", GRAPH_FIELDS.to_string())])? else {
            return Ok(None);
        };
        let paper: GraphPaper = serde_json::from_str(&body).map_err(ApiError::decode)?;
        Ok(paper.into_paper())
    }
}
