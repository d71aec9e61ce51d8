//! arXiv export API client

use std::time::Duration;

use paperdex_core::stream::{http_client, send_text};
use paperdex_core::{
    ApiError, Paper, PaperSource, RetryPolicy, SearchResults, Throttle, arxiv_id_from_url,
    normalize_arxiv_id,
};

use crate::feed::{Feed, parse_feed};

pub const DEFAULT_BASE_URL: &str = "https://export.arxiv.org/api/query";

/// arXiv asks for no more than one request every three seconds
pub const DEFAULT_DELAY: Duration = Duration::from_secs(3);

#[derive(Debug, Clone)]
pub struct ArxivConfig {
    pub base_url: String,
    /// Minimum spacing between requests from one client
    pub delay: Duration,
    pub retry: RetryPolicy,
}

impl Default for ArxivConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            delay: DEFAULT_DELAY,
            retry: RetryPolicy::api_default(),
        }
    }
}

/// Feed adapter over the Atom query endpoint.
pub struct ArxivClient {
    config: ArxivConfig,
    throttle: Throttle,
}

/// Query parameters for a keyword search
fn search_params(query: &str, limit: usize, offset: usize) -> Vec<(&'static str, String)> {
    vec![
        ("search_query", format!("all:{}", query.trim())),
        ("start", offset.to_string()),
        ("max_results", limit.to_string()),
        ("sortBy", "relevance".to_string()),
        ("sortOrder", "descending".to_string()),
    ]
}

/// Accepts bare ids, `arXiv:` prefixed ids and abs/pdf URLs
fn lookup_id(raw: &str) -> String {
    normalize_arxiv_id(raw)
        .or_else(|| arxiv_id_from_url(raw))
        .unwrap_or_else(|| raw.trim().to_string())
}

impl ArxivClient {
    pub fn new(config: ArxivConfig) -> Self {
        Self {
            throttle: Throttle::new(config.delay),
            config,
        }
    }

    fn query(&self, params: &[(&str, String)]) -> Result<Feed, ApiError> {
        self.config
            .retry
            .run("arxiv", |_| {
                self.throttle.wait();
                let body = send_text(http_client().get(&self.config.base_url).query(params))?;
                parse_feed(&body).map_err(|e| ApiError::decode(format!("{e:#}")))
            })
            .map_err(|e| e.last)
    }
}

impl PaperSource for ArxivClient {
    fn name(&self) -> &'static str {
        "arxiv"
    }

    fn search(&self, query: &str, limit: usize, offset: usize) -> Result<SearchResults, ApiError> {
        let feed = self.query(&search_params(query, limit, offset))?;
        let total = feed.total_results;
        let papers: Vec<Paper> = feed
            .entries
            .into_iter()
            .filter_map(|entry| entry.into_paper())
            .collect();
        log::debug!("arxiv: '{query}' -> {} of {total}", papers.len());
        Ok(SearchResults { papers, total })
    }

    fn fetch_by_id(&self, id: &str) -> Result<Option<Paper>, ApiError> {
        let params = [
            ("id_list", lookup_id(id)),
            ("max_results", "1".to_string()),
        ];
        let feed = self.query(&params)?;
        Ok(feed
            .entries
            .into_iter()
            .find_map(|entry| entry.into_paper()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_params_use_all_field() {
        let params = search_params("  graph neural networks ", 25, 50);
        assert_eq!(params[0], ("search_query", "all:graph neural networks".to_string()));
        assert_eq!(params[1], ("start", "50".to_string()));
        assert_eq!(params[2], ("max_results", "25".to_string()));
    }

    #[test]
    fn lookup_id_accepts_common_spellings() {
        assert_eq!(lookup_id("arXiv:1706.03762v7"), "1706.03762");
        assert_eq!(lookup_id("https://arxiv.org/abs/1706.03762"), "1706.03762");
        assert_eq!(lookup_id("hep-ph/9901234"), "hep-ph/9901234");
    }

    #[test]
    fn client_uses_configured_delay() {
        let client = ArxivClient::new(ArxivConfig {
            delay: Duration::from_millis(50),
            ..ArxivConfig::default()
        });
        assert_eq!(client.throttle.delay(), Duration::from_millis(50));
    }
}
