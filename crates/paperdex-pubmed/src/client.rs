//! E-utilities client: esearch (JSON) then efetch (XML)

use std::time::Duration;

use paperdex_core::stream::{http_client, send_json, send_text};
use paperdex_core::{ApiError, Paper, PaperSource, RetryPolicy, SearchResults, Throttle};
use serde::Deserialize;

use crate::parser::parse_pubmed_xml;
use crate::transform::article_to_paper;

pub const DEFAULT_BASE_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";

/// NCBI allows 10 requests/second with an API key
pub const DELAY_WITH_KEY: Duration = Duration::from_millis(100);
/// and 3 requests/second without one
pub const DELAY_WITHOUT_KEY: Duration = Duration::from_millis(334);

#[derive(Debug, Clone)]
pub struct PubmedConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    /// Override for the key-dependent politeness delay
    pub delay: Option<Duration>,
    pub retry: RetryPolicy,
}

impl Default for PubmedConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            delay: None,
            retry: RetryPolicy::api_default(),
        }
    }
}

impl PubmedConfig {
    pub fn effective_delay(&self) -> Duration {
        self.delay.unwrap_or(if self.api_key.is_some() {
            DELAY_WITH_KEY
        } else {
            DELAY_WITHOUT_KEY
        })
    }
}

#[derive(Debug, Deserialize)]
struct EsearchResponse {
    esearchresult: EsearchResult,
}

#[derive(Debug, Deserialize)]
struct EsearchResult {
    #[serde(default)]
    count: String,
    #[serde(default)]
    idlist: Vec<String>,
}

/// Two-step registry adapter.
pub struct PubmedClient {
    config: PubmedConfig,
    throttle: Throttle,
}

impl PubmedClient {
    pub fn new(config: PubmedConfig) -> Self {
        Self {
            throttle: Throttle::new(config.effective_delay()),
            config,
        }
    }

    fn endpoint(&self, name: &str) -> String {
        format!("{}/{name}", self.config.base_url.trim_end_matches('/'))
    }

    fn with_key(&self, mut params: Vec<(&'static str, String)>) -> Vec<(&'static str, String)> {
        if let Some(key) = &self.config.api_key {
            params.push(("api_key", key.clone()));
        }
        params
    }

    /// Step one: query -> (total hits, PMIDs of this page)
    pub fn esearch(
        &self,
        query: &str,
        limit: usize,
        offset: usize,
    ) -> Result<(u64, Vec<String>), ApiError> {
        let params = self.with_key(esearch_params(query, limit, offset));
        let url = self.endpoint("esearch.fcgi");
        let response: EsearchResponse = self
            .config
            .retry
            .run("pubmed esearch", |_| {
                self.throttle.wait();
                send_json(http_client().get(&url).query(&params))
            })
            .map_err(|e| e.last)?;

        let total = response.esearchresult.count.trim().parse().unwrap_or(0);
        Ok((total, response.esearchresult.idlist))
    }

    /// Step two: one batched efetch for every PMID
    pub fn efetch(&self, pmids: &[String]) -> Result<Vec<Paper>, ApiError> {
        if pmids.is_empty() {
            return Ok(Vec::new());
        }
        let params = self.with_key(efetch_params(pmids));
        let url = self.endpoint("efetch.fcgi");
        let body = self
            .config
            .retry
            .run("pubmed efetch", |_| {
                self.throttle.wait();
                send_text(http_client().get(&url).query(&params))
            })
            .map_err(|e| e.last)?;

        let articles = parse_pubmed_xml(&body).map_err(|e| ApiError::decode(format!("{e:#}")))?;
        Ok(articles.into_iter().filter_map(article_to_paper).collect())
    }
}

fn esearch_params(query: &str, limit: usize, offset: usize) -> Vec<(&'static str, String)> {
    vec![
        ("db", "pubmed".to_string()),
        ("retmode", "json".to_string()),
        ("term", query.trim().to_string()),
        ("retmax", limit.to_string()),
        ("retstart", offset.to_string()),
    ]
}

fn efetch_params(pmids: &[String]) -> Vec<(&'static str, String)> {
    vec![
        ("db", "pubmed".to_string()),
        ("retmode", "xml".to_string()),
        ("id", pmids.join(",")),
    ]
}

impl PaperSource for PubmedClient {
    fn name(&self) -> &'static str {
        "pubmed"
    }

    fn search(&self, query: &str, limit: usize, offset: usize) -> Result<SearchResults, ApiError> {
        let (total, pmids) = self.esearch(query, limit, offset)?;
        let papers = self.efetch(&pmids)?;
        log::debug!(
            "pubmed: '{query}' -> {} pmids, {} papers of {total}",
            pmids.len(),
            papers.len()
        );
        Ok(SearchResults { papers, total })
    }

    fn fetch_by_id(&self, id: &str) -> Result<Option<Paper>, ApiError> {
        let pmid = id.trim().trim_start_matches("PMID:").trim();
        if pmid.is_empty() {
            return Ok(None);
        }
        Ok(self.efetch(&[pmid.to_string()])?.into_iter().next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn efetch_joins_ids_into_one_request() {
        let params = efetch_params(&["1".into(), "22".into(), "333".into()]);
        assert!(params.contains(&("id", "1,22,333".to_string())));
        assert!(params.contains(&("retmode", "xml".to_string())));
    }

    #[test]
    fn esearch_paging_params() {
        let params = esearch_params(" crispr ", 20, 40);
        assert!(params.contains(&("term", "crispr".to_string())));
        assert!(params.contains(&("retmax", "20".to_string())));
        assert!(params.contains(&("retstart", "40".to_string())));
    }

    #[test]
    fn api_key_shortens_delay() {
        let mut config = PubmedConfig::default();
        assert_eq!(config.effective_delay(), DELAY_WITHOUT_KEY);
        config.api_key = Some("k".into());
        assert_eq!(config.effective_delay(), DELAY_WITH_KEY);
        config.delay = Some(Duration::ZERO);
        assert_eq!(config.effective_delay(), Duration::ZERO);
    }

    #[test]
    fn api_key_appended_to_params() {
        let client = PubmedClient::new(PubmedConfig {
            api_key: Some("secret".into()),
            ..PubmedConfig::default()
        });
        let params = client.with_key(efetch_params(&["1".into()]));
        assert_eq!(params.last(), Some(&("api_key", "secret".to_string())));
    }

    #[test]
    fn esearch_response_shape() {
        let json = r#"{"header":{"type":"esearch"},"esearchresult":{"count":"1234","retmax":"2","idlist":["39000001","39000002"]}}"#;
        let r: EsearchResponse = serde_json::from_str(json).unwrap();
        assert_eq!(r.esearchresult.count, "1234");
        assert_eq!(r.esearchresult.idlist.len(), 2);
    }

    #[test]
    fn empty_pmid_list_skips_request() {
        let client = PubmedClient::new(PubmedConfig::default());
        assert!(client.efetch(&[]).unwrap().is_empty());
    }
}
