//! Batch paper lookup (`POST /paper/batch`) for citation counts

use paperdex_core::stream::{http_client, send_text};
use paperdex_core::{ApiError, Source, Throttle};
use serde::{Deserialize, Serialize};

use crate::config::S2Config;

/// Upper bound on ids per batch request
pub const MAX_BATCH_IDS: usize = 500;

const BATCH_FIELDS: &str = "citationCount,influentialCitationCount";

#[derive(Debug, Serialize)]
struct BatchRequest<'a> {
    ids: &'a [String],
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CitationCounts {
    #[serde(default)]
    pub citation_count: Option<u32>,
    #[serde(default)]
    pub influential_citation_count: Option<u32>,
}

/// S2 lookup id for a stored `(source, external_id)`
pub fn s2_lookup_id(source: Source, external_id: &str) -> String {
    let id = external_id.trim();
    match source {
        Source::Arxiv => format!("ARXIV:{id}"),
        Source::Pubmed => format!("PMID:{id}"),
        Source::OpenAlex => id.to_string(),
        Source::SemanticScholar => {
            if id.bytes().all(|b| b.is_ascii_digit()) {
                format!("CorpusId:{id}")
            } else if id.starts_with("10.") {
                format!("DOI:{id}")
            } else {
                id.to_string()
            }
        }
    }
}

/// Batch citation lookups against the Graph API.
pub struct CitationClient {
    config: S2Config,
    throttle: Throttle,
}

impl CitationClient {
    pub fn new(config: S2Config) -> Self {
        Self {
            throttle: Throttle::new(config.delay),
            config,
        }
    }

    /// One request per call; results align with `ids` (`None` = not found).
    ///
    /// A single attempt: the enrichment job owns retry and cooldown.
    pub fn batch(&self, ids: &[String]) -> Result<Vec<Option<CitationCounts>>, ApiError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        if ids.len() > MAX_BATCH_IDS {
            return Err(ApiError::Http {
                status: None,
                message: format!("batch of {} exceeds {MAX_BATCH_IDS} ids", ids.len()),
            });
        }
        let body = serde_json::to_string(&BatchRequest { ids }).map_err(ApiError::decode)?;

        self.throttle.wait();
        let request = http_client()
            .post(self.config.graph("paper/batch"))
            .query(&[("fields", BATCH_FIELDS)])
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body);
        let text = send_text(self.config.authorize(request))?;
        parse_batch(&text, ids.len())
    }
}

fn parse_batch(body: &str, expected: usize) -> Result<Vec<Option<CitationCounts>>, ApiError> {
    let results: Vec<Option<CitationCounts>> =
        serde_json::from_str(body).map_err(ApiError::decode)?;
    if results.len() != expected {
        return Err(ApiError::decode(format!(
            "batch returned {} results for {expected} ids",
            results.len()
        )));
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_id_prefix_by_source() {
        assert_eq!(s2_lookup_id(Source::Arxiv, "1706.03762"), "ARXIV:1706.03762");
        assert_eq!(s2_lookup_id(Source::Pubmed, "31452104"), "PMID:31452104");
        assert_eq!(s2_lookup_id(Source::SemanticScholar, "13756489"), "CorpusId:13756489");
        assert_eq!(s2_lookup_id(Source::SemanticScholar, "10.1/abc"), "DOI:10.1/abc");
    }

    #[test]
    fn batch_results_align_with_ids() {
        let body = r#"[{"paperId":"a","citationCount":12,"influentialCitationCount":1},null,{"paperId":"c","citationCount":0}]"#;
        let results = parse_batch(body, 3).unwrap();
        assert_eq!(results[0].unwrap().citation_count, Some(12));
        assert_eq!(results[1], None);
        assert_eq!(results[2].unwrap().citation_count, Some(0));
    }

    #[test]
    fn batch_length_mismatch_is_error() {
        assert!(parse_batch("[null]", 2).is_err());
    }

    #[test]
    fn oversized_batch_rejected_before_request() {
        let client = CitationClient::new(S2Config::default());
        let ids: Vec<String> = (0..=MAX_BATCH_IDS).map(|i| i.to_string()).collect();
        assert!(client.batch(&ids).is_err());
    }

    #[test]
    fn request_body_shape() {
        let ids = vec!["ARXIV:1706.03762".to_string()];
        let json = serde_json::to_string(&BatchRequest { ids: &ids }).unwrap();
        assert_eq!(json, r#"{"ids":["ARXIV:1706.03762"]}"#);
    }
}
