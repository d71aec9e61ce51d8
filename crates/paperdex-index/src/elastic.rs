//! Elasticsearch / OpenSearch HTTP backend

use paperdex_core::stream::{RawResponse, http_client, send};
use paperdex_core::{ApiError, Paper, RetryPolicy};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::backend::SearchIndex;
use crate::error::IndexError;

#[derive(Debug, Clone)]
pub struct ElasticConfig {
    /// Cluster base URL, e.g. `http://localhost:9200`
    pub url: String,
    pub index: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Sent as `Authorization: ApiKey ...`; takes precedence over basic auth
    pub api_key: Option<String>,
    pub retry: RetryPolicy,
}

impl Default for ElasticConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:9200".to_string(),
            index: "papers".to_string(),
            username: None,
            password: None,
            api_key: None,
            retry: RetryPolicy::api_default(),
        }
    }
}

/// Field mapping for paper documents
pub fn index_mapping() -> serde_json::Value {
    json!({
        "mappings": {
            "properties": {
                "external_id": { "type": "keyword" },
                "source": { "type": "keyword" },
                "title": { "type": "text" },
                "abstract": { "type": "text" },
                "authors": {
                    "properties": {
                        "name": { "type": "text", "fields": { "raw": { "type": "keyword" } } },
                        "affiliation": { "type": "text" }
                    }
                },
                "published_date": { "type": "date", "format": "yyyy-MM-dd" },
                "year": { "type": "integer" },
                "pdf_url": { "type": "keyword", "index": false },
                "primary_category": { "type": "keyword" },
                "categories": { "type": "keyword" },
                "doi": { "type": "keyword" },
                "journal": { "type": "text", "fields": { "raw": { "type": "keyword" } } },
                "citation_count": { "type": "integer" },
                "reference_count": { "type": "integer" },
                "influential_citation_count": { "type": "integer" },
                "is_open_access": { "type": "boolean" },
                "publication_types": { "type": "keyword" },
                "url": { "type": "keyword", "index": false }
            }
        }
    })
}

#[derive(Serialize)]
struct BulkAction<'a> {
    index: BulkTarget<'a>,
}

#[derive(Serialize)]
struct BulkTarget<'a> {
    #[serde(rename = "_index")]
    index: &'a str,
    #[serde(rename = "_id")]
    id: String,
}

#[derive(Debug, Deserialize)]
struct BulkResponse {
    #[serde(default)]
    errors: bool,
    #[serde(default)]
    items: Vec<BulkItem>,
}

#[derive(Debug, Deserialize)]
struct BulkItem {
    #[serde(alias = "create", alias = "update")]
    index: Option<BulkItemResult>,
}

#[derive(Debug, Deserialize)]
struct BulkItemResult {
    #[serde(rename = "_id", default)]
    id: Option<String>,
    #[serde(default)]
    status: u16,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct CountResponse {
    count: u64,
}

/// `_bulk` NDJSON body: one action line and one document line per paper.
pub fn bulk_body(index: &str, papers: &[Paper]) -> Result<String, IndexError> {
    let mut body = String::with_capacity(papers.len() * 1024);
    for paper in papers {
        let action = BulkAction {
            index: BulkTarget {
                index,
                id: paper.document_id(),
            },
        };
        let action =
            serde_json::to_string(&action).map_err(|e| IndexError::Response(e.to_string()))?;
        let doc =
            serde_json::to_string(paper).map_err(|e| IndexError::Response(e.to_string()))?;
        body.push_str(&action);
        body.push('\n');
        body.push_str(&doc);
        body.push('\n');
    }
    Ok(body)
}

/// Accepted item count from a `_bulk` response body
fn count_accepted(body: &str, submitted: usize) -> Result<usize, IndexError> {
    let response: BulkResponse =
        serde_json::from_str(body).map_err(|e| IndexError::Response(format!("bulk: {e}")))?;
    if response.items.len() != submitted {
        return Err(IndexError::Response(format!(
            "bulk: {} items for {submitted} documents",
            response.items.len()
        )));
    }
    let mut accepted = 0;
    let mut first_error = None;
    for item in response.items.iter().filter_map(|i| i.index.as_ref()) {
        if (200..300).contains(&item.status) && item.error.is_none() {
            accepted += 1;
        } else if first_error.is_none() {
            first_error = Some(item);
        }
    }
    if response.errors {
        if let Some(item) = first_error {
            log::warn!(
                "bulk: {} of {submitted} rejected, first: {} ({}) {}",
                submitted - accepted,
                item.id.as_deref().unwrap_or("?"),
                item.status,
                item.error.as_ref().map(|e| e.to_string()).unwrap_or_default()
            );
        }
    }
    Ok(accepted)
}

pub struct ElasticIndex {
    config: ElasticConfig,
}

impl ElasticIndex {
    pub fn new(config: ElasticConfig) -> Self {
        Self { config }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.url.trim_end_matches('/'), path)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(key) = &self.config.api_key {
            return request.header(reqwest::header::AUTHORIZATION, format!("ApiKey {key}"));
        }
        match &self.config.username {
            Some(user) => request.basic_auth(user, self.config.password.as_deref()),
            None => request,
        }
    }

    /// Send with retry; non-2xx statuses are returned to the caller as-is.
    fn call(
        &self,
        label: &str,
        build: impl Fn() -> reqwest::RequestBuilder,
    ) -> Result<RawResponse, IndexError> {
        self.config
            .retry
            .run(label, |_| {
                let response = send(self.authorize(build()))?;
                if response.status == 429 {
                    return Err(ApiError::RateLimited {
                        retry_after: response.retry_after,
                    });
                }
                if response.status >= 500 {
                    return Err(ApiError::Http {
                        status: Some(response.status),
                        message: response.body,
                    });
                }
                Ok(response)
            })
            .map_err(|e| IndexError::Api(e.last))
    }

    pub fn exists(&self) -> Result<bool, IndexError> {
        let url = self.url(&self.config.index);
        let response = self.call("index exists", || http_client().head(&url))?;
        match response.status {
            200 => Ok(true),
            404 => Ok(false),
            status => Err(IndexError::Response(format!("HEAD returned {status}"))),
        }
    }
}

impl SearchIndex for ElasticIndex {
    fn name(&self) -> &str {
        &self.config.index
    }

    fn create_index_if_absent(&mut self) -> Result<bool, IndexError> {
        if self.exists()? {
            return Ok(false);
        }
        let url = self.url(&self.config.index);
        let body = index_mapping().to_string();
        let response = self.call("index create", || {
            http_client()
                .put(&url)
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(body.clone())
        })?;
        // Lost a race with another creator
        if response.status == 400 && response.body.contains("resource_already_exists_exception") {
            return Ok(false);
        }
        response.into_success()?;
        log::info!("created index {}", self.config.index);
        Ok(true)
    }

    fn delete_index(&mut self) -> Result<bool, IndexError> {
        let url = self.url(&self.config.index);
        let response = self.call("index delete", || http_client().delete(&url))?;
        match response.status {
            404 => Ok(false),
            _ => {
                response.into_success()?;
                log::info!("deleted index {}", self.config.index);
                Ok(true)
            }
        }
    }

    fn document_count(&self) -> Result<u64, IndexError> {
        let url = self.url(&format!("{}/_count", self.config.index));
        let response = self.call("index count", || http_client().get(&url))?;
        if response.status == 404 {
            return Ok(0);
        }
        let body = response.into_success()?;
        let count: CountResponse =
            serde_json::from_str(&body).map_err(|e| IndexError::Response(format!("count: {e}")))?;
        Ok(count.count)
    }

    fn bulk_index(&mut self, papers: &[Paper]) -> Result<usize, IndexError> {
        if papers.is_empty() {
            return Ok(0);
        }
        let body = bulk_body(&self.config.index, papers)?;
        let url = self.url("_bulk");
        let response = self.call("bulk", || {
            http_client()
                .post(&url)
                .header(reqwest::header::CONTENT_TYPE, "application/x-ndjson")
                .body(body.clone())
        })?;
        let text = response.into_success()?;
        count_accepted(&text, papers.len())
    }
}
