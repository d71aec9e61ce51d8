//! Cursor-paginated `/works` listing

use paperdex_core::stream::{http_client, send_text};
use paperdex_core::{ApiError, Page, PageSource};
use serde::Deserialize;

use crate::config::OpenAlexConfig;
use crate::transform::WorkRow;

#[derive(Debug, Deserialize)]
struct WorksPage {
    meta: Meta,
    #[serde(default)]
    results: Vec<WorkRow>,
}

#[derive(Debug, Deserialize)]
struct Meta {
    #[serde(default)]
    count: Option<u64>,
    #[serde(default)]
    next_cursor: Option<String>,
}

/// Decode one `/works` response body.
pub fn parse_page(body: &str) -> Result<Page<WorkRow>, ApiError> {
    let page: WorksPage = sonic_rs::from_str(body).map_err(ApiError::decode)?;
    Ok(Page {
        items: page.results,
        next_cursor: page.meta.next_cursor,
        total: page.meta.count,
    })
}

/// One filtered works listing; each call fetches the page at `cursor`.
pub struct WorksQuery {
    config: OpenAlexConfig,
    url: String,
}

impl WorksQuery {
    pub fn new(config: OpenAlexConfig) -> Self {
        Self {
            url: config.works_url(),
            config,
        }
    }
}

impl PageSource for WorksQuery {
    type Item = WorkRow;

    fn label(&self) -> &str {
        "openalex"
    }

    fn fetch_page(&mut self, cursor: &str) -> Result<Page<WorkRow>, ApiError> {
        let params = self.config.page_params(cursor);
        let body = send_text(http_client().get(&self.url).query(&params))?;
        parse_page(&body)
    }
}
