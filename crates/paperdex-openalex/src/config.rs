//! OpenAlex works listing configuration

use std::time::Duration;

use paperdex_core::{DriverConfig, RetryPolicy};

pub const DEFAULT_BASE_URL: &str = "https://api.openalex.org";

/// OpenAlex source id of the arXiv repository
pub const ARXIV_SOURCE_ID: &str = "S4306400194";

/// Fields requested per work; everything the paper conversion reads.
pub const WORK_FIELDS: &str = "id,doi,title,display_name,publication_date,publication_year,\
type,cited_by_count,referenced_works_count,open_access,authorships,primary_location,\
locations,best_oa_location,primary_topic,topics,abstract_inverted_index";

/// API maximum for `per-page`
pub const MAX_PER_PAGE: u32 = 200;

#[derive(Debug, Clone)]
pub struct OpenAlexConfig {
    pub base_url: String,
    /// `filter` expression, e.g. `locations.source.id:S4306400194`
    pub filter: Option<String>,
    pub sort: Option<String>,
    pub select: String,
    pub per_page: u32,
    /// Contact address; requests carrying it get the higher rate tier
    pub mailto: Option<String>,
    pub api_key: Option<String>,
    /// Keep works without an arXiv id under their OpenAlex id
    pub all_works: bool,
    /// Sleep after each successful page
    pub page_delay: Duration,
    pub retry: RetryPolicy,
    pub max_pages: Option<u64>,
}

impl Default for OpenAlexConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            filter: Some(format!("locations.source.id:{ARXIV_SOURCE_ID}")),
            sort: None,
            select: WORK_FIELDS.to_string(),
            per_page: MAX_PER_PAGE,
            mailto: None,
            api_key: None,
            all_works: false,
            page_delay: Duration::from_millis(150),
            retry: RetryPolicy::cursor_default(),
            max_pages: None,
        }
    }
}

impl OpenAlexConfig {
    pub fn works_url(&self) -> String {
        format!("{}/works", self.base_url.trim_end_matches('/'))
    }

    /// Query parameters for one page at `cursor`
    pub fn page_params(&self, cursor: &str) -> Vec<(&'static str, String)> {
        let mut params = Vec::with_capacity(7);
        if let Some(filter) = self.filter.as_deref().filter(|f| !f.trim().is_empty()) {
            params.push(("filter", filter.to_string()));
        }
        if let Some(sort) = &self.sort {
            params.push(("sort", sort.clone()));
        }
        if !self.select.is_empty() {
            params.push(("select", self.select.clone()));
        }
        params.push(("per-page", self.per_page.clamp(1, MAX_PER_PAGE).to_string()));
        params.push(("cursor", cursor.to_string()));
        if let Some(mailto) = &self.mailto {
            params.push(("mailto", mailto.clone()));
        }
        if let Some(key) = &self.api_key {
            params.push(("api_key", key.clone()));
        }
        params
    }

    pub fn driver_config(&self) -> DriverConfig {
        DriverConfig {
            retry: self.retry,
            page_delay: self.page_delay,
            max_pages: self.max_pages,
            ..DriverConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_targets_arxiv_repository() {
        let config = OpenAlexConfig::default();
        assert_eq!(config.works_url(), "https://api.openalex.org/works");
        let params = config.page_params("*");
        assert!(params.contains(&("filter", "locations.source.id:S4306400194".to_string())));
        assert!(params.contains(&("cursor", "*".to_string())));
        assert!(params.contains(&("per-page", "200".to_string())));
        assert!(!params.iter().any(|(k, _)| *k == "mailto"));
    }

    #[test]
    fn optional_params() {
        let config = OpenAlexConfig {
            filter: Some("  ".into()),
            sort: Some("publication_date:desc".into()),
            mailto: Some("ops@example.org".into()),
            per_page: 1000,
            ..OpenAlexConfig::default()
        };
        let params = config.page_params("abc");
        assert!(!params.iter().any(|(k, _)| *k == "filter"));
        assert!(params.contains(&("sort", "publication_date:desc".to_string())));
        assert!(params.contains(&("mailto", "ops@example.org".to_string())));
        assert!(params.contains(&("per-page", "200".to_string())));
    }

    #[test]
    fn driver_settings_follow_config() {
        let config = OpenAlexConfig {
            max_pages: Some(3),
            ..OpenAlexConfig::default()
        };
        let driver = config.driver_config();
        assert_eq!(driver.max_pages, Some(3));
        assert_eq!(driver.page_delay, Duration::from_millis(150));
        assert_eq!(driver.retry, RetryPolicy::cursor_default());
    }
}
