//! Semantic Scholar client configuration

use std::time::Duration;

use paperdex_core::RetryPolicy;

pub const DEFAULT_GRAPH_URL: &str = "https://api.semanticscholar.org/graph/v1";
pub const DEFAULT_DATASETS_URL: &str = "https://api.semanticscholar.org/datasets/v1";

/// Shared by the search, lookup and dataset-manifest clients.
#[derive(Debug, Clone)]
pub struct S2Config {
    pub graph_url: String,
    pub datasets_url: String,
    /// Sent as `x-api-key`; required for the datasets API
    pub api_key: Option<String>,
    /// Minimum spacing between requests from one client
    pub delay: Duration,
    pub retry: RetryPolicy,
}

impl Default for S2Config {
    fn default() -> Self {
        Self {
            graph_url: DEFAULT_GRAPH_URL.to_string(),
            datasets_url: DEFAULT_DATASETS_URL.to_string(),
            api_key: None,
            delay: Duration::from_secs(1),
            retry: RetryPolicy::api_default(),
        }
    }
}

impl S2Config {
    pub(crate) fn graph(&self, path: &str) -> String {
        format!("{}/{}", self.graph_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }

    pub(crate) fn datasets(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.datasets_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Attach the API key header when one is configured
    pub(crate) fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("x-api-key", key),
            None => request,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_join_tolerates_slashes() {
        let config = S2Config {
            graph_url: "http://localhost:9/graph/v1/".into(),
            ..S2Config::default()
        };
        assert_eq!(config.graph("/paper/search"), "http://localhost:9/graph/v1/paper/search");
        assert_eq!(
            S2Config::default().datasets("release/"),
            "https://api.semanticscholar.org/datasets/v1/release/"
        );
    }
}
