//! Datasets API: release list and per-dataset file manifest

use anyhow::Context;
use paperdex_core::stream::{http_client, send_text};
use paperdex_core::Throttle;
use serde::Deserialize;

use crate::config::S2Config;

#[derive(Debug, Deserialize)]
struct DatasetManifest {
    #[serde(default)]
    files: Vec<String>,
}

/// Resolves releases and dataset file URLs.
pub struct DatasetsClient {
    config: S2Config,
    throttle: Throttle,
}

impl DatasetsClient {
    pub fn new(config: S2Config) -> Self {
        Self {
            throttle: Throttle::new(config.delay),
            config,
        }
    }

    fn get(&self, url: &str) -> anyhow::Result<String> {
        let body = self
            .config
            .retry
            .run("s2 datasets", |_| {
                self.throttle.wait();
                send_text(self.config.authorize(http_client().get(url)))
            })
            .map_err(|e| e.last)?;
        Ok(body)
    }

    /// Most recent release id (the API lists releases oldest first)
    pub fn latest_release(&self) -> anyhow::Result<String> {
        log::debug!("Resolving latest release ID...");
        let body = self
            .get(&self.config.datasets("release/"))
            .context("Failed to fetch releases")?;
        let id = parse_release_list(&body)?;
        log::debug!("Latest release: {id}");
        Ok(id)
    }

    /// `latest` resolves through the API, anything else passes through
    pub fn resolve_release(&self, release: &str) -> anyhow::Result<String> {
        if release == "latest" {
            self.latest_release()
        } else {
            Ok(release.to_string())
        }
    }

    /// Download URLs for one dataset of a release
    pub fn dataset_files(&self, release_id: &str, dataset: &str) -> anyhow::Result<Vec<String>> {
        log::info!("Fetching file list for {dataset} ({release_id})...");
        let url = self
            .config
            .datasets(&format!("release/{release_id}/dataset/{dataset}"));
        let body = self
            .get(&url)
            .with_context(|| format!("Failed to fetch {dataset} file list"))?;
        let files = parse_manifest(&body).with_context(|| format!("Invalid manifest for {dataset}"))?;
        log::info!("{dataset}: {} files", files.len());
        Ok(files)
    }
}

fn parse_release_list(body: &str) -> anyhow::Result<String> {
    let releases: Vec<String> = serde_json::from_str(body).context("Invalid release list JSON")?;
    releases
        .into_iter()
        .last()
        .context("Empty release list from S2 API")
}

fn parse_manifest(body: &str) -> anyhow::Result<Vec<String>> {
    let manifest: DatasetManifest = serde_json::from_str(body)?;
    let files: Vec<String> = manifest
        .files
        .into_iter()
        .filter(|f| !f.trim().is_empty())
        .collect();
    anyhow::ensure!(!files.is_empty(), "no files listed");
    Ok(files)
}
