//! Configuration loading from TOML files

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use paperdex_arxiv::ArxivConfig;
use paperdex_core::{HttpConfig, RetryPolicy};
use paperdex_enrich::EnrichConfig;
use paperdex_index::{DEFAULT_BULK_SIZE, ElasticConfig};
use paperdex_openalex::OpenAlexConfig;
use paperdex_pubmed::PubmedConfig;
use paperdex_semantic_scholar::S2Config;

/// Global configuration for paperdex
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub index: IndexSection,
    pub http: HttpSection,
    pub retry: RetrySection,
    pub arxiv: ArxivSection,
    pub pubmed: PubmedSection,
    pub s2: S2Section,
    pub openalex: OpenAlexSection,
    pub enrich: EnrichSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IndexSection {
    pub url: String,
    pub name: String,
    #[serde(deserialize_with = "deserialize_env_var")]
    pub username: Option<String>,
    #[serde(deserialize_with = "deserialize_env_var")]
    pub password: Option<String>,
    #[serde(deserialize_with = "deserialize_env_var")]
    pub api_key: Option<String>,
    pub bulk_size: usize,
}

impl Default for IndexSection {
    fn default() -> Self {
        let elastic = ElasticConfig::default();
        Self {
            url: elastic.url,
            name: elastic.index,
            username: None,
            password: None,
            api_key: std::env::var("ELASTICSEARCH_API_KEY").ok(),
            bulk_size: DEFAULT_BULK_SIZE,
        }
    }
}

/// Timeouts in seconds
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct HttpSection {
    pub request_timeout: u64,
    pub read_timeout: u64,
}

impl Default for HttpSection {
    fn default() -> Self {
        let http = HttpConfig::default();
        Self {
            request_timeout: http.request_timeout.as_secs(),
            read_timeout: http.read_timeout.as_secs(),
        }
    }
}

/// Overrides the per-adapter attempt ceiling when set
#[derive(Debug, Clone, Copy, Deserialize, Default)]
#[serde(default)]
pub struct RetrySection {
    pub max_attempts: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ArxivSection {
    pub base_url: String,
    pub delay_ms: u64,
}

impl Default for ArxivSection {
    fn default() -> Self {
        let arxiv = ArxivConfig::default();
        Self {
            base_url: arxiv.base_url,
            delay_ms: arxiv.delay.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PubmedSection {
    pub base_url: String,
    #[serde(deserialize_with = "deserialize_env_var")]
    pub api_key: Option<String>,
    /// Defaults to the NCBI limit for the key state
    pub delay_ms: Option<u64>,
}

impl Default for PubmedSection {
    fn default() -> Self {
        Self {
            base_url: PubmedConfig::default().base_url,
            api_key: std::env::var("NCBI_API_KEY").ok(),
            delay_ms: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct S2Section {
    pub graph_url: String,
    pub datasets_url: String,
    #[serde(deserialize_with = "deserialize_env_var")]
    pub api_key: Option<String>,
    pub delay_ms: u64,
}

impl Default for S2Section {
    fn default() -> Self {
        let s2 = S2Config::default();
        Self {
            graph_url: s2.graph_url,
            datasets_url: s2.datasets_url,
            api_key: std::env::var("S2_API_KEY").ok(),
            delay_ms: s2.delay.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OpenAlexSection {
    pub base_url: String,
    pub filter: Option<String>,
    pub mailto: Option<String>,
    #[serde(deserialize_with = "deserialize_env_var")]
    pub api_key: Option<String>,
    pub per_page: u32,
    pub page_delay_ms: u64,
}

impl Default for OpenAlexSection {
    fn default() -> Self {
        let oa = OpenAlexConfig::default();
        Self {
            base_url: oa.base_url,
            filter: oa.filter,
            mailto: None,
            api_key: std::env::var("OPENALEX_API_KEY").ok(),
            per_page: oa.per_page,
            page_delay_ms: oa.page_delay.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EnrichSection {
    pub db_path: PathBuf,
    pub batch_size: usize,
    pub delay_ms: u64,
    pub cooldown_secs: u64,
    pub max_consecutive_failures: u32,
}

impl Default for EnrichSection {
    fn default() -> Self {
        let enrich = EnrichConfig::default();
        Self {
            db_path: PathBuf::from("./data/paperdex.duckdb"),
            batch_size: enrich.batch_size,
            delay_ms: enrich.delay.as_millis() as u64,
            cooldown_secs: enrich.cooldown.as_secs(),
            max_consecutive_failures: enrich.max_consecutive_failures,
        }
    }
}

/// Deserialize a string that may contain environment variable reference like ${VAR}
fn deserialize_env_var<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    Ok(opt.and_then(|s| expand_env_var(&s)))
}

/// Expand ${VAR} to environment variable value
fn expand_env_var(s: &str) -> Option<String> {
    if let Some(var_name) = s.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
        std::env::var(var_name).ok().filter(|v| !v.is_empty())
    } else {
        Some(s.to_string())
    }
}

impl Config {
    /// Load configuration from default locations
    ///
    /// Search order:
    /// 1. ./paperdex.toml (current directory)
    /// 2. ~/.config/paperdex/config.toml
    ///
    /// If no config file found, returns default config.
    pub fn load() -> Result<Self> {
        let local_config = PathBuf::from("paperdex.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(config_dir) = directories::ProjectDirs::from("", "", "paperdex") {
            let user_config = config_dir.config_dir().join("config.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        log::debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Apply the `[retry]` override to an adapter's default policy
    fn retry(&self, policy: RetryPolicy) -> RetryPolicy {
        match self.retry.max_attempts {
            Some(n) => RetryPolicy {
                max_attempts: n.max(1),
                ..policy
            },
            None => policy,
        }
    }

    pub fn http_config(&self) -> HttpConfig {
        HttpConfig {
            request_timeout: Duration::from_secs(self.http.request_timeout),
            read_timeout: Duration::from_secs(self.http.read_timeout),
        }
    }

    pub fn elastic_config(&self) -> ElasticConfig {
        ElasticConfig {
            url: self.index.url.clone(),
            index: self.index.name.clone(),
            username: self.index.username.clone(),
            password: self.index.password.clone(),
            api_key: self.index.api_key.clone(),
            retry: self.retry(RetryPolicy::api_default()),
        }
    }

    pub fn arxiv_config(&self) -> ArxivConfig {
        ArxivConfig {
            base_url: self.arxiv.base_url.clone(),
            delay: Duration::from_millis(self.arxiv.delay_ms),
            retry: self.retry(RetryPolicy::api_default()),
        }
    }

    pub fn pubmed_config(&self) -> PubmedConfig {
        PubmedConfig {
            base_url: self.pubmed.base_url.clone(),
            api_key: self.pubmed.api_key.clone(),
            delay: self.pubmed.delay_ms.map(Duration::from_millis),
            retry: self.retry(RetryPolicy::api_default()),
        }
    }

    pub fn s2_config(&self) -> S2Config {
        S2Config {
            graph_url: self.s2.graph_url.clone(),
            datasets_url: self.s2.datasets_url.clone(),
            api_key: self.s2.api_key.clone(),
            delay: Duration::from_millis(self.s2.delay_ms),
            retry: self.retry(RetryPolicy::api_default()),
        }
    }

    /// The bulk dataset manifest needs a key; fail before any work starts.
    pub fn require_s2_key(&self) -> Result<()> {
        if self.s2.api_key.is_none() {
            anyhow::bail!(
                "Semantic Scholar datasets API requires a key: set [s2] api_key or S2_API_KEY"
            );
        }
        Ok(())
    }

    pub fn openalex_config(&self) -> OpenAlexConfig {
        OpenAlexConfig {
            base_url: self.openalex.base_url.clone(),
            filter: self.openalex.filter.clone(),
            mailto: self.openalex.mailto.clone(),
            api_key: self.openalex.api_key.clone(),
            per_page: self.openalex.per_page,
            page_delay: Duration::from_millis(self.openalex.page_delay_ms),
            retry: self.retry(RetryPolicy::cursor_default()),
            ..OpenAlexConfig::default()
        }
    }

    pub fn enrich_config(&self) -> EnrichConfig {
        EnrichConfig {
            batch_size: self.enrich.batch_size,
            delay: Duration::from_millis(self.enrich.delay_ms),
            cooldown: Duration::from_secs(self.enrich.cooldown_secs),
            max_consecutive_failures: self.enrich.max_consecutive_failures,
            ..EnrichConfig::default()
        }
    }
}
