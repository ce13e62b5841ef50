//! Application configuration.
//!
//! Loaded from a TOML file (`freshrag.toml` by default) with serde
//! defaults for every field, so a missing file yields a fully usable
//! configuration. The coordination and generation hosts can additionally
//! be overridden through the `ETCD_URL` and `OLLAMA_URL` environment
//! variables, which take precedence over the file.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub coordination: CoordinationConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CrawlerConfig {
    #[serde(default = "default_sites")]
    pub sites: Vec<String>,
    /// Maximum concurrent crawls per domain.
    #[serde(default = "default_thread_limit")]
    pub thread_limit: usize,
    /// Slot lease TTL. Must exceed the longest expected crawl, or a slot
    /// can be reclaimed while its owner is still fetching.
    #[serde(default = "default_lease_ttl_secs")]
    pub lease_ttl_secs: u64,
    /// Fixed delay between acquisition attempts.
    #[serde(default = "default_poll_backoff_secs")]
    pub poll_backoff_secs: u64,
    #[serde(default = "default_artifact_dir")]
    pub artifact_dir: PathBuf,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            sites: default_sites(),
            thread_limit: default_thread_limit(),
            lease_ttl_secs: default_lease_ttl_secs(),
            poll_backoff_secs: default_poll_backoff_secs(),
            artifact_dir: default_artifact_dir(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
        }
    }
}

impl CrawlerConfig {
    pub fn lease_ttl(&self) -> Duration {
        Duration::from_secs(self.lease_ttl_secs)
    }

    pub fn poll_backoff(&self) -> Duration {
        Duration::from_secs(self.poll_backoff_secs)
    }
}

fn default_sites() -> Vec<String> {
    vec![
        "https://www.billboard.com/".to_string(),
        "https://pitchfork.com/".to_string(),
        "https://www.rollingstone.com/".to_string(),
        "https://www.nme.com/".to_string(),
    ]
}
fn default_thread_limit() -> usize {
    5
}
fn default_lease_ttl_secs() -> u64 {
    300
}
fn default_poll_backoff_secs() -> u64 {
    2
}
fn default_artifact_dir() -> PathBuf {
    PathBuf::from("./crawled_json")
}
fn default_fetch_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct CoordinationConfig {
    /// etcd v3 JSON gateway base URL.
    #[serde(default = "default_etcd_url")]
    pub url: String,
    #[serde(default = "default_coordination_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CoordinationConfig {
    fn default() -> Self {
        Self {
            url: default_etcd_url(),
            timeout_secs: default_coordination_timeout_secs(),
        }
    }
}

fn default_etcd_url() -> String {
    "http://localhost:2379".to_string()
}
fn default_coordination_timeout_secs() -> u64 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_embedding_dims")]
    pub dims: usize,
    #[serde(default = "default_ollama_url")]
    pub url: String,
    #[serde(default = "default_embedding_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            dims: default_embedding_dims(),
            url: default_ollama_url(),
            timeout_secs: default_embedding_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_embedding_model() -> String {
    "nomic-embed-text".to_string()
}
fn default_embedding_dims() -> usize {
    768
}
fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_embedding_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_model")]
    pub model: String,
    #[serde(default = "default_ollama_url")]
    pub url: String,
    /// `"chat"` (persona as system message, streamed) or `"completion"`
    /// (single prompt, batched).
    #[serde(default = "default_generation_mode")]
    pub mode: String,
    #[serde(default)]
    pub persona: Option<String>,
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: default_generation_model(),
            url: default_ollama_url(),
            mode: default_generation_mode(),
            persona: None,
            timeout_secs: default_generation_timeout_secs(),
        }
    }
}

fn default_generation_model() -> String {
    "gemma3:4b".to_string()
}
fn default_generation_mode() -> String {
    "chat".to_string()
}
fn default_generation_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_n")]
    pub top_n: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_n: default_top_n(),
        }
    }
}

fn default_top_n() -> usize {
    2
}

/// Load configuration from `path`, falling back to defaults when the file
/// does not exist, then apply environment overrides and validate.
pub fn load_config(path: &Path) -> Result<Config> {
    let mut config: Config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content).with_context(|| "Failed to parse config file")?
    } else {
        Config::default()
    };

    if let Ok(url) = std::env::var("ETCD_URL") {
        config.coordination.url = url;
    }
    if let Ok(url) = std::env::var("OLLAMA_URL") {
        config.embedding.url = url.clone();
        config.generation.url = url;
    }

    if config.crawler.thread_limit == 0 {
        anyhow::bail!("crawler.thread_limit must be >= 1");
    }
    if config.crawler.lease_ttl_secs == 0 {
        anyhow::bail!("crawler.lease_ttl_secs must be > 0");
    }
    if config.embedding.dims == 0 {
        anyhow::bail!("embedding.dims must be > 0");
    }
    if config.retrieval.top_n == 0 {
        anyhow::bail!("retrieval.top_n must be >= 1");
    }
    if freshrag_core::generator::GenerationMode::parse(&config.generation.mode).is_none() {
        anyhow::bail!(
            "Unknown generation mode: '{}'. Must be chat or completion.",
            config.generation.mode
        );
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_yields_defaults() {
        let config = load_config(Path::new("/nonexistent/freshrag.toml")).unwrap();
        assert_eq!(config.crawler.thread_limit, 5);
        assert_eq!(config.crawler.lease_ttl_secs, 300);
        assert_eq!(config.crawler.poll_backoff_secs, 2);
        assert_eq!(config.retrieval.top_n, 2);
        assert_eq!(config.crawler.sites.len(), 4);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("freshrag.toml");
        std::fs::write(
            &path,
            r#"
[crawler]
thread_limit = 2
sites = ["https://a.example/"]
"#,
        )
        .unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.crawler.thread_limit, 2);
        assert_eq!(config.crawler.sites, vec!["https://a.example/"]);
        assert_eq!(config.crawler.lease_ttl_secs, 300);
    }

    #[test]
    fn test_invalid_mode_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("freshrag.toml");
        std::fs::write(
            &path,
            r#"
[generation]
mode = "oracle"
"#,
        )
        .unwrap();
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn test_zero_thread_limit_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("freshrag.toml");
        std::fs::write(&path, "[crawler]\nthread_limit = 0\n").unwrap();
        assert!(load_config(&path).is_err());
    }
}
