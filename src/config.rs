use crate::error::ConfigError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// How discovered links are matched against the seed's host
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DomainScope {
    /// Follow any link whose text contains the seed's authority (host[:port])
    #[default]
    Loose,
    /// Follow only links whose parsed host equals the seed's host
    Strict,
}

/// Top-level configuration for a crawl session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlConfig {
    /// Maximum link distance from the seed
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Upper bound on rendered pages (unbounded when absent)
    #[serde(default)]
    pub max_pages: Option<usize>,

    /// Domain scoping policy for link following
    #[serde(default)]
    pub domain_scope: DomainScope,

    /// Regex patterns for URLs never to follow
    #[serde(default = "default_exclude_patterns")]
    pub exclude_patterns: Vec<String>,

    #[serde(default)]
    pub webdriver: WebDriverConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

/// Headless browser settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebDriverConfig {
    /// URL for the WebDriver instance
    #[serde(default = "default_webdriver_url")]
    pub url: String,

    #[serde(default = "default_true")]
    pub headless: bool,

    /// Selector whose presence marks the page as ready
    #[serde(default = "default_ready_selector")]
    pub ready_selector: String,

    #[serde(default = "default_ready_timeout_secs")]
    pub ready_timeout_secs: u64,

    /// Pause after navigation so client-side rendering can run
    #[serde(default = "default_load_settle_ms")]
    pub load_settle_ms: u64,

    /// Pause after scrolling so lazy-loaded content can populate
    #[serde(default = "default_scroll_settle_ms")]
    pub scroll_settle_ms: u64,
}

/// Generation model used for keyword expansion and title classification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Sent as a bearer token when present
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

/// Which embedding implementation to construct
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// HTTP embeddings endpoint (Ollama API shape)
    #[default]
    Ollama,
    /// In-process ONNX model, requires the `local-embeddings` feature
    Fastembed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub backend: EmbeddingBackend,

    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Vector dimension; both indexes are built with it
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// Per-request deadline for the HTTP backend
    #[serde(default = "default_embedding_timeout_secs")]
    pub timeout_secs: u64,
}

/// Where the session's metadata and index files are written
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,

    #[serde(default = "default_metadata_file")]
    pub metadata_file: String,

    #[serde(default = "default_filtered_metadata_file")]
    pub filtered_metadata_file: String,

    #[serde(default = "default_index_file")]
    pub index_file: String,

    #[serde(default = "default_filtered_index_file")]
    pub filtered_index_file: String,
}

fn default_max_depth() -> usize {
    3
}

fn default_exclude_patterns() -> Vec<String> {
    vec![r"(?i)\.(jpg|jpeg|png|gif|webp|css|js|ico|svg|woff|woff2|ttf|eot|pdf|zip)$".to_string()]
}

fn default_webdriver_url() -> String {
    "http://localhost:4444".to_string()
}

fn default_true() -> bool {
    true
}

fn default_ready_selector() -> String {
    "body".to_string()
}

fn default_ready_timeout_secs() -> u64 {
    20
}

fn default_load_settle_ms() -> u64 {
    3000
}

fn default_scroll_settle_ms() -> u64 {
    2000
}

fn default_llm_endpoint() -> String {
    "http://localhost:11434".to_string()
}

fn default_llm_model() -> String {
    "llama2".to_string()
}

fn default_llm_timeout_secs() -> u64 {
    60
}

fn default_embedding_model() -> String {
    "all-minilm".to_string()
}

fn default_dimension() -> usize {
    384
}

fn default_embedding_timeout_secs() -> u64 {
    30
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_metadata_file() -> String {
    "website_metadata.json".to_string()
}

fn default_filtered_metadata_file() -> String {
    "website_metadata_filtered.json".to_string()
}

fn default_index_file() -> String {
    "website_docs.index".to_string()
}

fn default_filtered_index_file() -> String {
    "website_docs_filtered.index".to_string()
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            max_pages: None,
            domain_scope: DomainScope::default(),
            exclude_patterns: default_exclude_patterns(),
            webdriver: WebDriverConfig::default(),
            llm: LlmConfig::default(),
            embedding: EmbeddingConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl Default for WebDriverConfig {
    fn default() -> Self {
        Self {
            url: default_webdriver_url(),
            headless: true,
            ready_selector: default_ready_selector(),
            ready_timeout_secs: default_ready_timeout_secs(),
            load_settle_ms: default_load_settle_ms(),
            scroll_settle_ms: default_scroll_settle_ms(),
        }
    }
}

impl WebDriverConfig {
    pub fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.ready_timeout_secs)
    }

    pub fn load_settle(&self) -> Duration {
        Duration::from_millis(self.load_settle_ms)
    }

    pub fn scroll_settle(&self) -> Duration {
        Duration::from_millis(self.scroll_settle_ms)
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: default_llm_endpoint(),
            model: default_llm_model(),
            api_key: None,
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::default(),
            endpoint: default_llm_endpoint(),
            model: default_embedding_model(),
            dimension: default_dimension(),
            timeout_secs: default_embedding_timeout_secs(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            metadata_file: default_metadata_file(),
            filtered_metadata_file: default_filtered_metadata_file(),
            index_file: default_index_file(),
            filtered_index_file: default_filtered_index_file(),
        }
    }
}

impl OutputConfig {
    pub fn metadata_path(&self) -> PathBuf {
        self.dir.join(&self.metadata_file)
    }

    pub fn filtered_metadata_path(&self) -> PathBuf {
        self.dir.join(&self.filtered_metadata_file)
    }

    pub fn index_path(&self) -> PathBuf {
        self.dir.join(&self.index_file)
    }

    pub fn filtered_index_path(&self) -> PathBuf {
        self.dir.join(&self.filtered_index_file)
    }
}

impl CrawlConfig {
    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        Self::from_json(&contents)
    }

    /// Load configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Override settings from the environment (`WEBDRIVER_URL`, `OLLAMA_HOST`,
    /// `YIELD_RAG_API_KEY`)
    pub fn apply_env(&mut self) {
        if let Some(url) = non_empty_env("WEBDRIVER_URL") {
            self.webdriver.url = url;
        }
        if let Some(host) = non_empty_env("OLLAMA_HOST") {
            self.llm.endpoint = host.clone();
            self.embedding.endpoint = host;
        }
        if let Some(key) = non_empty_env("YIELD_RAG_API_KEY") {
            self.llm.api_key = Some(key);
        }
    }

    /// Reject configurations that cannot run. Called before any crawling.
    pub fn validate(&self) -> Result<(), ConfigError> {
        parse_url("webdriver.url", &self.webdriver.url)?;
        parse_url("llm.endpoint", &self.llm.endpoint)?;

        if self.llm.model.trim().is_empty() {
            return Err(ConfigError::Invalid("llm.model must not be empty".into()));
        }
        if self.llm.timeout_secs == 0 || self.embedding.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "request timeouts must be greater than zero".into(),
            ));
        }
        if self.embedding.dimension == 0 {
            return Err(ConfigError::Invalid(
                "embedding.dimension must be greater than zero".into(),
            ));
        }
        if self.embedding.model.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "embedding.model must not be empty".into(),
            ));
        }
        match self.embedding.backend {
            EmbeddingBackend::Ollama => {
                parse_url("embedding.endpoint", &self.embedding.endpoint)?;
            }
            EmbeddingBackend::Fastembed => {
                if !cfg!(feature = "local-embeddings") {
                    return Err(ConfigError::Invalid(
                        "the fastembed backend needs the `local-embeddings` feature".into(),
                    ));
                }
            }
        }

        for pattern in &self.exclude_patterns {
            Regex::new(pattern)?;
        }

        let files = [
            &self.output.metadata_file,
            &self.output.filtered_metadata_file,
            &self.output.index_file,
            &self.output.filtered_index_file,
        ];
        if files.iter().any(|f| f.trim().is_empty()) {
            return Err(ConfigError::Invalid(
                "output file names must not be empty".into(),
            ));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = files.iter().find(|f| !seen.insert(f.trim())) {
            return Err(ConfigError::Invalid(format!(
                "output file name {dup:?} is used more than once"
            )));
        }

        Ok(())
    }
}

fn parse_url(field: &'static str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value).map_err(|source| ConfigError::Url { field, source })
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_json() {
        let config = CrawlConfig::from_json("{}").unwrap();
        assert_eq!(config.max_depth, 3);
        assert_eq!(config.domain_scope, DomainScope::Loose);
        assert_eq!(config.embedding.dimension, 384);
        assert_eq!(config.webdriver.ready_selector, "body");
        assert_eq!(config.webdriver.ready_timeout(), Duration::from_secs(20));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_overrides() {
        let config = CrawlConfig::from_json(
            r#"{
                "max_depth": 1,
                "domain_scope": "strict",
                "llm": { "model": "mistral" },
                "output": { "dir": "out" }
            }"#,
        )
        .unwrap();
        assert_eq!(config.max_depth, 1);
        assert_eq!(config.domain_scope, DomainScope::Strict);
        assert_eq!(config.llm.model, "mistral");
        assert_eq!(config.llm.endpoint, "http://localhost:11434");
        assert_eq!(
            config.output.metadata_path(),
            PathBuf::from("out").join("website_metadata.json")
        );
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = CrawlConfig::default();
        config.embedding.dimension = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = CrawlConfig::default();
        config.llm.endpoint = "not a url".into();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Url {
                field: "llm.endpoint",
                ..
            })
        ));

        let mut config = CrawlConfig::default();
        config.exclude_patterns.push("(unclosed".into());
        assert!(matches!(config.validate(), Err(ConfigError::Pattern(_))));

        let mut config = CrawlConfig::default();
        config.output.filtered_metadata_file = config.output.metadata_file.clone();
        assert!(config.validate().is_err());

        let mut config = CrawlConfig::default();
        config.embedding.timeout_secs = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_metadata_and_index_sharing_a_file() {
        let mut config = CrawlConfig::default();
        config.output.index_file = config.output.metadata_file.clone();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = CrawlConfig::default();
        config.output.filtered_index_file = format!(" {} ", config.output.metadata_file);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = CrawlConfig::default();
        config.output.metadata_file = "meta.json".into();
        config.output.filtered_metadata_file = "meta.filtered.json".into();
        config.output.index_file = "vectors.bin".into();
        config.output.filtered_index_file = "vectors.filtered.bin".into();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_embedding_timeout_default() {
        let config = CrawlConfig::from_json(r#"{"embedding": {"model": "nomic"}}"#).unwrap();
        assert_eq!(config.embedding.timeout_secs, 30);
        assert_eq!(config.embedding.model, "nomic");
    }

    #[test]
    fn test_api_key_is_not_serialized() {
        let mut config = CrawlConfig::default();
        config.llm.api_key = Some("secret".into());
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret"));
    }
}
