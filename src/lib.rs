pub mod classifier;
pub mod config;
pub mod crawlers;
pub mod embedding;
pub mod error;
pub mod filter;
pub mod index;
pub mod llm;
pub mod parsers;
pub mod results;
pub mod storage;

// Re-export commonly used types for convenience
pub use config::{CrawlConfig, DomainScope};
pub use crawlers::{CancelHandle, CrawlSession, WebDriverRenderer};
pub use error::{Error, Result};
pub use results::{CrawlOutput, CrawlStats, PageRecord};

use embedding::Embedder;
use llm::OllamaClient;
use std::path::{Path, PathBuf};

/// A crawl session wired to WebDriver, the configured embedder and an Ollama model
pub type DefaultSession = CrawlSession<WebDriverRenderer, Box<dyn Embedder>, OllamaClient>;

/// Main builder for crawl sessions
///
/// ```no_run
/// # async fn run() -> yield_rag::Result<()> {
/// let output = yield_rag::SiteIndexer::new()
///     .with_max_depth(2)
///     .with_output_dir("out")
///     .scrape("https://example.com", "Find pricing information")
///     .await?;
/// println!("{} pages, {} relevant", output.all_data.len(), output.filtered_data.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct SiteIndexer {
    config: CrawlConfig,
}

impl SiteIndexer {
    /// Create a builder with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole configuration
    pub fn with_config(mut self, config: CrawlConfig) -> Self {
        self.config = config;
        self
    }

    /// Load configuration from a JSON file
    pub fn with_config_file(self, path: impl AsRef<Path>) -> Result<Self> {
        let config = CrawlConfig::from_file(path)?;
        Ok(self.with_config(config))
    }

    /// Load configuration from a JSON string
    pub fn with_config_str(self, config_str: &str) -> Result<Self> {
        let config = CrawlConfig::from_json(config_str)?;
        Ok(self.with_config(config))
    }

    /// Set the maximum link distance from the seed
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.config.max_depth = max_depth;
        self
    }

    /// Stop after this many pages have been rendered
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.config.max_pages = Some(max_pages);
        self
    }

    pub fn with_webdriver_url(mut self, url: impl Into<String>) -> Self {
        self.config.webdriver.url = url.into();
        self
    }

    /// Directory for the metadata and index files
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output.dir = dir.into();
        self
    }

    pub fn with_domain_scope(mut self, scope: DomainScope) -> Self {
        self.config.domain_scope = scope;
        self
    }

    pub fn config(&self) -> &CrawlConfig {
        &self.config
    }

    /// Validate the configuration and assemble a session.
    ///
    /// No browser session is opened until the first page is crawled.
    pub fn build(&self) -> Result<DefaultSession> {
        self.config.validate()?;

        let renderer = WebDriverRenderer::new(&self.config.webdriver);
        let embedder = embedding::from_config(&self.config.embedding)?;
        let model = OllamaClient::new(&self.config.llm)?;

        Ok(CrawlSession::new(renderer, embedder, model, &self.config))
    }

    /// Build a session and crawl `url` to the configured depth
    pub async fn scrape(self, url: &str, instructions: &str) -> Result<CrawlOutput> {
        let mut session = self.build()?;
        Ok(session.crawl(url, instructions, self.config.max_depth).await)
    }
}
