pub mod crawler;
pub mod web;


pub use crawler::{CancelHandle, CrawlSession};
pub use web::WebDriverRenderer;

use crate::config::WebDriverConfig;
use crate::error::RenderError;
use async_trait::async_trait;
use std::time::Duration;

/// A headless browser session driven one page at a time
#[async_trait]
pub trait PageRenderer: Send {
    /// Navigate to `url`
    async fn goto(&mut self, url: &str) -> Result<(), RenderError>;

    /// Block until `selector` matches or `timeout` elapses
    async fn wait_for_selector(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), RenderError>;

    /// Scroll to the bottom of the document to trigger lazy loading
    async fn scroll_to_bottom(&mut self) -> Result<(), RenderError>;

    /// Serialized `document.documentElement`
    async fn outer_html(&mut self) -> Result<String, RenderError>;

    /// Release the browser session
    async fn close(&mut self) -> Result<(), RenderError>;
}

/// Timing knobs for [`render_page`]
#[derive(Debug, Clone)]
pub struct RenderTiming {
    pub ready_selector: String,
    pub ready_timeout: Duration,
    pub load_settle: Duration,
    pub scroll_settle: Duration,
}

impl RenderTiming {
    /// No pauses; used where pages are already static
    pub fn immediate() -> Self {
        Self {
            ready_selector: "body".to_string(),
            ready_timeout: Duration::from_secs(1),
            load_settle: Duration::ZERO,
            scroll_settle: Duration::ZERO,
        }
    }
}

impl From<&WebDriverConfig> for RenderTiming {
    fn from(config: &WebDriverConfig) -> Self {
        Self {
            ready_selector: config.ready_selector.clone(),
            ready_timeout: config.ready_timeout(),
            load_settle: config.load_settle(),
            scroll_settle: config.scroll_settle(),
        }
    }
}

/// Load `url` and return its HTML once dynamic content has had time to appear
pub async fn render_page<R: PageRenderer + ?Sized>(
    renderer: &mut R,
    url: &str,
    timing: &RenderTiming,
) -> Result<String, RenderError> {
    renderer.goto(url).await?;
    settle(timing.load_settle).await;

    renderer
        .wait_for_selector(&timing.ready_selector, timing.ready_timeout)
        .await?;

    renderer.scroll_to_bottom().await?;
    settle(timing.scroll_settle).await;

    renderer.outer_html().await
}

async fn settle(pause: Duration) {
    if !pause.is_zero() {
        tokio::time::sleep(pause).await;
    }
}
