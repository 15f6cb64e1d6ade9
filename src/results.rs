use serde::{Deserialize, Serialize};

/// Title used when a document declares none
pub const NO_TITLE: &str = "No Title";

/// Stored for every distinct URL that was successfully processed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRecord {
    /// Page title, or [`NO_TITLE`]
    pub title: String,

    /// URL of the page; unique within a metadata collection
    pub url: String,

    /// Normalized text of the page's main content
    pub content: String,

    /// Up to three leading headings in document order
    pub headers: Vec<String>,
}

impl PageRecord {
    pub fn new(url: String, title: String, content: String, headers: Vec<String>) -> Self {
        Self {
            title,
            url,
            content,
            headers,
        }
    }
}

/// What the content extractor pulls out of a rendered document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedPage {
    pub title: String,

    /// Normalized main text; `None` when the document had no usable container
    /// or the container held no visible text
    pub main_text: Option<String>,

    pub headers: Vec<String>,

    /// Raw `href` values of every anchor, in document order
    pub links: Vec<String>,
}

/// Both metadata collections as read back from disk after a crawl
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlOutput {
    pub all_data: Vec<PageRecord>,
    pub filtered_data: Vec<PageRecord>,
}

/// In-memory counters for one crawl, reported in logs only
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CrawlStats {
    pub rendered: usize,
    pub stored: usize,
    pub relevant: usize,
    pub skipped_empty: usize,
    pub failed: usize,
}
