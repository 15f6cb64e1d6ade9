use crate::classifier::RelevanceClassifier;
use crate::config::{CrawlConfig, DomainScope};
use crate::crawlers::{PageRenderer, RenderTiming, render_page};
use crate::embedding::Embedder;
use crate::error::Result;
use crate::filter::{UrlFilter, normalize_url};
use crate::index::VectorIndexes;
use crate::llm::LanguageModel;
use crate::parsers;
use crate::results::{CrawlOutput, CrawlStats, ExtractedPage, PageRecord};
use crate::storage::{Collection, MetadataStore};
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use url::Url;

/// Stops a crawl from dispatching further URLs.
///
/// The page being processed when the flag is raised still finishes its
/// writes. Once raised the flag stays raised.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One crawler with its browser, models, indexes and metadata files.
///
/// Each [`CrawlSession::crawl`] starts from scratch: the visited set and
/// keyword cache are cleared, and all four output files are truncated before
/// the first page is rendered.
pub struct CrawlSession<R, E, M> {
    renderer: R,
    embedder: E,
    classifier: RelevanceClassifier<M>,
    indexes: VectorIndexes,
    store: MetadataStore,
    timing: RenderTiming,
    domain_scope: DomainScope,
    exclude_patterns: Vec<String>,
    max_pages: Option<usize>,
    visited: HashSet<String>,
    stats: CrawlStats,
    cancel: CancelHandle,
}

impl<R, E, M> CrawlSession<R, E, M>
where
    R: PageRenderer,
    E: Embedder,
    M: LanguageModel,
{
    pub fn new(renderer: R, embedder: E, model: M, config: &CrawlConfig) -> Self {
        let output = &config.output;
        Self {
            renderer,
            embedder,
            classifier: RelevanceClassifier::new(model),
            indexes: VectorIndexes::new(
                config.embedding.dimension,
                output.index_path(),
                output.filtered_index_path(),
            ),
            store: MetadataStore::new(output.metadata_path(), output.filtered_metadata_path()),
            timing: RenderTiming::from(&config.webdriver),
            domain_scope: config.domain_scope,
            exclude_patterns: config.exclude_patterns.clone(),
            max_pages: config.max_pages,
            visited: HashSet::new(),
            stats: CrawlStats::default(),
            cancel: CancelHandle::new(),
        }
    }

    /// Replace the render timing (e.g. to drop the settle pauses)
    pub fn with_timing(mut self, timing: RenderTiming) -> Self {
        self.timing = timing;
        self
    }

    /// Share an existing cancellation flag instead of the session's own
    pub fn with_cancel_handle(mut self, cancel: CancelHandle) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn stats(&self) -> CrawlStats {
        self.stats
    }

    pub fn visited(&self) -> &HashSet<String> {
        &self.visited
    }

    pub fn indexes(&self) -> &VectorIndexes {
        &self.indexes
    }

    pub fn store(&self) -> &MetadataStore {
        &self.store
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn classifier_model(&self) -> &M {
        self.classifier.model()
    }

    /// Crawl from `seed` up to `max_depth` links away and return both metadata
    /// collections as persisted.
    ///
    /// Never fails: per-page errors are logged and skipped, and if the final
    /// read-back fails the output is empty.
    pub async fn crawl(&mut self, seed: &str, instructions: &str, max_depth: usize) -> CrawlOutput {
        ::log::info!("Starting crawl of {} (max depth {})", seed, max_depth);

        self.visited.clear();
        self.stats = CrawlStats::default();
        self.classifier.reset();
        if let Err(e) = self.indexes.reset() {
            ::log::error!("Failed to reset vector indexes: {}", e);
        }
        if let Err(e) = self.store.reset() {
            ::log::error!("Failed to reset metadata files: {}", e);
        }

        match self.url_filter(seed) {
            Ok((seed_url, filter)) => {
                self.traverse(seed_url, &filter, instructions, max_depth)
                    .await
            }
            Err(e) => ::log::error!("Cannot crawl {}: {}", seed, e),
        }

        if let Err(e) = self.indexes.persist() {
            ::log::error!("Failed to save vector indexes: {}", e);
        }
        if let Err(e) = self.renderer.close().await {
            ::log::warn!("Failed to close renderer: {}", e);
        }

        ::log::info!("Crawl finished: {:?}", self.stats);
        self.read_back()
    }

    fn url_filter(&self, seed: &str) -> std::result::Result<(Url, UrlFilter), String> {
        let seed_url = Url::parse(seed).map_err(|e| format!("invalid seed URL: {e}"))?;
        let filter = UrlFilter::new(&seed_url, self.domain_scope, &self.exclude_patterns)
            .map_err(|e| format!("invalid exclude pattern: {e}"))?;
        Ok((normalize_url(&seed_url), filter))
    }

    /// Depth-first walk over an explicit stack of `(url, depth)` pairs.
    ///
    /// Children are pushed in reverse so they pop in document order, which
    /// visits pages in the same order as a recursive walk would.
    async fn traverse(&mut self, seed: Url, filter: &UrlFilter, instructions: &str, max_depth: usize) {
        // Compute the keyword set before the first page
        self.classifier.keywords(instructions).await;

        let mut pending: Vec<(Url, usize)> = vec![(seed, 0)];

        while let Some((url, depth)) = pending.pop() {
            if self.cancel.is_cancelled() {
                ::log::info!(
                    "Crawl cancelled with {} URLs still queued",
                    pending.len() + 1
                );
                break;
            }
            if depth > max_depth {
                continue;
            }
            if let Some(limit) = self.max_pages
                && self.stats.rendered >= limit
            {
                ::log::info!("Reached page limit of {}", limit);
                break;
            }
            // Check-and-mark in one step
            if !self.visited.insert(url.to_string()) {
                ::log::trace!("Skipping already visited: {}", url);
                continue;
            }

            ::log::info!("Scraping: {}", url);
            let links = match self.process_page(&url, instructions).await {
                Ok(links) => links,
                Err(e) => {
                    self.stats.failed += 1;
                    ::log::warn!("Failed to scrape {}: {}", url, e);
                    continue;
                }
            };

            if depth >= max_depth {
                continue;
            }

            let children: Vec<Url> = links
                .iter()
                .filter_map(|href| filter.resolve(&url, href))
                .filter(|child| !self.visited.contains(child.as_str()))
                .collect();
            ::log::debug!("Found {} followable links in {}", children.len(), url);

            for child in children.into_iter().rev() {
                ::log::debug!("Following link: {}", child);
                pending.push((child, depth + 1));
            }
        }
    }

    /// Render and extract one page, store it if it has content, and return its
    /// raw links.
    ///
    /// Errors before extraction abort the page. Errors while storing are
    /// logged and the links are still returned.
    async fn process_page(&mut self, url: &Url, instructions: &str) -> Result<Vec<String>> {
        self.stats.rendered += 1;
        let html = render_page(&mut self.renderer, url.as_str(), &self.timing).await?;

        let ExtractedPage {
            title,
            main_text,
            headers,
            links,
        } = parsers::extract(&html);

        match main_text {
            Some(content) => {
                if let Err(e) = self
                    .store_page(url, title, content, headers, instructions)
                    .await
                {
                    self.stats.failed += 1;
                    ::log::warn!("Failed to store {}: {}", url, e);
                }
            }
            None => {
                self.stats.skipped_empty += 1;
                ::log::info!("Skipping empty page: {}", url);
            }
        }

        Ok(links)
    }

    /// Embed, classify, append vectors, then upsert metadata.
    ///
    /// The full index and collection are always written before the filtered
    /// ones, so the filtered side never holds what the full side lacks.
    async fn store_page(
        &mut self,
        url: &Url,
        title: String,
        content: String,
        headers: Vec<String>,
        instructions: &str,
    ) -> Result<()> {
        let embedding = self.embedder.embed(&content).await?;
        let relevant = self
            .classifier
            .is_relevant(&content, &title, instructions)
            .await;

        self.indexes.add_to_full(&embedding)?;
        if relevant {
            self.indexes.add_to_filtered(&embedding)?;
            ::log::info!("Added to filtered index: {} | {}", title, url);
        }

        let record = PageRecord::new(url.to_string(), title, content, headers);
        self.store.upsert(&record, Collection::Full)?;
        if relevant {
            self.store.upsert(&record, Collection::Filtered)?;
            self.stats.relevant += 1;
        }
        self.stats.stored += 1;

        ::log::info!("Successfully stored content: {} | {}", record.title, url);
        Ok(())
    }

    /// Final counts come from disk, not from `stats`
    fn read_back(&self) -> CrawlOutput {
        let all = self.store.load(Collection::Full);
        let filtered = self.store.load(Collection::Filtered);

        match (all, filtered) {
            (Ok(all_data), Ok(filtered_data)) => {
                ::log::info!("Number of total entries in metadata: {}", all_data.len());
                ::log::info!(
                    "Number of filtered entries in metadata: {}",
                    filtered_data.len()
                );
                CrawlOutput {
                    all_data,
                    filtered_data,
                }
            }
            (Err(e), _) | (_, Err(e)) => {
                ::log::error!("Error reading final metadata: {}", e);
                CrawlOutput::default()
            }
        }
    }
}
