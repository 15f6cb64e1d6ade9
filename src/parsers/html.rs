use crate::parsers::text;
use crate::results::{ExtractedPage, NO_TITLE};
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;

/// Number of leading headings kept per page
pub const MAX_HEADERS: usize = 3;

/// Candidate main-content containers, highest priority first
const CONTAINER_SELECTORS: [&str; 5] = [
    "main",
    "div#main-content",
    "div.main-content",
    "article",
    "body",
];

/// Subtrees dropped before text is collected
const STRIPPED_TAGS: [&str; 4] = ["script", "style", "nav", "footer"];

static HEAD_TITLE: LazyLock<Selector> = LazyLock::new(|| static_selector("head > title"));
static TITLE: LazyLock<Selector> = LazyLock::new(|| static_selector("title"));
static HEADINGS: LazyLock<Selector> =
    LazyLock::new(|| static_selector("h1, h2, h3, h4, h5, h6"));
static LINKS: LazyLock<Selector> = LazyLock::new(|| static_selector("a[href]"));
static CONTAINERS: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    CONTAINER_SELECTORS
        .iter()
        .map(|css| static_selector(css))
        .collect()
});

fn static_selector(css: &str) -> Selector {
    Selector::parse(css).expect("built-in selector is valid")
}

/// Turns a rendered HTML document into title, main text, headings and links
pub fn extract(html: &str) -> ExtractedPage {
    let doc = Html::parse_document(html);

    let main_text = select_main_content(&doc)
        .map(visible_text)
        .filter(|t| !t.is_empty());

    let links = links(&doc);
    ::log::debug!("HTML extractor found {} links", links.len());

    ExtractedPage {
        title: title(&doc),
        main_text,
        headers: headers(&doc, MAX_HEADERS),
        links,
    }
}

/// The document's declared title, or [`NO_TITLE`].
///
/// The `<head>` title wins; otherwise the first `<title>` outside inline SVG.
pub fn title(doc: &Html) -> String {
    doc.select(&HEAD_TITLE)
        .next()
        .or_else(|| doc.select(&TITLE).find(|el| !inside_svg(*el)))
        .map(|el| text::normalize_whitespace_in_segment(&el.text().collect::<String>()))
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| NO_TITLE.to_string())
}

fn inside_svg(element: ElementRef<'_>) -> bool {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .any(|a| a.value().name() == "svg")
}

/// First container matching, in order: `<main>`, `div#main-content`,
/// `div.main-content`, `<article>`, `<body>`
pub fn select_main_content(doc: &Html) -> Option<ElementRef<'_>> {
    CONTAINERS
        .iter()
        .find_map(|selector| doc.select(selector).next())
}

/// Visible text of `root` with script, style, nav and footer subtrees removed
pub fn visible_text(root: ElementRef<'_>) -> String {
    let mut fragments = Vec::new();
    collect_text(root, &mut fragments);
    text::join_fragments(fragments)
}

fn collect_text<'a>(element: ElementRef<'a>, out: &mut Vec<&'a str>) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push(text);
        } else if let Some(child_el) = ElementRef::wrap(child) {
            if STRIPPED_TAGS.contains(&child_el.value().name()) {
                continue;
            }
            collect_text(child_el, out);
        }
    }
}

/// Trimmed text of the first `limit` headings (h1-h6) in document order
pub fn headers(doc: &Html, limit: usize) -> Vec<String> {
    doc.select(&HEADINGS)
        .take(limit)
        .map(|el| text::normalize_whitespace_in_segment(&el.text().collect::<String>()))
        .collect()
}

/// Raw `href` values of all anchors
pub fn links(doc: &Html) -> Vec<String> {
    doc.select(&LINKS)
        .filter_map(|e| e.value().attr("href"))
        .map(|s| s.to_string())
        .collect()
}
