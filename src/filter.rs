use crate::config::DomainScope;
use regex::Regex;
use url::Url;

/// Decides which discovered links the crawler follows
#[derive(Debug)]
pub struct UrlFilter {
    scope: DomainScope,
    /// `host[:port]` of the seed, as it appears in the seed URL
    seed_authority: String,
    /// Parsed host of the seed, for strict matching
    seed_host: Option<String>,
    exclude_regexes: Vec<Regex>,
}

impl UrlFilter {
    /// Create a filter scoped to `seed`'s host
    pub fn new(
        seed: &Url,
        scope: DomainScope,
        exclude_patterns: &[String],
    ) -> Result<Self, regex::Error> {
        let mut exclude_regexes = Vec::with_capacity(exclude_patterns.len());
        for pattern in exclude_patterns {
            exclude_regexes.push(Regex::new(pattern)?);
        }

        Ok(Self {
            scope,
            seed_authority: authority(seed),
            seed_host: seed.host_str().map(|h| h.to_string()),
            exclude_regexes,
        })
    }

    /// Determine if a resolved URL should be crawled
    pub fn should_crawl(&self, url: &Url) -> bool {
        if !matches!(url.scheme(), "http" | "https") {
            return false;
        }

        if !self.is_in_domain_scope(url) {
            return false;
        }

        let url_str = url.as_str();
        !self.exclude_regexes.iter().any(|re| re.is_match(url_str))
    }

    /// Resolve `href` against the page it was found on and return the
    /// normalized URL if it should be crawled
    pub fn resolve(&self, base: &Url, href: &str) -> Option<Url> {
        let resolved = base.join(href).ok()?;
        if !self.should_crawl(&resolved) {
            ::log::debug!("URL filter rejected: {}", resolved);
            return None;
        }
        Some(normalize_url(&resolved))
    }

    fn is_in_domain_scope(&self, url: &Url) -> bool {
        match self.scope {
            // Plain substring containment on the whole URL text
            DomainScope::Loose => {
                !self.seed_authority.is_empty() && url.as_str().contains(&self.seed_authority)
            }
            DomainScope::Strict => match (&self.seed_host, url.host_str()) {
                (Some(seed), Some(host)) => seed.eq_ignore_ascii_case(host),
                _ => false,
            },
        }
    }
}

/// Strip the fragment so `page#a` and `page#b` are one visit
pub fn normalize_url(url: &Url) -> Url {
    let mut normalized = url.clone();
    normalized.set_fragment(None);
    normalized
}

/// `host[:port]` of a URL, empty when it has no host
pub fn authority(url: &Url) -> String {
    match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => format!("{host}:{port}"),
        (Some(host), None) => host.to_string(),
        _ => String::new(),
    }
}
