//! Crawl eligibility: URL validation, the crawl boundary, and the visited set.

use std::collections::HashSet;
use std::sync::Mutex;

use docbot_shared::{DocBotError, Result};
use url::Url;

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Parse `raw` as an absolute URL with a scheme and a host.
///
/// Fragment-only (`#top`), relative (`/docs`), and malformed strings return `None`.
pub fn parse_absolute(raw: &str) -> Option<Url> {
    let url = Url::parse(raw).ok()?;
    if url.cannot_be_a_base() || url.host_str().is_none_or(str::is_empty) {
        return None;
    }
    Some(url)
}

/// Normalize a URL for deduplication: the fragment is dropped, everything
/// else keeps the `url` crate's canonical form.
pub fn normalize_url(url: &Url) -> Url {
    let mut normalized = url.clone();
    normalized.set_fragment(None);
    normalized
}

// ---------------------------------------------------------------------------
// VisitedSet
// ---------------------------------------------------------------------------

/// Normalized URLs already claimed during one crawl run.
///
/// The set only grows. [`VisitedSet::claim`] is the single synchronization
/// point: membership test and insertion happen under one lock.
#[derive(Debug, Default)]
pub struct VisitedSet {
    inner: Mutex<HashSet<String>>,
}

impl VisitedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `url` (normalized) has been claimed.
    pub fn contains(&self, url: &Url) -> bool {
        let key = normalize_url(url);
        self.lock().contains(key.as_str())
    }

    /// Claim `url` for fetching. Returns `false` if it was already claimed.
    pub fn claim(&self, url: &Url) -> bool {
        let key = normalize_url(url);
        self.lock().insert(key.to_string())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        // A panic while holding the lock cannot leave the set half-updated.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

// ---------------------------------------------------------------------------
// CrawlScope
// ---------------------------------------------------------------------------

/// Why a URL is not eligible for crawling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// No scheme or no network location, or unparseable.
    InvalidUrl,
    /// Already claimed in this run.
    AlreadyVisited,
    /// Does not start with the base-URL prefix.
    OutOfScope,
}

impl Rejection {
    /// Turn a rejection of `url` into the matching [`DocBotError`].
    pub fn into_error(self, url: &str) -> DocBotError {
        match self {
            Self::InvalidUrl => DocBotError::InvalidUrl(url.to_string()),
            Self::OutOfScope => DocBotError::OutOfScope(url.to_string()),
            Self::AlreadyVisited => DocBotError::validation(format!("{url} already visited")),
        }
    }
}

/// The crawl boundary: every eligible URL starts with `base_prefix`.
#[derive(Debug, Clone)]
pub struct CrawlScope {
    base_prefix: String,
}

impl CrawlScope {
    /// A base that parses as an absolute URL is stored in normalized form,
    /// so it compares equal to the normalized URLs it is matched against.
    pub fn new(base_prefix: impl Into<String>) -> Self {
        let raw = base_prefix.into();
        let base_prefix = match parse_absolute(&raw) {
            Some(url) => normalize_url(&url).to_string(),
            None => raw,
        };
        Self { base_prefix }
    }

    pub fn base_prefix(&self) -> &str {
        &self.base_prefix
    }

    /// Whether a normalized URL lies inside the boundary.
    pub fn contains(&self, url: &Url) -> bool {
        normalize_url(url).as_str().starts_with(&self.base_prefix)
    }

    /// Classify `raw` without mutating `visited`.
    ///
    /// On success returns the normalized URL. Callers must follow up with
    /// [`VisitedSet::claim`] before fetching.
    pub fn classify(&self, raw: &str, visited: &VisitedSet) -> std::result::Result<Url, Rejection> {
        let url = parse_absolute(raw).ok_or(Rejection::InvalidUrl)?;
        let url = normalize_url(&url);

        if visited.contains(&url) {
            return Err(Rejection::AlreadyVisited);
        }
        if !self.contains(&url) {
            return Err(Rejection::OutOfScope);
        }
        Ok(url)
    }

    /// Validate the seed of a crawl: it must be absolute and inside the boundary.
    pub fn admit_seed(&self, raw: &str) -> Result<Url> {
        let url = parse_absolute(raw).ok_or_else(|| Rejection::InvalidUrl.into_error(raw))?;
        let url = normalize_url(&url);
        if !self.contains(&url) {
            return Err(Rejection::OutOfScope.into_error(raw));
        }
        Ok(url)
    }

    /// Pure eligibility predicate.
    pub fn is_eligible(&self, raw: &str, visited: &VisitedSet) -> bool {
        self.classify(raw, visited).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope() -> CrawlScope {
        CrawlScope::new("https://docs.example.com")
    }

    #[test]
    fn rejects_unparseable_and_relative() {
        let visited = VisitedSet::new();
        let scope = scope();

        assert_eq!(scope.classify("#top", &visited), Err(Rejection::InvalidUrl));
        assert_eq!(scope.classify("/docs", &visited), Err(Rejection::InvalidUrl));
        assert_eq!(scope.classify("not a url", &visited), Err(Rejection::InvalidUrl));
        assert_eq!(
            scope.classify("mailto:dev@example.com", &visited),
            Err(Rejection::InvalidUrl)
        );
    }

    #[test]
    fn out_of_prefix_is_never_eligible() {
        let visited = VisitedSet::new();
        let scope = scope();

        assert_eq!(
            scope.classify("https://other.com/x", &visited),
            Err(Rejection::OutOfScope)
        );
        assert_eq!(
            scope.classify("http://docs.example.com/guide", &visited),
            Err(Rejection::OutOfScope)
        );

        // Claiming it does not change the verdict.
        let other = Url::parse("https://other.com/x").unwrap();
        visited.claim(&other);
        assert!(!scope.is_eligible("https://other.com/x", &visited));
    }

    #[test]
    fn in_scope_until_claimed() {
        let visited = VisitedSet::new();
        let scope = scope();

        let url = scope
            .classify("https://docs.example.com/guide#intro", &visited)
            .expect("eligible");
        assert_eq!(url.as_str(), "https://docs.example.com/guide");

        assert!(visited.claim(&url));
        assert_eq!(
            scope.classify("https://docs.example.com/guide", &visited),
            Err(Rejection::AlreadyVisited)
        );
        // Same page, different fragment.
        assert!(!scope.is_eligible("https://docs.example.com/guide#setup", &visited));
    }

    #[test]
    fn base_is_compared_in_normalized_form() {
        let visited = VisitedSet::new();

        let mixed_case = CrawlScope::new("https://Docs.Example.com");
        assert_eq!(mixed_case.base_prefix(), "https://docs.example.com/");
        assert!(mixed_case.is_eligible("https://Docs.Example.com", &visited));
        assert!(mixed_case.is_eligible("https://docs.example.com/guide", &visited));

        let default_port = CrawlScope::new("https://example.com:443/docs");
        assert_eq!(default_port.base_prefix(), "https://example.com/docs");
        assert!(default_port.is_eligible("https://example.com:443/docs", &visited));
        assert!(default_port.is_eligible("https://example.com/docs/intro", &visited));
        assert!(!default_port.is_eligible("https://example.com/blog", &visited));
    }

    #[test]
    fn host_only_base_does_not_admit_lookalike_hosts() {
        let scope = scope();
        let visited = VisitedSet::new();
        assert!(!scope.is_eligible("https://docs.example.com.evil.net/", &visited));
    }

    #[test]
    fn admit_seed_reports_typed_errors() {
        let scope = scope();

        let url = scope.admit_seed("https://docs.example.com/start#top").unwrap();
        assert_eq!(url.as_str(), "https://docs.example.com/start");

        assert!(matches!(
            scope.admit_seed("docs.example.com"),
            Err(DocBotError::InvalidUrl(_))
        ));
        assert!(matches!(
            scope.admit_seed("https://other.com/"),
            Err(DocBotError::OutOfScope(_))
        ));
    }

    #[test]
    fn claim_is_at_most_once() {
        let visited = VisitedSet::new();
        let url = Url::parse("https://docs.example.com/a").unwrap();
        assert!(visited.claim(&url));
        assert!(!visited.claim(&url));
        assert_eq!(visited.len(), 1);
    }

    #[test]
    fn concurrent_claims_admit_one_winner() {
        let visited = std::sync::Arc::new(VisitedSet::new());
        let url = Url::parse("https://docs.example.com/race").unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let visited = visited.clone();
                let url = url.clone();
                std::thread::spawn(move || visited.claim(&url))
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }
}
