//! Scope-aware, depth-first site crawler.
//!
//! The crawler starts from a seed URL, walks the link graph with an explicit
//! work stack, persists every eligible page exactly once under the storage
//! root, and records each page in the crawl ledger.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use chrono::Utc;
use reqwest::Client;
use reqwest::header::{CONTENT_TYPE, LOCATION};
use reqwest::redirect::Policy;
use scraper::{Html, Selector};
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};
use url::Url;
use uuid::Uuid;

use docbot_shared::{CrawlConfig, DocBotError, PageEntry, PageRecord, Result};
use docbot_storage::Storage;

use crate::path;
use crate::scope::{CrawlScope, Rejection, VisitedSet};

/// User-Agent string for crawl requests.
const USER_AGENT: &str = concat!("DocBot/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// CrawlResult
// ---------------------------------------------------------------------------

/// A page written to disk during a crawl.
#[derive(Debug, Clone)]
pub struct SavedPage {
    pub url: Url,
    pub local_path: PathBuf,
}

/// Summary of a completed crawl run.
#[derive(Debug, Clone)]
pub struct CrawlResult {
    /// Ledger identifier of this run.
    pub run_id: String,
    /// Pages fetched and written, in visit order.
    pub pages: Vec<SavedPage>,
    /// Links not followed (invalid, out of scope, or already visited).
    pub links_skipped: usize,
    /// Failures encountered (URL, error message).
    pub errors: Vec<(String, String)>,
    /// Total duration of the crawl.
    pub duration: Duration,
}

impl CrawlResult {
    pub fn pages_fetched(&self) -> usize {
        self.pages.len()
    }
}

/// Progress callback for reporting crawl status.
pub trait CrawlProgress: Send + Sync {
    /// Called after a page has been fetched and written.
    fn page_saved(&self, record: &PageRecord);
    /// Called when a page could not be fetched or written.
    fn page_failed(&self, url: &str, error: &DocBotError);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl CrawlProgress for SilentProgress {
    fn page_saved(&self, _record: &PageRecord) {}
    fn page_failed(&self, _url: &str, _error: &DocBotError) {}
}

/// Response of a successful fetch.
struct Fetched {
    /// URL after redirects; relative links resolve against it.
    final_url: Url,
    status_code: u16,
    is_html: bool,
    body: Vec<u8>,
}

// ---------------------------------------------------------------------------
// Crawler
// ---------------------------------------------------------------------------

/// Sequential depth-first crawler bounded by a URL prefix.
#[derive(Debug)]
pub struct Crawler {
    config: CrawlConfig,
    scope: CrawlScope,
    client: Client,
}

impl Crawler {
    /// Create a new crawler with the given configuration.
    pub fn new(config: CrawlConfig) -> Result<Self> {
        let scope = CrawlScope::new(config.base_prefix.clone());

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(scoped_redirects(scope.clone(), config.max_redirects))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| DocBotError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            scope,
            config,
            client,
        })
    }

    /// The crawl boundary in effect.
    pub fn scope(&self) -> &CrawlScope {
        &self.scope
    }

    /// Crawl from `seed`, writing pages under the storage root.
    pub async fn crawl(&self, seed: &Url, storage: &Storage) -> Result<CrawlResult> {
        self.crawl_with_progress(seed, storage, &SilentProgress).await
    }

    /// Crawl from `seed`, reporting each page to `progress`.
    ///
    /// Fetch and write failures are recorded in [`CrawlResult::errors`] and end
    /// only their own branch; the run always completes. Only ledger failures
    /// when opening or closing the run are returned as errors.
    #[instrument(skip_all, fields(seed = %seed, base = %self.scope.base_prefix()))]
    pub async fn crawl_with_progress(
        &self,
        seed: &Url,
        storage: &Storage,
        progress: &dyn CrawlProgress,
    ) -> Result<CrawlResult> {
        let start_time = Instant::now();
        let run_id = storage
            .insert_crawl_run(seed.as_str(), self.scope.base_prefix())
            .await?;

        let visited = VisitedSet::new();
        let mut stack: Vec<String> = vec![seed.to_string()];
        let mut pages: Vec<SavedPage> = Vec::new();
        let mut errors: Vec<(String, String)> = Vec::new();
        let mut links_skipped: usize = 0;

        info!(
            storage_root = %self.config.storage_root.display(),
            %run_id,
            "starting crawl"
        );

        while let Some(raw) = stack.pop() {
            let url = match self.scope.classify(&raw, &visited) {
                Ok(url) => url,
                Err(reason) => {
                    if reason != Rejection::AlreadyVisited {
                        debug!(url = %raw, ?reason, "not eligible, skipping");
                    }
                    links_skipped += 1;
                    continue;
                }
            };

            if !visited.claim(&url) {
                links_skipped += 1;
                continue;
            }

            info!(%url, "crawling");

            let fetched = match self.fetch(&url).await {
                Ok(fetched) => fetched,
                Err(e) => {
                    warn!(%url, error = %e, "fetch failed");
                    progress.page_failed(url.as_str(), &e);
                    errors.push((url.to_string(), e.to_string()));
                    continue;
                }
            };

            let local_path = match path::write_page(&self.config.storage_root, &url, &fetched.body)
            {
                Ok(p) => p,
                Err(e) => {
                    warn!(%url, error = %e, "failed to write page");
                    progress.page_failed(url.as_str(), &e);
                    errors.push((url.to_string(), e.to_string()));
                    continue;
                }
            };
            debug!(%url, path = %local_path.display(), "saved");

            let entry = PageEntry {
                id: Uuid::now_v7().to_string(),
                run_id: run_id.clone(),
                url: url.to_string(),
                local_path: local_path.to_string_lossy().into_owned(),
                content_hash: compute_hash(&fetched.body),
                fetched_at: Utc::now(),
                status_code: Some(fetched.status_code),
                content_len: Some(fetched.body.len()),
            };
            if let Err(e) = storage.record_page(&entry).await {
                warn!(%url, error = %e, "failed to record page in ledger");
                errors.push((url.to_string(), e.to_string()));
            }

            let links = if fetched.is_html {
                let html = String::from_utf8_lossy(&fetched.body);
                extract_links(&html, &fetched.final_url, &self.config.skip_link)
            } else {
                Vec::new()
            };

            let record = PageRecord {
                url: url.clone(),
                local_path: local_path.clone(),
                raw_content: fetched.body,
            };
            progress.page_saved(&record);
            pages.push(SavedPage { url, local_path });

            // Reversed so the first link on the page is visited first.
            stack.extend(links.into_iter().rev());
        }

        let duration = start_time.elapsed();

        let stats = serde_json::json!({
            "status": if errors.is_empty() { "completed" } else { "completed_with_errors" },
            "pages_fetched": pages.len(),
            "links_skipped": links_skipped,
            "errors": errors.len(),
            "duration_ms": duration.as_millis() as u64,
        });
        storage.finish_crawl_run(&run_id, &stats.to_string()).await?;

        let result = CrawlResult {
            run_id,
            pages,
            links_skipped,
            errors,
            duration,
        };

        info!(
            pages_fetched = result.pages_fetched(),
            links_skipped = result.links_skipped,
            errors = result.errors.len(),
            duration_ms = result.duration.as_millis(),
            "crawl completed"
        );

        Ok(result)
    }

    /// GET a single page. Non-success statuses are errors.
    async fn fetch(&self, url: &Url) -> Result<Fetched> {
        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|e| DocBotError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if status.is_redirection() {
            let target = response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .and_then(|location| response.url().join(location).ok());
            if let Some(target) = target.filter(|t| !self.scope.contains(t)) {
                return Err(DocBotError::OutOfScope(format!("{url} redirects to {target}")));
            }
        }
        if !status.is_success() {
            return Err(DocBotError::Network(format!("{url}: HTTP {status}")));
        }

        let final_url = response.url().clone();
        let is_html = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_none_or(|ct| ct.contains("html") || ct.starts_with("text/"));

        let body = response
            .bytes()
            .await
            .map_err(|e| DocBotError::Network(format!("{url}: body read failed: {e}")))?;

        Ok(Fetched {
            final_url,
            status_code: status.as_u16(),
            is_html,
            body: body.to_vec(),
        })
    }
}

/// Follow redirects up to `max` hops, but never out of `scope`.
///
/// A redirect leaving the boundary is not followed; the 3xx response is
/// handed back to [`Crawler::fetch`], which reports it as out of scope.
fn scoped_redirects(scope: CrawlScope, max: usize) -> Policy {
    Policy::custom(move |attempt| {
        if attempt.previous().len() > max {
            attempt.error("too many redirects")
        } else if !scope.contains(attempt.url()) {
            attempt.stop()
        } else {
            attempt.follow()
        }
    })
}

// ---------------------------------------------------------------------------
// Link extraction
// ---------------------------------------------------------------------------

/// Extract all `a[href]` targets, resolved against `base_url`.
///
/// The `skip_link` literal is dropped before resolution. Targets that fail to
/// resolve are dropped; eligibility is decided later by the scope.
pub fn extract_links(html: &str, base_url: &Url, skip_link: &str) -> Vec<String> {
    let doc = Html::parse_document(html);
    let link_sel = Selector::parse("a[href]").expect("valid selector");

    doc.select(&link_sel)
        .filter_map(|el| el.value().attr("href"))
        .map(str::trim)
        .filter(|href| *href != skip_link)
        .filter_map(|href| base_url.join(href).ok())
        .map(|resolved| resolved.to_string())
        .collect()
}

/// Compute SHA-256 hash of content.
fn compute_hash(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod crawler_tests {
    use super::*;
    use wiremock::matchers::{method, path as url_path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SKIP: &str = "#docusaurus_skipToContent_fallback";

    fn test_config(base: &str, root: &std::path::Path) -> CrawlConfig {
        CrawlConfig {
            base_prefix: base.into(),
            storage_root: root.to_path_buf(),
            skip_link: SKIP.into(),
            request_timeout_secs: 5,
            max_redirects: 5,
        }
    }

    async fn test_storage(root: &std::path::Path) -> Storage {
        Storage::open(&root.join("ledger.db")).await.unwrap()
    }

    fn html_page(body: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_raw(
            format!("<html><body>{body}</body></html>"),
            "text/html; charset=utf-8",
        )
    }

    fn temp_root(label: &str) -> PathBuf {
        std::env::temp_dir().join(format!("docbot-{label}-{}", Uuid::now_v7()))
    }

    #[test]
    fn test_compute_hash() {
        let hash = compute_hash(b"hello world");
        assert_eq!(hash.len(), 64); // SHA-256 = 64 hex chars
        assert_eq!(
            hash,
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_extract_links() {
        let html = r##"<html><body>
            <a href="#docusaurus_skipToContent_fallback">Skip to main content</a>
            <a href="/page2">Page 2</a>
            <a href="https://external.com">External</a>
            <a href="relative/path">Relative</a>
            <a href="#section">Anchor</a>
        </body></html>"##;

        let base = Url::parse("https://docs.example.com/guide/page1").unwrap();
        let links = extract_links(html, &base, SKIP);

        assert_eq!(
            links,
            vec![
                "https://docs.example.com/page2".to_string(),
                "https://external.com/".to_string(),
                "https://docs.example.com/guide/relative/path".to_string(),
                "https://docs.example.com/guide/page1#section".to_string(),
            ]
        );
        assert!(!links.iter().any(|l| l.contains("skipToContent")));
    }

    #[tokio::test]
    async fn crawl_stays_inside_base_prefix() {
        let server = MockServer::start().await;
        let other = MockServer::start().await;

        let root_page = format!(
            r#"<a href="/docs">Docs</a><a href="{}/x">Elsewhere</a>"#,
            other.uri()
        );
        Mock::given(method("GET"))
            .and(url_path("/"))
            .respond_with(html_page(&root_page))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(url_path("/docs"))
            .respond_with(html_page(r#"<p>Docs</p><a href="/">Home</a>"#))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(html_page("never"))
            .expect(0)
            .mount(&other)
            .await;

        let root = temp_root("scope");
        let storage = test_storage(&root).await;
        let pages_root = root.join("pages");
        // Trailing slash keeps another port sharing leading digits out of scope.
        let base = format!("{}/", server.uri());
        let crawler = Crawler::new(test_config(&base, &pages_root)).unwrap();

        let seed = Url::parse(&server.uri()).unwrap();
        let result = crawler.crawl(&seed, &storage).await.unwrap();

        assert_eq!(result.pages_fetched(), 2);
        assert!(result.errors.is_empty());

        let host_dir = pages_root.join(path::netloc(&seed));
        assert!(host_dir.join("index.html").is_file());
        assert!(host_dir.join("docs.html").is_file());
        let entries = std::fs::read_dir(&pages_root).unwrap().count();
        assert_eq!(entries, 1, "only the seed host is written");

        let recorded = storage.list_pages_by_run(&result.run_id).await.unwrap();
        assert_eq!(recorded.len(), 2);

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn redirect_out_of_scope_is_not_followed() {
        let server = MockServer::start().await;
        let other = MockServer::start().await;

        Mock::given(url_path("/"))
            .respond_with(html_page(r#"<a href="/go">Go</a><a href="/stay">Stay</a>"#))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(url_path("/go"))
            .respond_with(
                ResponseTemplate::new(302).insert_header("location", format!("{}/x", other.uri())),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(url_path("/stay"))
            .respond_with(ResponseTemplate::new(301).insert_header("location", "/docs"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(url_path("/docs"))
            .respond_with(html_page("<p>Docs</p>"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(html_page("outside"))
            .expect(0)
            .mount(&other)
            .await;

        let root = temp_root("redirect");
        let storage = test_storage(&root).await;
        let pages_root = root.join("pages");
        let base = format!("{}/", server.uri());
        let crawler = Crawler::new(test_config(&base, &pages_root)).unwrap();

        let seed = Url::parse(&server.uri()).unwrap();
        let result = crawler.crawl(&seed, &storage).await.unwrap();

        // `/` and `/stay` (redirected inside the boundary) are saved; `/go` is not.
        assert_eq!(result.pages_fetched(), 2);
        let host_dir = pages_root.join(path::netloc(&seed));
        assert!(!host_dir.join("go.html").exists());
        assert!(host_dir.join("stay.html").is_file());

        assert_eq!(result.errors.len(), 1);
        let (failed_url, message) = &result.errors[0];
        assert!(failed_url.ends_with("/go"), "{failed_url}");
        assert!(message.starts_with("out of scope"), "{message}");

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn cycles_are_fetched_once() {
        let server = MockServer::start().await;

        Mock::given(url_path("/"))
            .respond_with(html_page(r#"<a href="/a">A</a><a href="/b">B</a>"#))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(url_path("/a"))
            .respond_with(html_page(r#"<a href="/b">B</a><a href="/#top">Home</a>"#))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(url_path("/b"))
            .respond_with(html_page(r#"<a href="/a">A</a><a href="/b">Self</a>"#))
            .expect(1)
            .mount(&server)
            .await;

        let root = temp_root("cycle");
        let storage = test_storage(&root).await;
        let crawler = Crawler::new(test_config(&server.uri(), &root.join("pages"))).unwrap();

        let seed = Url::parse(&server.uri()).unwrap();
        let result = crawler.crawl(&seed, &storage).await.unwrap();

        assert_eq!(result.pages_fetched(), 3);
        // Depth-first: the first link's subtree is finished before the second link.
        let order: Vec<&str> = result.pages.iter().map(|p| p.url.path()).collect();
        assert_eq!(order, vec!["/", "/a", "/b"]);
        assert!(result.links_skipped >= 4);

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn fetch_failure_ends_only_its_branch() {
        let server = MockServer::start().await;

        Mock::given(url_path("/"))
            .respond_with(html_page(r#"<a href="/broken">Broken</a><a href="/ok">OK</a>"#))
            .mount(&server)
            .await;
        Mock::given(url_path("/broken"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(url_path("/ok"))
            .respond_with(html_page("<p>fine</p>"))
            .mount(&server)
            .await;

        let root = temp_root("failure");
        let storage = test_storage(&root).await;
        let crawler = Crawler::new(test_config(&server.uri(), &root.join("pages"))).unwrap();

        let seed = Url::parse(&server.uri()).unwrap();
        let result = crawler.crawl(&seed, &storage).await.unwrap();

        assert_eq!(result.pages_fetched(), 2);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].0.ends_with("/broken"));
        assert!(result.errors[0].1.contains("500"));

        let run = storage.get_crawl_run(&result.run_id).await.unwrap().unwrap();
        assert!(run.stats_json.unwrap().contains("completed_with_errors"));

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn non_html_is_saved_but_not_parsed() {
        let server = MockServer::start().await;

        Mock::given(url_path("/"))
            .respond_with(html_page(r#"<a href="/openapi.json">OpenAPI</a>"#))
            .mount(&server)
            .await;
        Mock::given(url_path("/openapi.json"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(r#"{"see": "<a href='/hidden'>x</a>"}"#, "application/json"),
            )
            .mount(&server)
            .await;
        Mock::given(url_path("/hidden"))
            .respond_with(html_page("hidden"))
            .expect(0)
            .mount(&server)
            .await;

        let root = temp_root("binary");
        let storage = test_storage(&root).await;
        let pages_root = root.join("pages");
        let crawler = Crawler::new(test_config(&server.uri(), &pages_root)).unwrap();

        let seed = Url::parse(&server.uri()).unwrap();
        let result = crawler.crawl(&seed, &storage).await.unwrap();

        assert_eq!(result.pages_fetched(), 2);
        let json_path = pages_root.join(path::netloc(&seed)).join("openapi.json");
        assert!(std::fs::read_to_string(json_path).unwrap().contains("hidden"));

        let _ = std::fs::remove_dir_all(&root);
    }
}
