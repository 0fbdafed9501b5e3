//! Site crawler: URL classification, path mapping, and the crawl engine.
//!
//! This crate provides:
//! - [`scope`]: URL validation, the crawl boundary, and the visited set
//! - [`path`]: deterministic URL → file mapping and page persistence
//! - [`engine`]: the depth-first crawler

pub mod engine;
pub mod path;
pub mod scope;

pub use engine::{CrawlProgress, CrawlResult, Crawler, SavedPage, SilentProgress, extract_links};
pub use path::{storage_path, to_local_path, write_page};
pub use scope::{CrawlScope, Rejection, VisitedSet, normalize_url, parse_absolute};
