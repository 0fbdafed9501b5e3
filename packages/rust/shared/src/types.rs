//! Core domain types shared by the crawl, load, and answer stages.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// Model version reported by the health endpoint.
pub const MODEL_VERSION: &str = "0.0.1";

// ---------------------------------------------------------------------------
// Crawl output
// ---------------------------------------------------------------------------

/// A page fetched by the crawler, identified by its normalized URL.
#[derive(Debug, Clone)]
pub struct PageRecord {
    /// Normalized page URL.
    pub url: Url,
    /// Where the page was written on disk.
    pub local_path: PathBuf,
    /// The fetched body, byte for byte.
    pub raw_content: Vec<u8>,
}

/// A persisted page as recorded in the crawl ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageEntry {
    /// Unique row identifier (UUID v7).
    pub id: String,
    /// Crawl run that fetched this page.
    pub run_id: String,
    /// Normalized page URL.
    pub url: String,
    /// Path of the stored file.
    pub local_path: String,
    /// SHA-256 hash of the raw content.
    pub content_hash: String,
    /// When the page was fetched.
    pub fetched_at: DateTime<Utc>,
    /// HTTP status code from fetch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    /// Content length in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_len: Option<usize>,
}

// ---------------------------------------------------------------------------
// Loaded corpus
// ---------------------------------------------------------------------------

/// Provenance attached to every loaded [`Document`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// File the text was read from.
    pub source: PathBuf,
    /// URL the file was crawled from, when the ledger knows it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Normalized plain text of one stored page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub text: String,
    pub metadata: DocumentMetadata,
}

/// A slice of a [`Document`] sized for embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Stable identifier (`<source hash>-<n>`), used as the vector id.
    pub id: String,
    pub text: String,
    /// Page URL, or the source path when the URL is unknown.
    pub url: String,
    pub source: PathBuf,
}

// ---------------------------------------------------------------------------
// Retrieval
// ---------------------------------------------------------------------------

/// A retrieved text fragment, as returned by the vector index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub text: String,
    pub url: String,
    /// Similarity score; higher is more relevant.
    pub score: f32,
}

/// The assembled prompt for one query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptContext {
    pub prompt_text: String,
    /// URL of the highest-ranked passage, whether or not it fit the budget.
    pub source_url: String,
    /// Number of passages that fit into the context.
    pub included: usize,
}

/// Question request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub text: String,
}

/// Question/answer response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub question: String,
    pub answer: String,
    pub url: String,
}
