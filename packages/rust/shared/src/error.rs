//! Error types for DocBot.
//!
//! Library crates use [`DocBotError`] via `thiserror`.
//! The `docbot` binary wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all DocBot operations.
#[derive(Debug, thiserror::Error)]
pub enum DocBotError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// A URL that does not parse into a scheme and a network location.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// A URL outside the crawl boundary prefix.
    #[error("out of scope: {0}")]
    OutOfScope(String),

    /// Network/HTTP error while fetching a page.
    #[error("network error: {0}")]
    Network(String),

    /// Crawl ledger (libSQL) error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Context assembly was asked to work with zero retrieved passages.
    #[error("no context: the index returned no passages")]
    NoContext,

    /// Embedding, vector search, or generation call failed.
    #[error("{service} request failed: {message}")]
    Upstream { service: String, message: String },

    /// Data validation error.
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, DocBotError>;

impl DocBotError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create an upstream service error (`openai`, `pinecone`, ...).
    pub fn upstream(service: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Upstream {
            service: service.into(),
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the error came from an external service rather than local state.
    pub fn is_upstream(&self) -> bool {
        matches!(self, Self::Upstream { .. })
    }
}
