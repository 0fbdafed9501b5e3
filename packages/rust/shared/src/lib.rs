//! Shared types, error model, and configuration for DocBot.
//!
//! This crate is the foundation depended on by all other DocBot crates.
//! It provides:
//! - [`DocBotError`]: the unified error type
//! - Domain types ([`PageRecord`], [`Document`], [`Passage`], [`PromptContext`], [`Answer`])
//! - Configuration ([`AppConfig`], [`CrawlConfig`], [`RetrievalConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CrawlConfig, CrawlSection, OpenAiConfig, PineconeConfig, RetrievalConfig,
    RetrievalSection, ServerConfig, config_dir, config_file_path, init_config, load_config,
    load_config_from, resolve_api_key,
};
pub use error::{DocBotError, Result};
pub use types::{
    Answer, Chunk, Document, DocumentMetadata, MODEL_VERSION, PageEntry, PageRecord, Passage,
    PromptContext, Question,
};
