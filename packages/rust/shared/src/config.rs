//! Application configuration for DocBot.
//!
//! User config lives at `~/.docbot/docbot.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DocBotError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "docbot.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".docbot";

// ---------------------------------------------------------------------------
// Config structs (matching docbot.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Crawl and page storage settings.
    #[serde(default)]
    pub crawl: CrawlSection,

    /// OpenAI-compatible embedding and completion settings.
    #[serde(default)]
    pub openai: OpenAiConfig,

    /// Pinecone vector index settings.
    #[serde(default)]
    pub pinecone: PineconeConfig,

    /// Retrieval and prompt budget settings.
    #[serde(default)]
    pub retrieval: RetrievalSection,

    /// HTTP API settings.
    #[serde(default)]
    pub server: ServerConfig,
}

/// `[crawl]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlSection {
    /// Directory the crawled pages are written under.
    #[serde(default = "default_storage_root")]
    pub storage_root: String,

    /// libSQL file recording crawl runs and stored pages.
    #[serde(default = "default_ledger_path")]
    pub ledger_path: String,

    /// Literal `href` value that is never followed.
    #[serde(default = "default_skip_link")]
    pub skip_link: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Maximum redirects followed per request.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
}

impl Default for CrawlSection {
    fn default() -> Self {
        Self {
            storage_root: default_storage_root(),
            ledger_path: default_ledger_path(),
            skip_link: default_skip_link(),
            request_timeout_secs: default_request_timeout(),
            max_redirects: default_max_redirects(),
        }
    }
}

fn default_storage_root() -> String {
    "saved_pages".into()
}
fn default_ledger_path() -> String {
    "docbot-ledger.db".into()
}
fn default_skip_link() -> String {
    "#docusaurus_skipToContent_fallback".into()
}
fn default_request_timeout() -> u64 {
    30
}
fn default_max_redirects() -> usize {
    5
}

/// `[openai]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_openai_key_env")]
    pub api_key_env: String,

    /// Base URL for OpenAI-compatible endpoints.
    #[serde(default = "default_openai_base")]
    pub base_url: String,

    /// Embedding model used for both indexing and queries.
    #[serde(default = "default_embed_model")]
    pub embed_model: String,

    /// Completion model used to generate answers.
    #[serde(default = "default_completion_model")]
    pub completion_model: String,

    /// Completion token cap.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Sampling temperature.
    #[serde(default)]
    pub temperature: f32,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_openai_key_env(),
            base_url: default_openai_base(),
            embed_model: default_embed_model(),
            completion_model: default_completion_model(),
            max_tokens: default_max_tokens(),
            temperature: 0.0,
        }
    }
}

fn default_openai_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_openai_base() -> String {
    "https://api.openai.com/v1".into()
}
fn default_embed_model() -> String {
    "text-embedding-ada-002".into()
}
fn default_completion_model() -> String {
    "gpt-3.5-turbo-instruct".into()
}
fn default_max_tokens() -> u32 {
    400
}

/// `[pinecone]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PineconeConfig {
    /// Name of the env var holding the API key.
    #[serde(default = "default_pinecone_key_env")]
    pub api_key_env: String,

    /// Data-plane host of the index (`https://<index>-<project>.svc.<env>.pinecone.io`).
    #[serde(default)]
    pub index_host: String,

    /// Optional namespace inside the index.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl Default for PineconeConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_pinecone_key_env(),
            index_host: String::new(),
            namespace: None,
        }
    }
}

fn default_pinecone_key_env() -> String {
    "PINECONE_API_KEY".into()
}

/// `[retrieval]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalSection {
    /// Number of passages fetched per query.
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Character budget for the joined passages in a prompt.
    #[serde(default = "default_char_limit")]
    pub char_limit: usize,

    /// Maximum characters per indexed chunk.
    #[serde(default = "default_chunk_max_chars")]
    pub chunk_max_chars: usize,

    /// Sentences repeated between consecutive chunks of a page.
    #[serde(default)]
    pub chunk_overlap_sentences: usize,

    /// Vectors per upsert request while indexing.
    #[serde(default = "default_upsert_batch")]
    pub upsert_batch_size: usize,
}

impl Default for RetrievalSection {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            char_limit: default_char_limit(),
            chunk_max_chars: default_chunk_max_chars(),
            chunk_overlap_sentences: 0,
            upsert_batch_size: default_upsert_batch(),
        }
    }
}

fn default_top_k() -> usize {
    3
}
fn default_char_limit() -> usize {
    3750
}
fn default_chunk_max_chars() -> usize {
    1500
}
fn default_upsert_batch() -> usize {
    100
}

/// `[server]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the HTTP API binds to.
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:8000".into()
}

// ---------------------------------------------------------------------------
// Runtime configs (merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime crawl configuration.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// URL prefix every crawled page must start with.
    pub base_prefix: String,
    /// Directory the pages are written under.
    pub storage_root: PathBuf,
    /// `href` literal that is never followed.
    pub skip_link: String,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Maximum redirects followed per request.
    pub max_redirects: usize,
}

impl CrawlConfig {
    /// Build a crawl config for `base_prefix` from the `[crawl]` section.
    pub fn new(base_prefix: impl Into<String>, section: &CrawlSection) -> Self {
        Self {
            base_prefix: base_prefix.into(),
            storage_root: PathBuf::from(&section.storage_root),
            skip_link: section.skip_link.clone(),
            request_timeout_secs: section.request_timeout_secs,
            max_redirects: section.max_redirects,
        }
    }
}

/// Runtime retrieval configuration for the answer service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub char_limit: usize,
}

impl From<&AppConfig> for RetrievalConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            top_k: config.retrieval.top_k,
            char_limit: config.retrieval.char_limit,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            char_limit: default_char_limit(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.docbot/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| DocBotError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.docbot/docbot.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| DocBotError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| DocBotError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| DocBotError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| DocBotError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| DocBotError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read an API key from the env var named by `var_name`.
pub fn resolve_api_key(var_name: &str, service: &str) -> Result<String> {
    match std::env::var(var_name) {
        Ok(val) if !val.trim().is_empty() => Ok(val.trim().to_string()),
        _ => Err(DocBotError::config(format!(
            "{service} API key not found. Set the {var_name} environment variable."
        ))),
    }
}
