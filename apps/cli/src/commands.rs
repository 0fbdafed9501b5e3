//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use docbot_core::{AnswerService, OpenAiClient, PineconeIndex, chunk_corpus, index_corpus};
use docbot_crawler::{CrawlProgress, Crawler, normalize_url, parse_absolute};
use docbot_loader::{ChunkOptions, DocumentLoader};
use docbot_shared::{
    AppConfig, CrawlConfig, DocBotError, PageRecord, init_config, load_config, load_config_from,
    resolve_api_key,
};
use docbot_storage::Storage;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};
use url::Url;

use crate::server;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// DocBot: answer questions from a crawled documentation site.
#[derive(Parser)]
#[command(
    name = "docbot",
    version,
    about = "Crawl a documentation site, index it, and answer questions about it.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.docbot/docbot.toml.
    #[arg(long, global = true, env = "DOCBOT_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Crawl a documentation site and save every in-scope page.
    Crawl {
        /// URL to start from.
        seed: String,

        /// Only follow URLs starting with this prefix (defaults to the seed).
        #[arg(long)]
        base: Option<String>,

        /// Directory to save pages under (defaults to crawl.storage_root).
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Load saved pages, embed them, and upsert them into the vector index.
    Index {
        /// Directory of saved pages (defaults to crawl.storage_root).
        #[arg(long)]
        root: Option<PathBuf>,

        /// Maximum characters per chunk.
        #[arg(long)]
        max_chars: Option<usize>,

        /// Sentences repeated between consecutive chunks.
        #[arg(long)]
        overlap: Option<usize>,

        /// Chunks per upsert request.
        #[arg(long)]
        batch_size: Option<usize>,
    },

    /// Answer a single question and print the result.
    Ask {
        /// The question to answer.
        question: String,
    },

    /// Serve the question-answering HTTP API.
    Serve {
        /// Address to bind (defaults to server.bind).
        #[arg(long)]
        bind: Option<String>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "docbot=info,tower_http=info",
        1 => "docbot=debug,tower_http=debug",
        _ => "docbot=trace,tower_http=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Crawl { seed, base, out } => {
            cmd_crawl(&resolve_config(config_path)?, &seed, base, out).await
        }
        Command::Index {
            root,
            max_chars,
            overlap,
            batch_size,
        } => {
            let config = resolve_config(config_path)?;
            let options = chunk_options(&config, max_chars, overlap);
            cmd_index(&config, root, options, batch_size).await
        }
        Command::Ask { question } => cmd_ask(&resolve_config(config_path)?, &question).await,
        Command::Serve { bind } => cmd_serve(&resolve_config(config_path)?, bind).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config_path),
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    Ok(config)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_crawl(
    config: &AppConfig,
    seed: &str,
    base: Option<String>,
    out: Option<PathBuf>,
) -> Result<()> {
    let (crawler, seed_url) = crawler_for(config, seed, base, out)?;
    let storage = Storage::open(Path::new(&config.crawl.ledger_path)).await?;

    info!(
        seed,
        base = crawler.scope().base_prefix(),
        "starting crawl"
    );

    let reporter = CliProgress::new();
    let result = crawler
        .crawl_with_progress(&seed_url, &storage, &reporter)
        .await?;
    reporter.finish();

    println!();
    println!("  Crawl complete!");
    println!("  Run:     {}", result.run_id);
    println!("  Pages:   {}", result.pages_fetched());
    println!("  Skipped: {}", result.links_skipped);
    println!("  Errors:  {}", result.errors.len());
    println!("  Time:    {:.1}s", result.duration.as_secs_f64());
    println!();

    for (url, message) in &result.errors {
        println!("  ! {url}: {message}");
    }

    Ok(())
}

/// Chunking options from `[retrieval]`, with CLI flags taking precedence.
fn chunk_options(
    config: &AppConfig,
    max_chars: Option<usize>,
    overlap: Option<usize>,
) -> ChunkOptions {
    ChunkOptions {
        max_chars: max_chars.unwrap_or(config.retrieval.chunk_max_chars),
        overlap_sentences: overlap.unwrap_or(config.retrieval.chunk_overlap_sentences),
    }
}

/// Build the crawler and check the seed against its boundary.
///
/// Without `--base` the boundary is the normalized seed itself.
fn crawler_for(
    config: &AppConfig,
    seed: &str,
    base: Option<String>,
    out: Option<PathBuf>,
) -> Result<(Crawler, Url)> {
    let base = match base {
        Some(base) => base,
        None => parse_absolute(seed)
            .map(|url| normalize_url(&url).to_string())
            .ok_or_else(|| DocBotError::InvalidUrl(seed.to_string()))?,
    };

    let mut crawl_config = CrawlConfig::new(base, &config.crawl);
    if let Some(out) = out {
        crawl_config.storage_root = out;
    }

    let crawler = Crawler::new(crawl_config)?;
    let seed_url = crawler.scope().admit_seed(seed)?;
    Ok((crawler, seed_url))
}

async fn cmd_index(
    config: &AppConfig,
    root: Option<PathBuf>,
    options: ChunkOptions,
    batch_size: Option<usize>,
) -> Result<()> {
    let root = root.unwrap_or_else(|| PathBuf::from(&config.crawl.storage_root));
    let batch_size = batch_size.unwrap_or(config.retrieval.upsert_batch_size);

    let openai_key = resolve_api_key(&config.openai.api_key_env, "OpenAI")?;
    let pinecone_key = resolve_api_key(&config.pinecone.api_key_env, "Pinecone")?;
    let embedder = OpenAiClient::new(&openai_key, &config.openai)?;
    let index = PineconeIndex::new(&pinecone_key, &config.pinecone)?;

    let loader = DocumentLoader::new(&root).with_urls(ledger_urls(config).await?);
    let documents = loader.load()?;
    let chunks = chunk_corpus(&documents, options);

    info!(
        root = %root.display(),
        documents = documents.len(),
        chunks = chunks.len(),
        "indexing corpus"
    );

    let report = index_corpus(&chunks, &embedder, &index, batch_size).await?;

    println!();
    println!("  Index updated!");
    println!("  Documents: {}", documents.len());
    println!("  Chunks:    {}", report.chunks);
    println!("  Batches:   {}", report.batches);
    println!("  Upserted:  {}", report.upserted);
    println!();

    Ok(())
}

/// `(local path, url)` pairs from the crawl ledger, empty if there is none yet.
async fn ledger_urls(config: &AppConfig) -> Result<Vec<(PathBuf, String)>> {
    let ledger = Path::new(&config.crawl.ledger_path);
    if !ledger.exists() {
        warn!(ledger = %ledger.display(), "no crawl ledger; chunks will cite file paths");
        return Ok(Vec::new());
    }

    let storage = Storage::open_readonly(ledger).await?;
    let pairs = storage
        .list_pages()
        .await?
        .into_iter()
        .map(|page| (PathBuf::from(page.local_path), page.url))
        .collect();
    Ok(pairs)
}

async fn cmd_ask(config: &AppConfig, question: &str) -> Result<()> {
    let service = AnswerService::from_config(config)?;
    let answer = service.answer(question).await?;

    println!();
    println!("  Q: {}", answer.question);
    println!("  A: {}", answer.answer);
    println!("  Source: {}", answer.url);
    println!();

    Ok(())
}

async fn cmd_serve(config: &AppConfig, bind: Option<String>) -> Result<()> {
    let bind = bind.unwrap_or_else(|| config.server.bind.clone());
    let service = Arc::new(AnswerService::from_config(config)?);

    info!(
        bind,
        top_k = service.retrieval().top_k,
        char_limit = service.retrieval().char_limit,
        "starting HTTP API"
    );
    server::serve(&bind, service).await
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(path: Option<&Path>) -> Result<()> {
    let config = resolve_config(path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// Crawl progress shown as an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
    saved: AtomicUsize,
    failed: AtomicUsize,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self {
            spinner,
            saved: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
        }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl CrawlProgress for CliProgress {
    fn page_saved(&self, record: &PageRecord) {
        let saved = self.saved.fetch_add(1, Ordering::Relaxed) + 1;
        self.spinner.set_message(format!("Saved [{saved}] {}", record.url));
    }

    fn page_failed(&self, url: &str, error: &DocBotError) {
        let failed = self.failed.fetch_add(1, Ordering::Relaxed) + 1;
        self.spinner
            .set_message(format!("Failed [{failed}] {url}: {error}"));
    }
}
