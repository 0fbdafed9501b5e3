//! Document store loader: re-reads crawled pages as normalized text.
//!
//! This crate provides:
//! - [`DocumentLoader`]: walks the storage root and emits one [`Document`] per file
//! - [`clean_html`]: markup stripping and whitespace normalization
//! - [`chunk_document`]: sentence-packing chunker for embedding

mod chunk;
mod clean;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, instrument};

use docbot_shared::{DocBotError, Document, DocumentMetadata, Result};

pub use chunk::{ChunkOptions, chunk_document};
pub use clean::{clean_html, normalize_text, split_sentences};

/// Loads every file under a storage root as a cleaned [`Document`].
///
/// Each call to [`DocumentLoader::load`] re-reads the disk; nothing is cached.
#[derive(Debug, Clone)]
pub struct DocumentLoader {
    root: PathBuf,
    /// Known page URLs keyed by file path (canonicalized when possible).
    urls: HashMap<PathBuf, String>,
}

impl DocumentLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            urls: HashMap::new(),
        }
    }

    /// Attach page URLs (typically from the crawl ledger) as `(file path, url)` pairs.
    ///
    /// Later pairs for the same path win.
    pub fn with_urls<I, P>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (P, String)>,
        P: AsRef<Path>,
    {
        for (path, url) in pairs {
            self.urls.insert(path_key(path.as_ref()), url);
        }
        self
    }

    /// Load every non-directory file under the root.
    ///
    /// Files are visited in sorted order per directory; callers must not rely
    /// on the order for anything beyond display.
    #[instrument(skip(self), fields(root = %self.root.display()))]
    pub fn load(&self) -> Result<Vec<Document>> {
        let mut files = Vec::new();
        collect_files(&self.root, &mut files)?;

        let docs = files
            .into_iter()
            .map(|path| self.load_file(path))
            .collect::<Result<Vec<_>>>()?;

        debug!(documents = docs.len(), "loaded documents");
        Ok(docs)
    }

    fn load_file(&self, path: PathBuf) -> Result<Document> {
        let bytes = std::fs::read(&path).map_err(|e| DocBotError::io(&path, e))?;
        let raw = String::from_utf8_lossy(&bytes);
        let text = clean_html(&raw);
        let url = self.urls.get(&path_key(&path)).cloned();

        Ok(Document {
            text,
            metadata: DocumentMetadata { source: path, url },
        })
    }
}

/// Canonical form of `path` for URL lookups; the path itself if it does not exist.
fn path_key(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Recursively collect file paths under `dir`.
///
/// Symlinks are never descended into, so a link cycle cannot recurse forever.
/// A symlink to a regular file is loaded like the file itself.
fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    let mut entries = std::fs::read_dir(dir)
        .map_err(|e| DocBotError::io(dir, e))?
        .map(|entry| entry.and_then(|e| Ok((e.path(), e.file_type()?))))
        .collect::<std::io::Result<Vec<_>>>()
        .map_err(|e| DocBotError::io(dir, e))?;
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    for (path, file_type) in entries {
        if file_type.is_dir() {
            collect_files(&path, out)?;
        } else if file_type.is_file() || (file_type.is_symlink() && path.is_file()) {
            out.push(path);
        } else {
            debug!(path = %path.display(), "skipping non-file entry");
        }
    }
    Ok(())
}
