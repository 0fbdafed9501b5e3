//! Deterministic URL → local file path mapping, and page persistence.

use std::path::{Path, PathBuf};

use docbot_shared::{DocBotError, Result};
use url::Url;

/// File name used for a URL with an empty (root) path.
const INDEX_FILE: &str = "index.html";

/// Map a URL to a relative file path.
///
/// - root path → `index.html`
/// - last segment without an extension → append `.html`
/// - otherwise the path is kept as-is
///
/// The path stays percent-encoded, so the result never contains `?`, `#`, or
/// spaces. Trailing slashes are ignored: `/docs/` and `/docs` both map to
/// `docs.html`.
pub fn to_local_path(url: &Url) -> PathBuf {
    let path = url.path().trim_matches('/');

    if path.is_empty() {
        return PathBuf::from(INDEX_FILE);
    }

    let last = path.rsplit('/').next().unwrap_or(path);
    if has_extension(last) {
        PathBuf::from(path)
    } else {
        PathBuf::from(format!("{path}.html"))
    }
}

/// A segment has an extension when it contains a dot that is neither its
/// first nor its last character.
fn has_extension(segment: &str) -> bool {
    match segment.rfind('.') {
        Some(i) => i > 0 && i < segment.len() - 1,
        None => false,
    }
}

/// Network location of a URL: host, plus `:port` for a non-default port.
pub fn netloc(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    }
}

/// Full storage location: `<root>/<netloc>/<mapped path>`.
pub fn storage_path(root: &Path, url: &Url) -> PathBuf {
    root.join(netloc(url)).join(to_local_path(url))
}

/// Write `content` for `url` under `root`, creating parent directories.
///
/// Existing files are overwritten. Returns the written path.
pub fn write_page(root: &Path, url: &Url, content: &[u8]) -> Result<PathBuf> {
    let path = storage_path(root, url);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| DocBotError::io(parent, e))?;
    }
    std::fs::write(&path, content).map_err(|e| DocBotError::io(&path, e))?;
    Ok(path)
}
