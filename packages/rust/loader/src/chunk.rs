//! Sentence-packing chunker for embedding.

use sha2::{Digest, Sha256};

use docbot_shared::{Chunk, Document};

use crate::clean::split_sentences;

/// Chunking limits.
#[derive(Debug, Clone, Copy)]
pub struct ChunkOptions {
    /// Maximum characters per chunk.
    pub max_chars: usize,
    /// Trailing sentences of one chunk repeated at the start of the next.
    pub overlap_sentences: usize,
}

impl Default for ChunkOptions {
    fn default() -> Self {
        Self {
            max_chars: 1500,
            overlap_sentences: 0,
        }
    }
}

/// Split a document into chunks of whole sentences, each at most
/// `max_chars` characters.
///
/// Each chunk after the first starts with up to `overlap_sentences` of the
/// previous chunk's last sentences, dropping the oldest ones when they would
/// push the chunk over the limit. A single sentence longer than the limit is
/// cut on character boundaries. Empty documents yield no chunks.
pub fn chunk_document(doc: &Document, opts: ChunkOptions) -> Vec<Chunk> {
    let max = opts.max_chars.max(1);
    let mut pieces: Vec<String> = Vec::new();
    let mut window: Vec<&str> = Vec::new();

    for sentence in split_sentences(&doc.text) {
        for part in hard_split(sentence, max) {
            let part_len = part.chars().count();
            if !window.is_empty() && joined_len(&window) + 1 + part_len > max {
                pieces.push(window.join(" "));
                let keep = opts.overlap_sentences.min(window.len());
                window.drain(..window.len() - keep);
                while !window.is_empty() && joined_len(&window) + 1 + part_len > max {
                    window.remove(0);
                }
            }
            window.push(part);
        }
    }
    if !window.is_empty() {
        pieces.push(window.join(" "));
    }

    let prefix = source_hash(doc);
    let url = doc
        .metadata
        .url
        .clone()
        .unwrap_or_else(|| doc.metadata.source.to_string_lossy().into_owned());

    pieces
        .into_iter()
        .enumerate()
        .map(|(n, text)| Chunk {
            id: format!("{prefix}-{n}"),
            text,
            url: url.clone(),
            source: doc.metadata.source.clone(),
        })
        .collect()
}

/// Length in characters of `parts` joined by single spaces.
fn joined_len(parts: &[&str]) -> usize {
    parts.iter().map(|p| p.chars().count()).sum::<usize>() + parts.len().saturating_sub(1)
}

/// Cut `s` into pieces of at most `max` characters.
fn hard_split(s: &str, max: usize) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut rest = s;
    while rest.chars().count() > max {
        let cut = rest
            .char_indices()
            .nth(max)
            .map_or(rest.len(), |(i, _)| i);
        parts.push(&rest[..cut]);
        rest = &rest[cut..];
    }
    if !rest.is_empty() {
        parts.push(rest);
    }
    parts
}

/// First 16 hex chars of the SHA-256 of the source path.
fn source_hash(doc: &Document) -> String {
    let mut hasher = Sha256::new();
    hasher.update(doc.metadata.source.to_string_lossy().as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..16].to_string()
}
