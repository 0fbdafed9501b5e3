//! Offline index population: chunks → embeddings → vector upserts.

use tracing::{info, instrument};

use docbot_loader::{ChunkOptions, chunk_document};
use docbot_shared::{Chunk, DocBotError, Document, Result};

use crate::services::{Embedder, PassageMetadata, VectorIndex, VectorRecord};

/// Outcome of one indexing pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexReport {
    pub chunks: usize,
    pub batches: usize,
    pub upserted: usize,
}

/// Split every document into chunks, in document order.
pub fn chunk_corpus(documents: &[Document], options: ChunkOptions) -> Vec<Chunk> {
    documents
        .iter()
        .flat_map(|doc| chunk_document(doc, options))
        .collect()
}

/// Embed `chunks` and upsert them in batches of `batch_size`.
///
/// Stops at the first failed call; batches already upserted stay in the
/// index, so rerunning replaces them by id.
#[instrument(skip_all, fields(chunks = chunks.len(), batch_size = batch_size))]
pub async fn index_corpus(
    chunks: &[Chunk],
    embedder: &dyn Embedder,
    index: &dyn VectorIndex,
    batch_size: usize,
) -> Result<IndexReport> {
    if batch_size == 0 {
        return Err(DocBotError::validation("batch size must be at least 1"));
    }

    let mut report = IndexReport {
        chunks: chunks.len(),
        ..IndexReport::default()
    };

    for batch in chunks.chunks(batch_size) {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        let vectors = embedder.embed_batch(&texts).await?;
        if vectors.len() != batch.len() {
            return Err(DocBotError::upstream(
                "embedding",
                format!("got {} vectors for {} chunks", vectors.len(), batch.len()),
            ));
        }

        let records: Vec<VectorRecord> = batch
            .iter()
            .zip(vectors)
            .map(|(chunk, values)| VectorRecord {
                id: chunk.id.clone(),
                values,
                metadata: PassageMetadata {
                    text: chunk.text.clone(),
                    url: chunk.url.clone(),
                    source: Some(chunk.source.display().to_string()),
                },
            })
            .collect();

        report.upserted += index.upsert(&records).await?;
        report.batches += 1;
        info!(
            batch = report.batches,
            upserted = report.upserted,
            "batch indexed"
        );
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::answer::fakes::{FakeEmbedder, FakeIndex};

    fn chunks(n: usize) -> Vec<Chunk> {
        (0..n)
            .map(|i| Chunk {
                id: format!("doc-{i}"),
                text: format!("chunk number {i}"),
                url: format!("https://docs.example.com/{i}"),
                source: PathBuf::from(format!("saved_pages/docs.example.com/{i}.html")),
            })
            .collect()
    }

    #[test]
    fn chunk_corpus_keeps_document_order() {
        use docbot_shared::DocumentMetadata;

        let docs: Vec<Document> = ["a", "b"]
            .iter()
            .map(|name| Document {
                text: format!("Page {name} says hello."),
                metadata: DocumentMetadata {
                    source: PathBuf::from(format!("{name}.html")),
                    url: Some(format!("https://docs.example.com/{name}")),
                },
            })
            .collect();

        let chunks = chunk_corpus(&docs, ChunkOptions::default());
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].url, "https://docs.example.com/a");
        assert_eq!(chunks[1].url, "https://docs.example.com/b");
    }

    #[tokio::test]
    async fn upserts_in_batches_with_metadata() {
        let embedder = FakeEmbedder::default();
        let index = FakeIndex::default();

        let report = index_corpus(&chunks(5), &embedder, &index, 2).await.unwrap();

        assert_eq!(
            report,
            IndexReport {
                chunks: 5,
                batches: 3,
                upserted: 5
            }
        );
        let upserts = index.upserts.lock().unwrap();
        let sizes: Vec<_> = upserts.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![2, 2, 1]);

        let first = &upserts[0][0];
        assert_eq!(first.id, "doc-0");
        assert_eq!(first.metadata.text, "chunk number 0");
        assert_eq!(first.metadata.url, "https://docs.example.com/0");
        assert_eq!(
            first.metadata.source.as_deref(),
            Some("saved_pages/docs.example.com/0.html")
        );
        assert_eq!(embedder.calls.lock().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn empty_corpus_makes_no_calls() {
        let index = FakeIndex::default();
        let report = index_corpus(&[], &FakeEmbedder::default(), &index, 10)
            .await
            .unwrap();
        assert_eq!(report, IndexReport::default());
        assert!(index.upserts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn stops_at_first_upstream_failure() {
        let index = FakeIndex {
            fail_upsert: true,
            ..FakeIndex::default()
        };
        let err = index_corpus(&chunks(3), &FakeEmbedder::default(), &index, 1)
            .await
            .unwrap_err();
        assert!(err.is_upstream());
    }

    #[tokio::test]
    async fn zero_batch_size_is_rejected() {
        let err = index_corpus(&chunks(1), &FakeEmbedder::default(), &FakeIndex::default(), 0)
            .await
            .unwrap_err();
        assert!(matches!(err, DocBotError::Validation { .. }));
    }
}
