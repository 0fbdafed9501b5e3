//! Seams to the external services: embeddings, vector search, and generation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use docbot_shared::{Passage, Result};

/// Text → embedding vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed several texts, preserving order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }
}

/// Nearest-neighbour search over indexed passages.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Top `top_k` passages for `vector`, most relevant first.
    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<Passage>>;

    /// Insert or replace records. Returns the number the index accepted.
    async fn upsert(&self, records: &[VectorRecord]) -> Result<usize>;
}

/// Prompt → completion text.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// A vector with the metadata stored next to it in the index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: PassageMetadata,
}

/// Metadata stored with every indexed passage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassageMetadata {
    pub text: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}
