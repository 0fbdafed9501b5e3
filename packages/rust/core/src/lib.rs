//! Retrieval and answering for DocBot.
//!
//! This crate turns an indexed documentation corpus into answers:
//! - [`context`]: fitting ranked passages into a character budget
//! - [`answer`]: the embed → search → generate query path
//! - [`indexer`]: populating the vector index from loaded documents
//! - [`openai`] / [`pinecone`]: HTTP clients behind the [`services`] traits

pub mod answer;
pub mod context;
mod http;
pub mod indexer;
pub mod openai;
pub mod pinecone;
pub mod services;

pub use answer::AnswerService;
pub use context::{PROMPT_PREAMBLE, SEPARATOR, build_prompt};
pub use indexer::{IndexReport, chunk_corpus, index_corpus};
pub use openai::OpenAiClient;
pub use pinecone::PineconeIndex;
pub use services::{Embedder, Generator, PassageMetadata, VectorIndex, VectorRecord};
