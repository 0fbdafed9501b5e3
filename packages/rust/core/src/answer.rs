//! The query path: embed → search → assemble → generate.

use std::sync::Arc;

use tracing::{debug, info, instrument};

use docbot_shared::{
    Answer, AppConfig, DocBotError, RetrievalConfig, Result, resolve_api_key,
};

use crate::context::build_prompt;
use crate::openai::OpenAiClient;
use crate::pinecone::PineconeIndex;
use crate::services::{Embedder, Generator, VectorIndex};

/// Answers documentation questions against an indexed corpus.
///
/// Built once at process start and shared (`Arc`) across requests. Holds no
/// per-request state.
#[derive(Clone)]
pub struct AnswerService {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    generator: Arc<dyn Generator>,
    config: RetrievalConfig,
}

impl AnswerService {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        generator: Arc<dyn Generator>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            embedder,
            index,
            generator,
            config,
        }
    }

    /// Wire up the OpenAI and Pinecone clients named by `config`.
    ///
    /// API keys are read from the environment variables the config names.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let openai_key = resolve_api_key(&config.openai.api_key_env, "OpenAI")?;
        let pinecone_key = resolve_api_key(&config.pinecone.api_key_env, "Pinecone")?;

        let openai = Arc::new(OpenAiClient::new(&openai_key, &config.openai)?);
        let index = Arc::new(PineconeIndex::new(&pinecone_key, &config.pinecone)?);

        Ok(Self::new(
            openai.clone(),
            index,
            openai,
            RetrievalConfig::from(config),
        ))
    }

    pub fn retrieval(&self) -> RetrievalConfig {
        self.config
    }

    /// Answer one question. Any upstream failure fails the whole query.
    #[instrument(skip(self), fields(top_k = self.config.top_k))]
    pub async fn answer(&self, question: &str) -> Result<Answer> {
        if question.trim().is_empty() {
            return Err(DocBotError::validation("question text is empty"));
        }

        let vector = self.embedder.embed(question).await?;
        let passages = self.index.query(&vector, self.config.top_k).await?;
        debug!(passages = passages.len(), "retrieved passages");

        let prompt = build_prompt(question, &passages, self.config.char_limit)?;
        debug!(
            included = prompt.included,
            prompt_chars = prompt.prompt_text.chars().count(),
            "prompt assembled"
        );

        let completion = self.generator.complete(&prompt.prompt_text).await?;
        info!(url = %prompt.source_url, "answered");

        Ok(Answer {
            question: question.to_string(),
            answer: completion.trim().to_string(),
            url: prompt.source_url,
        })
    }
}
