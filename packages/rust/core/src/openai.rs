//! OpenAI-compatible embeddings and completions client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use docbot_shared::{DocBotError, OpenAiConfig, Result};

use crate::http::post_json;
use crate::services::{Embedder, Generator};

const SERVICE: &str = "openai";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Talks to `/embeddings` and `/completions` on an OpenAI-compatible base URL.
#[derive(Clone)]
pub struct OpenAiClient {
    client: reqwest::Client,
    base_url: String,
    embed_model: String,
    completion_model: String,
    max_tokens: u32,
    temperature: f32,
}

impl OpenAiClient {
    pub fn new(api_key: &str, config: &OpenAiConfig) -> Result<Self> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(DocBotError::config("missing OpenAI API key"));
        }
        if config.embed_model.trim().is_empty() || config.completion_model.trim().is_empty() {
            return Err(DocBotError::config("missing OpenAI model name"));
        }

        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|_| DocBotError::config("invalid OpenAI API key"))?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .default_headers(headers)
            .build()
            .map_err(|e| DocBotError::config(format!("failed to build OpenAI client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            embed_model: config.embed_model.clone(),
            completion_model: config.completion_model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl Embedder for OpenAiClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| DocBotError::upstream(SERVICE, "no embedding returned"))
    }

    #[instrument(skip_all, fields(inputs = texts.len()))]
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbeddingRequest {
            model: &self.embed_model,
            input: texts,
        };
        let mut parsed: EmbeddingResponse =
            post_json(&self.client, SERVICE, &self.base_url, "embeddings", &request).await?;
        parsed.data.sort_by_key(|entry| entry.index);

        if parsed.data.len() != texts.len() {
            return Err(DocBotError::upstream(
                SERVICE,
                format!(
                    "returned {} embeddings for {} inputs",
                    parsed.data.len(),
                    texts.len()
                ),
            ));
        }
        debug!(model = %self.embed_model, "embeddings received");
        Ok(parsed.data.into_iter().map(|entry| entry.embedding).collect())
    }
}

#[async_trait]
impl Generator for OpenAiClient {
    #[instrument(
        skip_all,
        fields(model = %self.completion_model, prompt_chars = prompt.chars().count())
    )]
    async fn complete(&self, prompt: &str) -> Result<String> {
        let request = CompletionRequest {
            model: &self.completion_model,
            prompt,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            top_p: 1.0,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
        };
        let parsed: CompletionResponse =
            post_json(&self.client, SERVICE, &self.base_url, "completions", &request).await?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| DocBotError::upstream(SERVICE, "completion returned no choices"))?;
        Ok(choice.text.trim().to_string())
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    temperature: f32,
    max_tokens: u32,
    top_p: f32,
    frequency_penalty: f32,
    presence_penalty: f32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    text: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> OpenAiClient {
        let config = OpenAiConfig {
            base_url: format!("{}/v1/", server.uri()),
            ..OpenAiConfig::default()
        };
        OpenAiClient::new("sk-test", &config).expect("client")
    }

    #[test]
    fn rejects_blank_key() {
        let err = OpenAiClient::new("  ", &OpenAiConfig::default()).err().unwrap();
        assert!(matches!(err, DocBotError::Config { .. }));
    }

    #[tokio::test]
    async fn embed_sends_model_and_bearer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(serde_json::json!({
                "model": "text-embedding-ada-002",
                "input": ["How do I auth?"]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{ "index": 0, "embedding": [0.1, 0.2, 0.3] }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let vector = client_for(&server).embed("How do I auth?").await.unwrap();
        assert_eq!(vector, vec![0.1, 0.2, 0.3]);
    }

    #[tokio::test]
    async fn embed_batch_restores_input_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [
                    { "index": 1, "embedding": [2.0] },
                    { "index": 0, "embedding": [1.0] }
                ]
            })))
            .mount(&server)
            .await;

        let texts = vec!["first".to_string(), "second".to_string()];
        let vectors = client_for(&server).embed_batch(&texts).await.unwrap();
        assert_eq!(vectors, vec![vec![1.0], vec![2.0]]);
    }

    #[tokio::test]
    async fn completion_uses_deterministic_settings_and_trims() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/completions"))
            .and(body_partial_json(serde_json::json!({
                "prompt": "Question: hi\nAnswer:",
                "temperature": 0.0,
                "max_tokens": 400,
                "top_p": 1.0
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{ "text": "  Use an API key.\n" }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let text = client_for(&server)
            .complete("Question: hi\nAnswer:")
            .await
            .unwrap();
        assert_eq!(text, "Use an API key.");
    }

    #[tokio::test]
    async fn non_success_status_is_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let err = client_for(&server).complete("q").await.unwrap_err();
        assert!(err.is_upstream());
        assert!(err.to_string().contains("429"), "{err}");
    }

    #[tokio::test]
    async fn empty_choices_is_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/completions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "choices": [] })),
            )
            .mount(&server)
            .await;

        let err = client_for(&server).complete("q").await.unwrap_err();
        assert!(err.is_upstream());
    }
}
