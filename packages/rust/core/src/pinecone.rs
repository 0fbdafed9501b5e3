//! Pinecone data-plane client: `/query` and `/vectors/upsert` on an index host.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use docbot_shared::{DocBotError, Passage, PineconeConfig, Result};

use crate::http::post_json;
use crate::services::{PassageMetadata, VectorIndex, VectorRecord};

const SERVICE: &str = "pinecone";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// A single Pinecone index, addressed by its host URL.
#[derive(Clone)]
pub struct PineconeIndex {
    client: reqwest::Client,
    host: String,
    namespace: Option<String>,
}

impl PineconeIndex {
    pub fn new(api_key: &str, config: &PineconeConfig) -> Result<Self> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(DocBotError::config("missing Pinecone API key"));
        }
        let host = config.index_host.trim().trim_end_matches('/');
        if host.is_empty() {
            return Err(DocBotError::config(
                "pinecone.index_host is not set in the config file",
            ));
        }
        let host = if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            format!("https://{host}")
        };

        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(api_key)
            .map_err(|_| DocBotError::config("invalid Pinecone API key"))?;
        headers.insert("Api-Key", key);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .default_headers(headers)
            .build()
            .map_err(|e| DocBotError::config(format!("failed to build Pinecone client: {e}")))?;

        Ok(Self {
            client,
            host,
            namespace: config.namespace.clone().filter(|ns| !ns.is_empty()),
        })
    }
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    #[instrument(skip(self, vector), fields(dims = vector.len()))]
    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<Passage>> {
        let request = QueryRequest {
            vector,
            top_k,
            include_metadata: true,
            namespace: self.namespace.as_deref(),
        };
        let parsed: QueryResponse =
            post_json(&self.client, SERVICE, &self.host, "query", &request).await?;

        let passages = parsed
            .matches
            .into_iter()
            .map(|m| {
                let metadata = m.metadata.ok_or_else(|| {
                    DocBotError::upstream(SERVICE, format!("match {} has no metadata", m.id))
                })?;
                Ok(Passage {
                    text: metadata.text,
                    url: metadata.url,
                    score: m.score,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(matches = passages.len(), "query answered");
        Ok(passages)
    }

    #[instrument(skip_all, fields(records = records.len()))]
    async fn upsert(&self, records: &[VectorRecord]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        let request = UpsertRequest {
            vectors: records,
            namespace: self.namespace.as_deref(),
        };
        let parsed: UpsertResponse =
            post_json(&self.client, SERVICE, &self.host, "vectors/upsert", &request).await?;
        Ok(parsed.upserted_count)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Debug, Deserialize)]
struct QueryMatch {
    id: String,
    #[serde(default)]
    score: f32,
    metadata: Option<PassageMetadata>,
}

#[derive(Serialize)]
struct UpsertRequest<'a> {
    vectors: &'a [VectorRecord],
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertResponse {
    #[serde(default)]
    upserted_count: usize,
}
