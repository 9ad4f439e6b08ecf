//! OpenAI-compatible embeddings over HTTP.

use crate::config::EmbedConfig;
use crate::error::{EmbedError, Result};
use crate::provider::{EmbeddingProvider, EmbeddingResult, convert_to_f16};
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Embeddings client that talks to OpenAI-compatible `/embeddings` endpoints.
///
/// The client does not retry on its own. Transient failures (HTTP 429, 5xx,
/// timeouts, refused connections) surface as [`EmbedError::Unavailable`] so
/// the caller can decide how often to try again.
#[derive(Clone)]
pub struct OpenAiEmbedProvider {
    client: Client,
    endpoint: String,
    config: EmbedConfig,
    dimension: usize,
}

impl std::fmt::Debug for OpenAiEmbedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiEmbedProvider")
            .field("endpoint", &self.endpoint)
            .field("config", &self.config)
            .field("dimension", &self.dimension)
            .finish()
    }
}

/// Output dimension of the hosted models when no `dimensions` override is sent.
fn native_dimension(model: &str) -> usize {
    match model {
        "text-embedding-3-large" => 3072,
        _ => 1536,
    }
}

impl OpenAiEmbedProvider {
    /// Builds a new client. Fails when the API key is missing or not a valid header value.
    pub fn new(config: EmbedConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| EmbedError::invalid_config("missing OpenAI API key"))?;

        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|_| EmbedError::invalid_config("invalid OpenAI API key"))?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(EmbedError::model_init)?;

        let endpoint = format!("{}/embeddings", config.api_base());
        let dimension = config
            .dimensions
            .unwrap_or_else(|| native_dimension(config.model_name()));

        tracing::debug!("OpenAI embeddings endpoint: {}", endpoint);
        Ok(Self {
            client,
            endpoint,
            config,
            dimension,
        })
    }

    /// Sends one batch and returns the vectors in input order.
    async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = EmbeddingRequest {
            model: self.config.model_name(),
            input: inputs,
            dimensions: self.config.dimensions,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(classify_status(status, &body));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| EmbedError::invalid_response(format!("failed to parse body: {e}")))?;
        order_embeddings(parsed, inputs.len())
    }
}

fn classify_transport_error(err: reqwest::Error) -> EmbedError {
    if err.is_timeout() || err.is_connect() || err.is_request() {
        EmbedError::unavailable(err.to_string())
    } else {
        EmbedError::embedding_gen(err)
    }
}

fn classify_status(status: StatusCode, body: &str) -> EmbedError {
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        EmbedError::unavailable(format!("HTTP {status}: {body}"))
    } else {
        EmbedError::invalid_response(format!("HTTP {status}: {body}"))
    }
}

/// Restore input order from the `index` field and check that every input got a vector.
fn order_embeddings(mut response: EmbeddingResponse, expected: usize) -> Result<Vec<Vec<f32>>> {
    response.data.sort_by_key(|entry| entry.index);
    let in_sequence = response
        .data
        .iter()
        .enumerate()
        .all(|(position, entry)| entry.index == position);
    if response.data.len() != expected || !in_sequence {
        return Err(EmbedError::invalid_response(format!(
            "OpenAI returned {} embeddings for {} inputs",
            response.data.len(),
            expected
        )));
    }
    Ok(response
        .data
        .into_iter()
        .map(|entry| entry.embedding)
        .collect())
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedProvider {
    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult> {
        if texts.is_empty() {
            return Ok(EmbeddingResult::new(vec![]));
        }

        let mut all_embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.config.batch_size) {
            tracing::debug!("Requesting {} embeddings from OpenAI", batch.len());
            let vectors = self.embed_batch(batch).await?;
            if let Some(bad) = vectors.iter().find(|v| v.len() != self.dimension) {
                return Err(EmbedError::invalid_response(format!(
                    "expected dimension {}, got {}",
                    self.dimension,
                    bad.len()
                )));
            }
            all_embeddings.extend(convert_to_f16(vectors, self.config.normalize));
        }
        Ok(EmbeddingResult::new(all_embeddings))
    }

    fn embedding_dimension(&self) -> usize {
        self.dimension
    }

    fn provider_name(&self) -> &str {
        "openai"
    }

    fn model_id(&self) -> String {
        format!("openai:{}:{}", self.config.model_name(), self.dimension)
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}
