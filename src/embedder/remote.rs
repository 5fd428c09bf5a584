// src/embedder/remote.rs
// RemoteEmbedder: HTTP client for an OpenAI-compatible embeddings endpoint,
// grounded in the teacher's GeminiEmbeddings provider (single + batch call,
// `reqwest::Client`, JSON in/out).

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};

use crate::config::embedder::EmbedderConfig;

use super::{Embedder, EmbedderError, EmbedderResult};

pub struct RemoteEmbedder {
    client: Client,
    config: EmbedderConfig,
}

impl RemoteEmbedder {
    pub fn new(config: EmbedderConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("reqwest client builds with valid defaults");
        Self { client, config }
    }

    fn api_url(&self) -> String {
        format!("{}/embeddings", self.config.api_base)
    }

    fn request(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_key {
            Some(key) => req.bearer_auth(key),
            None => req,
        }
    }

    fn extract_vectors(raw: &Value) -> EmbedderResult<Vec<Vec<f32>>> {
        let data = raw
            .get("data")
            .and_then(|d| d.as_array())
            .ok_or_else(|| EmbedderError::MalformedResponse("missing `data` array".into()))?;

        data.iter()
            .map(|item| {
                item.get("embedding")
                    .and_then(|e| e.as_array())
                    .map(|arr| arr.iter().filter_map(|v| v.as_f64().map(|f| f as f32)).collect())
                    .ok_or_else(|| EmbedderError::MalformedResponse("missing `embedding` field".into()))
            })
            .collect()
    }
}

#[async_trait]
impl Embedder for RemoteEmbedder {
    fn identity(&self) -> String {
        self.config.identity()
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }

    async fn embed(&self, text: &str) -> EmbedderResult<Vec<f32>> {
        let vectors = self.embed_batch(std::slice::from_ref(&text.to_string())).await?;
        vectors
            .into_iter()
            .next()
            .ok_or_else(|| EmbedderError::MalformedResponse("empty embedding response".into()))
    }

    async fn embed_batch(&self, texts: &[String]) -> EmbedderResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        if texts.len() > self.config.max_batch_size {
            return Err(EmbedderError::BatchTooLarge {
                got: texts.len(),
                max: self.config.max_batch_size,
            });
        }

        debug!(count = texts.len(), model = %self.config.model, "requesting embeddings");

        let body = json!({
            "model": self.config.model,
            "input": texts,
        });

        let response = self
            .request(self.client.post(self.api_url()).json(&body))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmbedderError::ApiError { status: status.as_u16(), body });
        }

        let raw: Value = response.json().await?;
        let vectors = Self::extract_vectors(&raw)?;

        info!(count = vectors.len(), "generated embeddings");
        Ok(vectors)
    }
}
