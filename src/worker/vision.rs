// src/worker/vision.rs
// VisionDescriber: the external collaborator that turns an image attachment
// into a textual description for chunking/embedding (§4.7, §6). Shaped like
// `RemoteEmbedder` — single HTTP round trip, OpenAI-compatible chat endpoint
// with an image content part.

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use crate::config::vision::VisionConfig;
use crate::embedder::{EmbedderError, EmbedderResult};

#[async_trait]
pub trait VisionDescriber: Send + Sync {
    async fn describe(&self, image_bytes: &[u8], mime: &str) -> EmbedderResult<String>;
}

pub struct RemoteVisionDescriber {
    client: Client,
    config: VisionConfig,
}

impl RemoteVisionDescriber {
    pub fn new(config: VisionConfig, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .expect("reqwest client builds with valid defaults");
        Self { client, config }
    }
}

#[async_trait]
impl VisionDescriber for RemoteVisionDescriber {
    async fn describe(&self, image_bytes: &[u8], mime: &str) -> EmbedderResult<String> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(image_bytes);
        let data_url = format!("data:{mime};base64,{encoded}");

        debug!(bytes = image_bytes.len(), mime, "requesting image description");

        let body = json!({
            "model": self.config.model,
            "messages": [{
                "role": "user",
                "content": [
                    {"type": "text", "text": "Describe this image for a semantic search index. Be concrete and literal."},
                    {"type": "image_url", "image_url": {"url": data_url}},
                ],
            }],
        });

        let mut req = self.client.post(format!("{}/chat/completions", self.config.api_base)).json(&body);
        if let Some(key) = &self.config.api_key {
            req = req.bearer_auth(key);
        }

        let response = req.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmbedderError::ApiError { status: status.as_u16(), body });
        }

        let raw: serde_json::Value = response.json().await?;
        raw.get("choices")
            .and_then(|c| c.as_array())
            .and_then(|c| c.first())
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .map(str::to_string)
            .ok_or_else(|| EmbedderError::MalformedResponse("missing choices[0].message.content".into()))
    }
}
