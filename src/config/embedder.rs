// src/config/embedder.rs
// Embedder identity and connection configuration

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedderConfig {
    pub model: String,
    pub dimension: usize,
    pub api_base: String,
    pub api_key: Option<String>,
    pub max_batch_size: usize,
    pub timeout_secs: u64,
}

impl EmbedderConfig {
    pub fn from_env() -> Self {
        Self {
            model: super::helpers::env_or("EMBED_MODEL", "text-embedding-3-small"),
            dimension: super::helpers::env_or_parsed("EMBED_DIMENSIONS", 1536),
            api_base: super::helpers::env_or("EMBED_API_BASE", "https://api.openai.com/v1"),
            api_key: std::env::var("EMBED_API_KEY").ok(),
            max_batch_size: super::helpers::env_or_parsed("EMBED_MAX_BATCH_SIZE", 96),
            timeout_secs: super::helpers::env_or_parsed("EMBED_TIMEOUT_SECS", 10),
        }
    }

    /// Embedder identity per §4.4/§9: name + version + params. Stable across
    /// restarts with the same config; a change here is a migration event.
    pub fn identity(&self) -> String {
        format!("{}@d{}", self.model, self.dimension)
    }
}
