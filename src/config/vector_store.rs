// src/config/vector_store.rs
// Vector store (Qdrant) configuration

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStoreConfig {
    pub url: String,
    pub collection: String,
    pub timeout_secs: u64,
}

impl VectorStoreConfig {
    pub fn from_env() -> Self {
        Self {
            url: super::helpers::env_or("QDRANT_URL", "http://localhost:6334"),
            collection: super::helpers::env_or("VS_COLLECTION", "chat_index"),
            timeout_secs: super::helpers::env_or_parsed("VS_TIMEOUT_SECS", 10),
        }
    }
}
